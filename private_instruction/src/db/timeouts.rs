//! Database query timeout helpers
//!
//! Every PostgreSQL call made by [`PgStore`](super::PgStore) goes through
//! [`with_timeout`] so that no request waits on the pool or a query forever.

use super::errors::{StoreError, StoreResult};
use std::time::Duration;
use tokio::time::timeout;

/// Execute a query with timeout
///
/// Database errors are classified through `StoreError::from`, so unique
/// constraint violations surface as [`StoreError::Conflict`].
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `StoreResult<T>` - Result, classified database error, or timeout error
///
/// # Example
///
/// ```no_run
/// use private_instruction::db::timeouts::with_timeout;
/// # use sqlx::PgPool;
/// # use std::time::Duration;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let row = with_timeout(
///     Duration::from_secs(5),
///     sqlx::query("SELECT id FROM accounts WHERE id = $1")
///         .bind(1_i64)
///         .fetch_optional(pool)
/// ).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> StoreResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(StoreError::from(e)),
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_future_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_slow_future_times_out() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_database_error_is_classified() {
        let result =
            with_timeout(Duration::from_secs(1), async { Err::<(), _>(sqlx::Error::RowNotFound) })
                .await;
        assert!(matches!(result.unwrap_err(), StoreError::Database(_)));
    }
}
