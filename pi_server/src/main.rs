//! Classroom server: credential lifecycle and role-gated classes over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use pico_args::Arguments;
use pi_server::{api, config::ServerConfig, logging, metrics};
use private_instruction::{AccountManager, AuthManager, ClassManager, db::Database};
use tracing::info;

const HELP: &str = "\
Run the private instruction classroom server

USAGE:
  pi_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string (required)
  JWT_SECRET               JWT signing secret, at least 32 characters (required)
  PASSWORD_PEPPER          Password hashing pepper, at least 16 characters (required)
  ACCESS_TOKEN_TTL_MINUTES Access token lifetime [default: 15]
  REFRESH_TOKEN_TTL_DAYS   Refresh token lifetime [default: 30]
  JOIN_CODE_TTL_HOURS      Join code lifetime [default: 24]
  METRICS_BIND             Prometheus exporter address; metrics are off when unset
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
  (See .env.example for all configuration options)
";

/// How often expired refresh-token records are purged
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;
    info!("Starting classroom server at {}", config.bind);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exported on http://{metrics_bind}/metrics");
    }

    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    info!("Database connected successfully");

    let store = Arc::new(db.store());
    let auth = Arc::new(AuthManager::new(
        store.clone(),
        store.clone(),
        &config.auth_config(),
    )?);
    let accounts = Arc::new(AccountManager::new(store.clone()));
    let classes = Arc::new(ClassManager::new(
        store.clone(),
        store.clone(),
        config.join_code_ttl(),
    ));

    let purge_task = tokio::spawn(purge_expired_sessions(auth.clone()));

    let app = api::create_router(api::AppState {
        auth,
        accounts,
        classes,
        health: store,
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    purge_task.abort();
    db.close().await;

    Ok(())
}

/// Periodically drop expired refresh-token records
async fn purge_expired_sessions(auth: Arc<AuthManager>) {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = auth.purge_expired_sessions().await {
            tracing::warn!(error = %e, "Failed to purge expired sessions");
        }
    }
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for CTRL+C");
    }
}
