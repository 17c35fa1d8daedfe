//! Normalization and validation of account input.

use super::errors::{AuthError, AuthResult};

pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Trim a username
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

/// Trim and lower-case an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an already normalized username
pub fn validate_username(username: &str) -> AuthResult<()> {
    if username.is_empty() {
        return Err(AuthError::Validation("username is required".to_string()));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }

    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::Validation(
            "username cannot contain whitespace".to_string(),
        ));
    }

    Ok(())
}

/// Validate an already normalized email address
pub fn validate_email(email: &str) -> AuthResult<()> {
    if email.is_empty() {
        return Err(AuthError::Validation("email is required".to_string()));
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(AuthError::Validation(format!(
            "email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(AuthError::Validation("email is malformed".to_string())),
    }
}

/// Validate a plaintext password
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::Validation("password is required".to_string()));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation("password is too long".to_string()));
    }

    Ok(())
}
