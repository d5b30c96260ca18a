//! Secrets and deployment values from environment variables.
//!
//! Nothing here is read from `spinventory.toml`; `.env` is loaded into the
//! environment by `main` before these run.

use crate::errors::{Error, Result};

/// Shared secret for session tokens.
pub const AUTH_SECRET_VAR: &str = "SPINVENTORY_AUTH_SECRET";
/// Session lifetime in seconds.
pub const SESSION_TTL_VAR: &str = "SPINVENTORY_SESSION_TTL_SECS";
/// API key for the mail provider.
pub const MAIL_API_KEY_VAR: &str = "MAIL_API_KEY";

/// Sessions last twelve hours unless configured otherwise.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 60 * 60;

/// Reads a variable, treating unset and blank the same.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Session signing secret. `None` (or "0") selects trusted-client mode.
#[must_use]
pub fn auth_secret() -> Option<String> {
    non_empty_var(AUTH_SECRET_VAR).filter(|v| v != "0")
}

/// Session lifetime in seconds.
///
/// # Errors
/// Returns [`Error::Config`] if the variable is set but not a positive integer.
pub fn session_ttl_secs() -> Result<i64> {
    non_empty_var(SESSION_TTL_VAR).map_or(Ok(DEFAULT_SESSION_TTL_SECS), |raw| {
        match raw.trim().parse::<i64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(Error::Config {
                message: format!("{SESSION_TTL_VAR} must be a positive number of seconds, got '{raw}'"),
            }),
        }
    })
}

/// Mail provider API key, if configured.
#[must_use]
pub fn mail_api_key() -> Option<String> {
    non_empty_var(MAIL_API_KEY_VAR)
}
