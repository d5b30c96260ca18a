//! Ownership guard - who may change what.
//!
//! Tally mutations are allowed only for the original submitter. User
//! management and range exports are gated on the caller's stored role.
//! Every check runs before any write, and the not-found check always runs
//! before the ownership comparison.

use crate::{
    core::{
        key::TallyKey,
        tally::{self, TallyRecord},
        user::{self, Role},
    },
    entities::user as user_entity,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tracing::warn;

/// Identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Email address; compared against `submittedBy` on records
    pub email: String,
    /// Identity provider user id, when the session carried one
    pub uid: Option<String>,
}

impl Caller {
    /// Caller known only by email (trusted-client mode).
    pub fn from_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            uid: None,
        }
    }

    /// Caller from a verified session.
    pub fn verified(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            uid: Some(uid.into()),
        }
    }

    /// Whether this caller is the user with id `uid`.
    #[must_use]
    pub fn is_user(&self, uid: &str) -> bool {
        self.uid.as_deref() == Some(uid)
    }
}

/// Fails unless `caller` submitted `record`.
///
/// # Errors
/// Returns [`Error::Forbidden`] on mismatch.
pub fn ensure_owner(record: &TallyRecord, caller: &Caller, action: &str) -> Result<()> {
    if record.submitted_by != caller.email {
        warn!(
            key = %record.key,
            caller = %caller.email,
            "Rejected attempt to {action} a tally owned by someone else"
        );
        return Err(Error::forbidden(format!(
            "You are not authorized to {action} this tally"
        )));
    }
    Ok(())
}

/// Loads a tally and checks that `caller` owns it.
///
/// # Errors
/// Returns [`Error::NotFound`] if the key has no record, then
/// [`Error::Forbidden`] if the caller is not the submitter.
pub async fn load_owned_tally(
    db: &DatabaseConnection,
    key: &TallyKey,
    caller: &Caller,
    action: &str,
) -> Result<TallyRecord> {
    let record = tally::get_tally(db, key)
        .await?
        .ok_or_else(|| Error::not_found("Tally"))?;
    ensure_owner(&record, caller, action)?;
    Ok(record)
}

/// Finds the stored user behind a caller, preferring the user id.
pub async fn caller_user(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<Option<user_entity::Model>> {
    match caller.uid.as_deref() {
        Some(uid) => user::get_user(db, uid).await,
        None => user::find_user_by_email(db, &caller.email).await,
    }
}

/// Fails unless the caller's stored role is one of `allowed`.
///
/// A caller with no user record, or with an absent or unknown role, is
/// refused.
///
/// # Errors
/// Returns [`Error::Forbidden`] when the check fails.
pub async fn require_role(
    db: &DatabaseConnection,
    caller: &Caller,
    allowed: &[Role],
) -> Result<Role> {
    let stored = caller_user(db, caller)
        .await?
        .ok_or_else(|| Error::forbidden("User not found"))?;

    match Role::of(&stored) {
        Some(role) if allowed.contains(&role) => Ok(role),
        _ => {
            warn!(caller = %caller.email, "Rejected request lacking role {allowed:?}");
            Err(Error::forbidden("Unauthorized access"))
        }
    }
}
