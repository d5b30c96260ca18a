//! User business logic - accounts, roles and the admin operations on them.
//!
//! Users are created with the `tallier` role at signup. Reading someone else's
//! role, listing users, changing a role and deleting a user are admin-only;
//! anyone may read their own role.

use crate::{
    core::guard::{self, Caller},
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info, instrument};

/// Application role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Records counts
    Tallier,
    /// Exports aggregated data
    Accountant,
    /// Manages users and bins
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tallier => "tallier",
            Self::Accountant => "accountant",
            Self::Admin => "admin",
        }
    }

    /// Role stored on a user, `None` when absent or unrecognized.
    #[must_use]
    pub fn of(model: &user::Model) -> Option<Self> {
        model.role.as_deref().and_then(|raw| raw.parse().ok())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tallier" => Ok(Self::Tallier),
            "accountant" => Ok(Self::Accountant),
            "admin" => Ok(Self::Admin),
            other => Err(Error::validation(format!("Unknown role '{other}'"))),
        }
    }
}

/// Stores a new user with the default `tallier` role, overwriting any
/// existing record for the same id.
pub async fn create_user(db: &DatabaseConnection, uid: &str, email: &str) -> Result<user::Model> {
    if uid.trim().is_empty() || email.trim().is_empty() {
        return Err(Error::validation("uid and email are required"));
    }

    let uid = uid.trim().to_string();
    let email = email.trim().to_string();
    let role = Some(Role::Tallier.as_str().to_string());

    let stored = if let Some(existing) = get_user(db, &uid).await? {
        let mut active: user::ActiveModel = existing.into();
        active.email = Set(email);
        active.role = Set(role);
        active.update(db).await?
    } else {
        user::ActiveModel {
            uid: Set(uid),
            email: Set(email),
            role: Set(role),
        }
        .insert(db)
        .await?
    };

    info!(uid = %stored.uid, "Stored user data");
    Ok(stored)
}

pub async fn get_user(db: &DatabaseConnection, uid: &str) -> Result<Option<user::Model>> {
    User::find_by_id(uid.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Looks a user up by login email.
pub async fn find_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All users ordered by email.
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>> {
    User::find()
        .order_by_asc(user::Column::Email)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns the role of `target_uid`.
///
/// Callers always see their own role; other users' roles need `admin`.
#[instrument(skip(db))]
pub async fn read_role(
    db: &DatabaseConnection,
    caller: &Caller,
    target_uid: &str,
) -> Result<Option<Role>> {
    let requester = guard::caller_user(db, caller)
        .await?
        .ok_or_else(|| Error::forbidden("User not found"))?;

    if requester.uid == target_uid {
        return Ok(Role::of(&requester));
    }

    if Role::of(&requester) != Some(Role::Admin) {
        return Err(Error::forbidden("Only admins can view other users' roles"));
    }

    let target = get_user(db, target_uid)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;
    Ok(Role::of(&target))
}

/// Lists all users. Admin only.
pub async fn list_users_as(db: &DatabaseConnection, caller: &Caller) -> Result<Vec<user::Model>> {
    guard::require_role(db, caller, &[Role::Admin]).await?;
    list_users(db).await
}

/// Changes a user's role. Admin only.
#[instrument(skip(db))]
pub async fn change_role(
    db: &DatabaseConnection,
    caller: &Caller,
    target_uid: &str,
    role: Role,
) -> Result<user::Model> {
    guard::require_role(db, caller, &[Role::Admin]).await?;

    let target = get_user(db, target_uid)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;

    let mut active: user::ActiveModel = target.into();
    active.role = Set(Some(role.as_str().to_string()));
    let updated = active.update(db).await?;

    info!(uid = %target_uid, %role, "User role updated");
    Ok(updated)
}

/// Deletes a user. Admin only.
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, caller: &Caller, target_uid: &str) -> Result<()> {
    guard::require_role(db, caller, &[Role::Admin]).await?;

    let result = User::delete_by_id(target_uid.to_string()).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("User"));
    }

    info!(uid = %target_uid, "User deleted");
    Ok(())
}
