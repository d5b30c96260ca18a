//! Shared test utilities for Spinventory.
//!
//! Helpers for setting up an in-memory database and seeding it with tallies
//! and users that have sensible defaults.

use crate::{
    core::{
        key::{Condition, TallyKey},
        tally::{self, NewTally, TallyRecord},
        user::{self, Role},
    },
    entities,
    errors::Result,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Tallied date used by the default helpers (2023-11-14 UTC).
pub const TEST_DATE: i64 = 1_700_000_000;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all database tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Key for a white tally of `bin_id` on [`TEST_DATE`].
///
/// # Panics
/// Panics if `bin_id` is not a valid bin id.
#[allow(clippy::unwrap_used)]
pub fn test_key(bin_id: &str) -> TallyKey {
    TallyKey::new(TEST_DATE, bin_id, Condition::White).unwrap()
}

/// Creates a white tally for `bin_id` submitted by `submitted_by`.
///
/// # Defaults
/// * date: [`TEST_DATE`]
/// * counter: "C1", tallier: "Sam"
/// * tallies: `{199: 3, 5000: 1}`, no manual prices
pub async fn create_test_tally(
    db: &DatabaseConnection,
    bin_id: &str,
    submitted_by: &str,
) -> Result<TallyRecord> {
    create_custom_tally(db, bin_id, Condition::White, TEST_DATE, submitted_by).await
}

/// Creates a tally with a custom condition and date.
pub async fn create_custom_tally(
    db: &DatabaseConnection,
    bin_id: &str,
    condition: Condition,
    date: i64,
    submitted_by: &str,
) -> Result<TallyRecord> {
    let new = NewTally {
        key: TallyKey::new(date, bin_id, condition)?,
        counter: "C1".to_string(),
        tallier: "Sam".to_string(),
        counts: [(199, 3), (5000, 1)].into_iter().collect(),
        manual_keys: std::collections::BTreeSet::new(),
        created_at: date,
        submitted_by: submitted_by.to_string(),
    };
    tally::set_tally(db, new).await
}

/// Creates a user and gives them `role`.
pub async fn create_test_user(
    db: &DatabaseConnection,
    uid: &str,
    email: &str,
    role: Role,
) -> Result<entities::user::Model> {
    let created = user::create_user(db, uid, email).await?;
    if role == Role::Tallier {
        return Ok(created);
    }

    let mut active: entities::user::ActiveModel = created.into();
    active.role = Set(Some(role.as_str().to_string()));
    Ok(active.update(db).await?)
}
