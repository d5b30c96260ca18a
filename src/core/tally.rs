//! Tally business logic - submitting, reading, editing and deleting tally records.
//!
//! These functions are the storage gateway for tallies: point reads by key,
//! overwrite writes, shallow merges, removal, and the two list queries (by
//! submitter and by tallied-date range). Mutations go through the ownership
//! guard first. The read-check-write sequence is not transactional; two
//! concurrent edits of one record resolve as last write wins.

use crate::{
    core::{
        counts::{ManualPriceRemoval, TallyCounts, TallySheet},
        guard::{self, Caller},
        key::{Condition, TallyKey},
    },
    entities::{Tally, tally},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// A stored tally record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyRecord {
    /// Storage key
    pub key: TallyKey,
    pub bin_id: String,
    pub condition: Condition,
    pub counter: String,
    pub tallier: String,
    /// Price key → count
    pub tallies: TallyCounts,
    /// Explicit manual-price markers; `None` for records written without them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_keys: Option<BTreeSet<u32>>,
    /// Tallied date, Unix seconds
    pub created_at: i64,
    pub submitted_by: String,
}

impl TallyRecord {
    /// Counts plus manual markers, with the legacy fallback applied.
    #[must_use]
    pub fn sheet(&self) -> TallySheet {
        TallySheet::from_stored(
            self.condition,
            self.tallies.clone(),
            self.manual_keys.clone(),
        )
    }

    /// Sum of all counts on the record.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.tallies.total()
    }
}

impl TryFrom<tally::Model> for TallyRecord {
    type Error = Error;

    fn try_from(model: tally::Model) -> Result<Self> {
        let key: TallyKey = model.key.parse().map_err(|e| {
            Error::Database(DbErr::Custom(format!("Stored tally key is unusable: {e}")))
        })?;
        let tallies: TallyCounts = serde_json::from_value(model.tallies)?;
        let manual_keys: Option<BTreeSet<u32>> = serde_json::from_value(model.manual_keys)?;

        Ok(Self {
            bin_id: key.bin_id().to_string(),
            condition: key.condition(),
            key,
            counter: model.counter,
            tallier: model.tallier,
            tallies,
            manual_keys,
            created_at: model.created_at,
            submitted_by: model.submitted_by,
        })
    }
}

/// A complete record ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTally {
    pub key: TallyKey,
    pub counter: String,
    pub tallier: String,
    pub counts: TallyCounts,
    pub manual_keys: BTreeSet<u32>,
    pub created_at: i64,
    pub submitted_by: String,
}

/// Submission body as the client sends it. Every field is optional here so
/// that a missing one is reported as a validation error instead of a parse
/// failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallySubmission {
    pub condition: Option<String>,
    pub counter: Option<String>,
    pub tallier: Option<String>,
    pub submitted_by: Option<String>,
    pub tallies: Option<TallyCounts>,
    pub manual_keys: Option<BTreeSet<u32>>,
    pub created_at: Option<i64>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TallySubmission {
    /// Checks that every required field is present and builds the record.
    ///
    /// Presence is all that is checked: empty strings and a zero `createdAt`
    /// count as missing.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] when a field is missing or when the bin,
    /// date or condition cannot form a key.
    pub fn into_new_tally(self, bin_id: &str, date: &str) -> Result<NewTally> {
        let (
            Some(condition),
            Some(counter),
            Some(tallier),
            Some(submitted_by),
            Some(counts),
            Some(created_at),
        ) = (
            present(self.condition),
            present(self.counter),
            present(self.tallier),
            present(self.submitted_by),
            self.tallies,
            self.created_at.filter(|&at| at != 0),
        )
        else {
            return Err(Error::validation("All fields are required"));
        };

        let date = date
            .parse::<i64>()
            .map_err(|_| Error::validation(format!("Date '{date}' is not a Unix timestamp")))?;
        let key = TallyKey::new(date, bin_id, condition.parse()?)?;

        Ok(NewTally {
            key,
            counter,
            tallier,
            counts,
            manual_keys: self.manual_keys.unwrap_or_default(),
            created_at,
            submitted_by,
        })
    }
}

/// Fields an owner may change on an existing record. Key components and the
/// submitter are fixed for the life of the record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyUpdate {
    pub counter: Option<String>,
    pub tallier: Option<String>,
    pub tallies: Option<TallyCounts>,
    pub manual_keys: Option<BTreeSet<u32>>,
}

/// Manual markers may only name buckets that exist.
fn prune_markers(manual_keys: &BTreeSet<u32>, counts: &TallyCounts) -> BTreeSet<u32> {
    manual_keys
        .iter()
        .copied()
        .filter(|&key| counts.contains(key))
        .collect()
}

/// Point read by key.
#[instrument(skip(db), fields(key = %key))]
pub async fn get_tally(db: &DatabaseConnection, key: &TallyKey) -> Result<Option<TallyRecord>> {
    debug!("Fetching tally");
    Tally::find_by_id(key.to_string())
        .one(db)
        .await?
        .map(TallyRecord::try_from)
        .transpose()
}

/// Writes a full record under its key, replacing whatever was there.
///
/// Only the original submitter may overwrite an existing record; the stored
/// `submitted_by` is never replaced.
///
/// # Errors
/// Returns [`Error::Forbidden`] if the key holds another submitter's record.
#[instrument(skip(db, new), fields(key = %new.key))]
pub async fn set_tally(db: &DatabaseConnection, new: NewTally) -> Result<TallyRecord> {
    if let Some(existing) = get_tally(db, &new.key).await? {
        guard::ensure_owner(&existing, &Caller::from_email(&new.submitted_by), "overwrite")?;
    }

    let manual_keys = prune_markers(&new.manual_keys, &new.counts);

    let active = tally::ActiveModel {
        key: Set(new.key.to_string()),
        bin_id: Set(new.key.bin_id().to_string()),
        condition: Set(new.key.condition().to_string()),
        counter: Set(new.counter.clone()),
        tallier: Set(new.tallier.clone()),
        tallies: Set(serde_json::to_value(&new.counts)?),
        manual_keys: Set(serde_json::to_value(&manual_keys)?),
        created_at: Set(new.created_at),
        submitted_by: Set(new.submitted_by.clone()),
    };

    Tally::insert(active)
        .on_conflict(
            OnConflict::column(tally::Column::Key)
                .update_columns([
                    tally::Column::BinId,
                    tally::Column::Condition,
                    tally::Column::Counter,
                    tally::Column::Tallier,
                    tally::Column::Tallies,
                    tally::Column::ManualKeys,
                    tally::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    info!("Tally data saved");
    Ok(TallyRecord {
        bin_id: new.key.bin_id().to_string(),
        condition: new.key.condition(),
        key: new.key,
        counter: new.counter,
        tallier: new.tallier,
        tallies: new.counts,
        manual_keys: Some(manual_keys),
        created_at: new.created_at,
        submitted_by: new.submitted_by,
    })
}

/// Saves a changed record over the stored one.
async fn save_record(db: &DatabaseConnection, record: &TallyRecord) -> Result<()> {
    let manual_keys = record.manual_keys.clone().unwrap_or_default();

    let active = tally::ActiveModel {
        key: Set(record.key.to_string()),
        counter: Set(record.counter.clone()),
        tallier: Set(record.tallier.clone()),
        tallies: Set(serde_json::to_value(&record.tallies)?),
        manual_keys: Set(serde_json::to_value(prune_markers(&manual_keys, &record.tallies))?),
        ..Default::default()
    };
    active.update(db).await?;
    Ok(())
}

/// Shallow-merges `update` into a record the caller owns.
///
/// Legacy records without markers get explicit markers on their first edit,
/// taken from the threshold guess unless the update supplies them.
#[instrument(skip(db, update), fields(key = %key))]
pub async fn update_tally(
    db: &DatabaseConnection,
    key: &TallyKey,
    caller: &Caller,
    update: TallyUpdate,
) -> Result<TallyRecord> {
    let mut record = guard::load_owned_tally(db, key, caller, "update").await?;

    if let Some(counter) = update.counter {
        record.counter = counter;
    }
    if let Some(tallier) = update.tallier {
        record.tallier = tallier;
    }
    let markers = update
        .manual_keys
        .unwrap_or_else(|| record.sheet().manual_keys);
    if let Some(tallies) = update.tallies {
        record.tallies = tallies;
    }
    record.manual_keys = Some(prune_markers(&markers, &record.tallies));

    save_record(db, &record).await?;
    info!("Tally updated");
    Ok(record)
}

/// Applies count adjustments (`price key`, `delta`) to a record the caller
/// owns. Each bucket is clamped at zero independently.
#[instrument(skip(db, adjustments), fields(key = %key))]
pub async fn adjust_tally_counts(
    db: &DatabaseConnection,
    key: &TallyKey,
    caller: &Caller,
    adjustments: &[(u32, i64)],
) -> Result<TallyRecord> {
    let mut record = guard::load_owned_tally(db, key, caller, "update").await?;
    let mut sheet = record.sheet();

    for &(price_key, delta) in adjustments {
        sheet.counts.adjust(price_key, delta);
    }
    record.tallies = sheet.counts;
    record.manual_keys = Some(sheet.manual_keys);

    save_record(db, &record).await?;
    debug!(adjustments = adjustments.len(), "Tally counts adjusted");
    Ok(record)
}

/// Deletes a record the caller owns.
#[instrument(skip(db), fields(key = %key))]
pub async fn delete_tally(db: &DatabaseConnection, key: &TallyKey, caller: &Caller) -> Result<()> {
    guard::load_owned_tally(db, key, caller, "delete").await?;
    Tally::delete_by_id(key.to_string()).exec(db).await?;
    info!("Tally deleted");
    Ok(())
}

/// Removes a manual price from a record the caller owns and returns the
/// count that went with it.
///
/// # Errors
/// Not found if the record is absent or `price_key` is not a manual price on
/// it; forbidden for other submitters; confirmation required if the bucket
/// still holds items and `confirmed` is false.
#[instrument(skip(db), fields(key = %key))]
pub async fn delete_manual_price(
    db: &DatabaseConnection,
    key: &TallyKey,
    caller: &Caller,
    price_key: u32,
    confirmed: bool,
) -> Result<u32> {
    let mut record = guard::load_owned_tally(db, key, caller, "delete").await?;
    let mut sheet = record.sheet();

    match sheet.remove_manual_price(price_key, confirmed)? {
        ManualPriceRemoval::NeedsConfirmation { count } => Err(Error::ConfirmationRequired {
            message: format!("Manual price {price_key} still holds {count} item(s)"),
        }),
        ManualPriceRemoval::Removed { count } => {
            record.tallies = sheet.counts;
            record.manual_keys = Some(sheet.manual_keys);
            save_record(db, &record).await?;
            info!(price_key, count, "Manual price deleted");
            Ok(count)
        }
    }
}

/// All records submitted by `email`, oldest tallied date first.
#[instrument(skip(db))]
pub async fn tallies_by_submitter(db: &DatabaseConnection, email: &str) -> Result<Vec<TallyRecord>> {
    Tally::find()
        .filter(tally::Column::SubmittedBy.eq(email))
        .order_by_asc(tally::Column::CreatedAt)
        .order_by_asc(tally::Column::Key)
        .all(db)
        .await?
        .into_iter()
        .map(TallyRecord::try_from)
        .collect()
}

/// All records whose tallied date lies in `start..=end`.
#[instrument(skip(db))]
pub async fn tallies_in_range(
    db: &DatabaseConnection,
    start: i64,
    end: i64,
) -> Result<Vec<TallyRecord>> {
    Tally::find()
        .filter(tally::Column::CreatedAt.between(start, end))
        .order_by_asc(tally::Column::CreatedAt)
        .order_by_asc(tally::Column::Key)
        .all(db)
        .await?
        .into_iter()
        .map(TallyRecord::try_from)
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn full_submission() -> TallySubmission {
        TallySubmission {
            condition: Some("white".to_string()),
            counter: Some("C1".to_string()),
            tallier: Some("Sam".to_string()),
            submitted_by: Some("a@x.com".to_string()),
            tallies: Some([(199, 3)].into_iter().collect()),
            manual_keys: None,
            created_at: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_submission_requires_every_field() {
        assert!(full_submission().into_new_tally("42", "1700000000").is_ok());

        let cases: [fn(&mut TallySubmission); 7] = [
            |s| s.condition = None,
            |s| s.counter = None,
            |s| s.tallier = None,
            |s| s.submitted_by = None,
            |s| s.tallies = None,
            |s| s.created_at = None,
            |s| s.counter = Some(String::new()),
        ];
        for strip in cases {
            let mut submission = full_submission();
            strip(&mut submission);
            let result = submission.into_new_tally("42", "1700000000");
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
    }

    #[test]
    fn test_submission_builds_triple_key() {
        let new = full_submission().into_new_tally("42", "1700000000").unwrap();
        assert_eq!(new.key.to_string(), "1700000000_42_white");
        assert_eq!(new.submitted_by, "a@x.com");

        let mut bad = full_submission();
        bad.condition = Some("purple".to_string());
        assert!(bad.into_new_tally("42", "1700000000").is_err());
        assert!(full_submission().into_new_tally("42", "today").is_err());
    }

    #[tokio::test]
    async fn test_set_then_get() -> Result<()> {
        let db = setup_test_db().await?;
        let new = full_submission().into_new_tally("42", "1700000000")?;
        let key = new.key.clone();

        let written = set_tally(&db, new).await?;
        let read = get_tally(&db, &key).await?.unwrap();
        assert_eq!(read, written);
        assert_eq!(read.tallies.get(199), 3);
        assert_eq!(read.bin_id, "42");
        assert_eq!(read.condition, Condition::White);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_overwrites() -> Result<()> {
        let db = setup_test_db().await?;
        let first = full_submission().into_new_tally("42", "1700000000")?;
        let key = first.key.clone();
        set_tally(&db, first).await?;

        let mut second = full_submission();
        second.tallies = Some([(299, 1)].into_iter().collect());
        set_tally(&db, second.into_new_tally("42", "1700000000")?).await?;

        let read = get_tally(&db, &key).await?.unwrap();
        assert!(!read.tallies.contains(199));
        assert_eq!(read.tallies.get(299), 1);
        assert_eq!(tallies_by_submitter(&db, "a@x.com").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_by_other_submitter_is_forbidden() -> Result<()> {
        let db = setup_test_db().await?;
        let original = create_test_tally(&db, "42", "a@x.com").await?;

        let mut takeover = full_submission();
        takeover.submitted_by = Some("b@x.com".to_string());
        takeover.tallies = Some(TallyCounts::new());
        let result = set_tally(&db, takeover.into_new_tally("42", "1700000000")?).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let read = get_tally(&db, &original.key).await?.unwrap();
        assert_eq!(read, original);
        assert_eq!(read.submitted_by, "a@x.com");
        assert!(tallies_by_submitter(&db, "b@x.com").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_is_none() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_tally(&db, &test_key("404")).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_by_owner_merges_fields() -> Result<()> {
        let db = setup_test_db().await?;
        let record = create_test_tally(&db, "42", "a@x.com").await?;

        let update = TallyUpdate {
            tallier: Some("Alex".to_string()),
            ..Default::default()
        };
        let updated = update_tally(&db, &record.key, &Caller::from_email("a@x.com"), update).await?;
        assert_eq!(updated.tallier, "Alex");
        assert_eq!(updated.counter, record.counter);
        assert_eq!(updated.tallies, record.tallies);
        assert_eq!(updated.submitted_by, "a@x.com");

        let read = get_tally(&db, &record.key).await?.unwrap();
        assert_eq!(read, updated);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_by_other_user_leaves_record_unchanged() -> Result<()> {
        let db = setup_test_db().await?;
        let record = create_test_tally(&db, "42", "a@x.com").await?;

        let update = TallyUpdate {
            tallies: Some(TallyCounts::new()),
            ..Default::default()
        };
        let result = update_tally(&db, &record.key, &Caller::from_email("b@x.com"), update).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let read = get_tally(&db, &record.key).await?.unwrap();
        assert_eq!(read, record);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_guarded() -> Result<()> {
        let db = setup_test_db().await?;
        let record = create_test_tally(&db, "42", "a@x.com").await?;

        let result = delete_tally(&db, &record.key, &Caller::from_email("b@x.com")).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        assert!(get_tally(&db, &record.key).await?.is_some());

        delete_tally(&db, &record.key, &Caller::from_email("a@x.com")).await?;
        assert!(get_tally(&db, &record.key).await?.is_none());

        let result = delete_tally(&db, &record.key, &Caller::from_email("a@x.com")).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_counts_clamps() -> Result<()> {
        let db = setup_test_db().await?;
        let record = create_test_tally(&db, "42", "a@x.com").await?;
        let owner = Caller::from_email("a@x.com");

        let adjusted = adjust_tally_counts(&db, &record.key, &owner, &[(199, -10), (299, 2)]).await?;
        assert_eq!(adjusted.tallies.get(199), 0);
        assert_eq!(adjusted.tallies.get(299), 2);

        let read = get_tally(&db, &record.key).await?.unwrap();
        assert_eq!(read.tallies, adjusted.tallies);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_manual_price_flow() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = Caller::from_email("a@x.com");

        let mut submission = full_submission();
        submission.condition = Some("orange".to_string());
        submission.tallies = Some([(500, 1), (12000, 2), (13000, 0)].into_iter().collect());
        submission.manual_keys = Some([12000, 13000].into_iter().collect());
        let record = set_tally(&db, submission.into_new_tally("7", "1700000000")?).await?;

        // Zero-count manual price goes without confirmation.
        assert_eq!(delete_manual_price(&db, &record.key, &owner, 13000, false).await?, 0);

        // Non-zero needs it.
        let result = delete_manual_price(&db, &record.key, &owner, 12000, false).await;
        assert!(matches!(result, Err(Error::ConfirmationRequired { .. })));
        assert!(get_tally(&db, &record.key).await?.unwrap().tallies.contains(12000));

        assert_eq!(delete_manual_price(&db, &record.key, &owner, 12000, true).await?, 2);
        let read = get_tally(&db, &record.key).await?.unwrap();
        assert!(!read.tallies.contains(12000));
        assert_eq!(read.manual_keys, Some(BTreeSet::new()));

        // Standard buckets are not manual prices.
        let result = delete_manual_price(&db, &record.key, &owner, 500, true).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let result =
            delete_manual_price(&db, &record.key, &Caller::from_email("b@x.com"), 500, true).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_queries() -> Result<()> {
        let db = setup_test_db().await?;
        create_custom_tally(&db, "1", Condition::White, 1_700_000_000, "a@x.com").await?;
        create_custom_tally(&db, "2", Condition::Orange, 1_700_086_400, "a@x.com").await?;
        create_custom_tally(&db, "3", Condition::White, 1_700_172_800, "b@x.com").await?;

        let mine = tallies_by_submitter(&db, "a@x.com").await?;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.submitted_by == "a@x.com"));

        // Range bounds are inclusive.
        let window = tallies_in_range(&db, 1_700_086_400, 1_700_172_800).await?;
        let bins: Vec<&str> = window.iter().map(|r| r.bin_id.as_str()).collect();
        assert_eq!(bins, vec!["2", "3"]);

        assert!(tallies_in_range(&db, 0, 10).await?.is_empty());
        assert!(tallies_by_submitter(&db, "nobody@x.com").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_record_without_markers() -> Result<()> {
        let db = setup_test_db().await?;
        let record = create_test_tally(&db, "9", "a@x.com").await?;

        // Simulate a record written before markers existed.
        let mut active: tally::ActiveModel = Tally::find_by_id(record.key.to_string())
            .one(&db)
            .await?
            .unwrap()
            .into();
        active.manual_keys = Set(serde_json::Value::Null);
        active.tallies = Set(serde_json::json!({ "5500": 1, "12000": 4 }));
        active.update(&db).await?;

        let read = get_tally(&db, &record.key).await?.unwrap();
        assert_eq!(read.manual_keys, None);
        // White threshold is 9999.
        assert_eq!(read.sheet().manual_prices(), vec![120.0]);
        Ok(())
    }
}
