//! Tally counts - per-price counters and the manual-price bookkeeping around them.
//!
//! [`TallyCounts`] is the price → count map stored on a record. Counts never go
//! below zero. [`TallySheet`] pairs a count map with the set of keys the
//! operator added by hand, which is what the editing flow works on.

use crate::{
    core::{key::Condition, pricing},
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Price key (cents) → count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TallyCounts(BTreeMap<u32, u32>);

impl TallyCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a bucket, zero when the bucket is absent.
    #[must_use]
    pub fn get(&self, key: u32) -> u32 {
        self.0.get(&key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn contains(&self, key: u32) -> bool {
        self.0.contains_key(&key)
    }

    /// Applies `delta` to a bucket and returns the new count.
    ///
    /// The stored value is `max(old + delta, 0)`, saturating at `u32::MAX`.
    /// The bucket is created if missing, even when the result is zero.
    pub fn adjust(&mut self, key: u32, delta: i64) -> u32 {
        let current = i64::from(self.get(key));
        let next = current.saturating_add(delta).clamp(0, i64::from(u32::MAX));
        // Cast safety: clamped into the u32 range above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let next = next as u32;
        self.0.insert(key, next);
        next
    }

    /// Adds a bucket with a zero count if it is not present yet.
    pub fn ensure(&mut self, key: u32) {
        self.0.entry(key).or_insert(0);
    }

    /// Removes a bucket entirely, returning its count.
    pub fn remove(&mut self, key: u32) -> Option<u32> {
        self.0.remove(&key)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|&count| u64::from(count)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Buckets in ascending price order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().map(|(&key, &count)| (key, count))
    }

    /// Bucket keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }
}

impl FromIterator<(u32, u32)> for TallyCounts {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of asking to remove a manual price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualPriceRemoval {
    /// The bucket was removed; carries the count it had.
    Removed {
        /// Count discarded with the bucket
        count: u32,
    },
    /// The bucket still holds items and the caller has not confirmed.
    NeedsConfirmation {
        /// Count that would be discarded
        count: u32,
    },
}

/// Counts for one condition plus the keys that were added by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallySheet {
    /// Price key → count
    pub counts: TallyCounts,
    /// Keys that are manual prices
    pub manual_keys: BTreeSet<u32>,
}

impl TallySheet {
    #[must_use]
    pub fn new(counts: TallyCounts, manual_keys: BTreeSet<u32>) -> Self {
        Self {
            counts,
            manual_keys,
        }
    }

    /// Rebuilds a sheet from stored data.
    ///
    /// Explicit markers win. Records written without them fall back to the
    /// legacy threshold guess for their condition.
    #[must_use]
    pub fn from_stored(
        condition: Condition,
        counts: TallyCounts,
        manual_keys: Option<BTreeSet<u32>>,
    ) -> Self {
        let manual_keys = manual_keys
            .unwrap_or_else(|| pricing::infer_manual_keys(condition, counts.keys()));
        Self::new(counts, manual_keys)
    }

    /// Adds a manual price with a zero count and returns its key.
    ///
    /// # Errors
    /// Returns a validation error if the price is not a positive number, is
    /// one of the standard prices for `condition`, or the bucket already
    /// exists.
    pub fn add_manual_price(&mut self, condition: Condition, price: f64) -> Result<u32> {
        let key = pricing::price_key(price)?;
        if pricing::is_standard_key(condition, key) {
            return Err(Error::validation(format!(
                "Price ${price:.2} is a standard {condition} price"
            )));
        }
        if self.counts.contains(key) {
            return Err(Error::validation(format!(
                "Price ${price:.2} is already listed"
            )));
        }
        self.counts.ensure(key);
        self.manual_keys.insert(key);
        Ok(key)
    }

    /// Removes a manual price.
    ///
    /// A bucket holding a non-zero count is only removed when `confirmed` is
    /// set; otherwise nothing changes and [`ManualPriceRemoval::NeedsConfirmation`]
    /// is returned.
    ///
    /// # Errors
    /// Returns not-found if `key` is not a manual price on this sheet.
    pub fn remove_manual_price(&mut self, key: u32, confirmed: bool) -> Result<ManualPriceRemoval> {
        if !self.manual_keys.contains(&key) {
            return Err(Error::not_found("Manual price"));
        }

        let count = self.counts.get(key);
        if count > 0 && !confirmed {
            return Ok(ManualPriceRemoval::NeedsConfirmation { count });
        }

        self.counts.remove(key);
        self.manual_keys.remove(&key);
        Ok(ManualPriceRemoval::Removed { count })
    }

    /// Manual prices in dollars, ascending.
    #[must_use]
    pub fn manual_prices(&self) -> Vec<f64> {
        self.manual_keys
            .iter()
            .map(|&key| pricing::key_to_price(key))
            .collect()
    }
}
