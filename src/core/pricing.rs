//! Price bucket model - standard price lists and price-key sanitizing.
//!
//! Every bucket is stored under its price in cents. New (white) items use the
//! `$x.99` list from `$1.99` to `$99.99`; used (orange) items use whole dollars
//! from `$1` to `$100`. Anything else is a manual price added by the operator.

use crate::{
    core::key::Condition,
    errors::{Error, Result},
};
use std::collections::BTreeSet;

/// Whether `key` is one of the standard buckets for `condition`.
#[must_use]
pub const fn is_standard_key(condition: Condition, key: u32) -> bool {
    match condition {
        Condition::White => key >= 199 && key <= 9999 && key % 100 == 99,
        Condition::Orange => key >= 100 && key <= 10000 && key % 100 == 0,
    }
}

/// Converts a dollar price into its storage key (`round(price × 100)`).
///
/// # Errors
/// Returns a validation error for prices that are not finite, not positive,
/// or too large to fit a key.
pub fn price_key(price: f64) -> Result<u32> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::validation(format!(
            "Price must be a positive number, got {price}"
        )));
    }

    let cents = (price * 100.0).round();
    if cents < 1.0 || cents > f64::from(u32::MAX) {
        return Err(Error::validation(format!("Price {price} is out of range")));
    }

    // Cast safety: cents ∈ [1, u32::MAX] and already rounded.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(cents as u32)
}

/// Converts a storage key back into dollars.
#[must_use]
pub fn key_to_price(key: u32) -> f64 {
    f64::from(key) / 100.0
}

/// Key above which a bucket was assumed to be manual before records carried
/// explicit markers.
#[must_use]
pub const fn legacy_manual_threshold(condition: Condition) -> u32 {
    match condition {
        Condition::White => 9999,
        Condition::Orange => 10000,
    }
}

/// Guesses the manual keys of a record that has no explicit markers.
///
/// Only keys strictly above the legacy threshold are reported, so a manual
/// price entered below it (for example `$55.50` on orange) is missed.
pub fn infer_manual_keys<I>(condition: Condition, keys: I) -> BTreeSet<u32>
where
    I: IntoIterator<Item = u32>,
{
    let threshold = legacy_manual_threshold(condition);
    keys.into_iter().filter(|key| *key > threshold).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_standard_buckets_cover_the_price_lists() {
        let white: Vec<u32> = (1..=20_000).filter(|&k| is_standard_key(Condition::White, k)).collect();
        assert_eq!(white.len(), 99);
        assert_eq!(white.first(), Some(&price_key(1.99).unwrap()));
        assert_eq!(white.last(), Some(&price_key(99.99).unwrap()));

        let orange: Vec<u32> = (1..=20_000).filter(|&k| is_standard_key(Condition::Orange, k)).collect();
        assert_eq!(orange.len(), 100);
        assert_eq!(orange.first(), Some(&price_key(1.0).unwrap()));
        assert_eq!(orange.last(), Some(&price_key(100.0).unwrap()));
    }

    #[test]
    fn test_price_key_sanitizing() {
        assert_eq!(price_key(1.99).unwrap(), 199);
        assert_eq!(price_key(120.0).unwrap(), 12000);
        assert_eq!(price_key(55.0).unwrap(), 5500);
        assert_eq!(key_to_price(12000), 120.0);
    }

    #[test]
    fn test_price_key_rejects_bad_input() {
        assert!(price_key(0.0).is_err());
        assert!(price_key(-3.0).is_err());
        assert!(price_key(f64::NAN).is_err());
        assert!(price_key(f64::INFINITY).is_err());
        assert!(price_key(0.001).is_err());
    }

    #[test]
    fn test_legacy_threshold_inference() {
        // $120.00 on orange is above the threshold and reads back as manual.
        let manual = infer_manual_keys(Condition::Orange, [12000, 5500, 10000]);
        assert!(manual.contains(&12000));
        // $55.00 is a standard orange bucket and must not be reported.
        assert!(!manual.contains(&5500));
        assert!(!manual.contains(&10000));

        let manual = infer_manual_keys(Condition::White, [9999, 10050]);
        assert_eq!(manual.into_iter().collect::<Vec<_>>(), vec![10050]);
    }

    #[test]
    fn test_is_standard_key() {
        assert!(is_standard_key(Condition::White, 199));
        assert!(!is_standard_key(Condition::White, 200));
        assert!(is_standard_key(Condition::Orange, 5500));
        assert!(!is_standard_key(Condition::Orange, 5550));
        assert!(!is_standard_key(Condition::Orange, 12000));
    }
}
