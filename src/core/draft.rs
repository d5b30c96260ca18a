//! In-progress tally state for one counting session.
//!
//! An operator can flip between white and orange while counting. Each side keeps
//! its own sheet, so flipping never throws away counts from the other side.
//! Only the active side is submitted.

use crate::{
    core::{
        counts::{ManualPriceRemoval, TallySheet},
        key::{Condition, TallyKey},
        pricing,
        tally::NewTally,
    },
    errors::Result,
};

/// Draft of a submission with one sheet per condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyDraft {
    active: Condition,
    white: TallySheet,
    orange: TallySheet,
}

impl Default for TallyDraft {
    fn default() -> Self {
        Self::new(Condition::White)
    }
}

impl TallyDraft {
    /// Empty draft showing `active`.
    #[must_use]
    pub fn new(active: Condition) -> Self {
        Self {
            active,
            white: TallySheet::default(),
            orange: TallySheet::default(),
        }
    }

    /// Draft for editing a stored record: its sheet goes on its own side.
    #[must_use]
    pub fn editing(condition: Condition, sheet: TallySheet) -> Self {
        Self::new(condition).with_sheet(condition, sheet)
    }

    fn with_sheet(mut self, condition: Condition, sheet: TallySheet) -> Self {
        *self.sheet_mut(condition) = sheet;
        self
    }

    /// Same draft with `condition` visible; both sheets are kept as they are.
    #[must_use]
    pub fn with_condition(self, condition: Condition) -> Self {
        Self {
            active: condition,
            ..self
        }
    }

    #[must_use]
    pub const fn active(&self) -> Condition {
        self.active
    }

    #[must_use]
    pub const fn sheet(&self, condition: Condition) -> &TallySheet {
        match condition {
            Condition::White => &self.white,
            Condition::Orange => &self.orange,
        }
    }

    fn sheet_mut(&mut self, condition: Condition) -> &mut TallySheet {
        match condition {
            Condition::White => &mut self.white,
            Condition::Orange => &mut self.orange,
        }
    }

    /// Sheet of the visible condition.
    #[must_use]
    pub const fn active_sheet(&self) -> &TallySheet {
        self.sheet(self.active)
    }

    /// Steps the count for a dollar price on the visible side.
    ///
    /// # Errors
    /// Returns a validation error if the price cannot be turned into a key.
    pub fn adjust(&mut self, price: f64, delta: i64) -> Result<u32> {
        let key = pricing::price_key(price)?;
        Ok(self.sheet_mut(self.active).counts.adjust(key, delta))
    }

    /// Adds a manual price on the visible side.
    ///
    /// # Errors
    /// See [`TallySheet::add_manual_price`].
    pub fn add_manual_price(&mut self, price: f64) -> Result<u32> {
        let active = self.active;
        self.sheet_mut(active).add_manual_price(active, price)
    }

    /// Removes a manual price on the visible side, asking for confirmation
    /// when it still holds items.
    ///
    /// # Errors
    /// See [`TallySheet::remove_manual_price`].
    pub fn remove_manual_price(&mut self, price: f64, confirmed: bool) -> Result<ManualPriceRemoval> {
        let key = pricing::price_key(price)?;
        self.sheet_mut(self.active).remove_manual_price(key, confirmed)
    }

    /// Clears the visible side only.
    pub fn reset_active(&mut self) {
        *self.sheet_mut(self.active) = TallySheet::default();
    }

    /// Builds the submission for the visible side.
    ///
    /// # Errors
    /// Returns a validation error if the bin id cannot be used in a key.
    pub fn submission(
        &self,
        date: i64,
        bin_id: &str,
        counter: &str,
        tallier: &str,
        submitted_by: &str,
    ) -> Result<NewTally> {
        let key = TallyKey::new(date, bin_id, self.active)?;
        let sheet = self.active_sheet();
        Ok(NewTally {
            key,
            counter: counter.to_string(),
            tallier: tallier.to_string(),
            counts: sheet.counts.clone(),
            manual_keys: sheet.manual_keys.clone(),
            created_at: date,
            submitted_by: submitted_by.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{core::counts::TallyCounts, errors::Error};

    #[test]
    fn test_switching_condition_keeps_both_sides() {
        let mut draft = TallyDraft::default();
        draft.adjust(1.99, 1).unwrap();
        draft.adjust(1.99, 1).unwrap();

        let mut draft = draft.with_condition(Condition::Orange);
        assert_eq!(draft.active(), Condition::Orange);
        assert!(draft.active_sheet().counts.is_empty());
        draft.adjust(5.0, 4).unwrap();

        let draft = draft.with_condition(Condition::White);
        assert_eq!(draft.active_sheet().counts.get(199), 2);
        assert_eq!(draft.sheet(Condition::Orange).counts.get(500), 4);
    }

    #[test]
    fn test_submission_uses_active_side_only() {
        let mut draft = TallyDraft::new(Condition::Orange);
        draft.adjust(5.0, 2).unwrap();
        draft.add_manual_price(120.0).unwrap();
        let mut draft = draft.with_condition(Condition::White);
        draft.adjust(2.99, 7).unwrap();
        let draft = draft.with_condition(Condition::Orange);

        let submission = draft
            .submission(1_700_000_000, "42", "C1", "Sam", "a@x.com")
            .unwrap();
        assert_eq!(submission.key.to_string(), "1700000000_42_orange");
        assert_eq!(submission.counts.get(500), 2);
        assert_eq!(submission.counts.get(12000), 0);
        assert!(!submission.counts.contains(299));
        assert!(submission.manual_keys.contains(&12000));
    }

    #[test]
    fn test_manual_price_confirmation_flow() {
        let mut draft = TallyDraft::default();
        draft.add_manual_price(150.0).unwrap();
        draft.adjust(150.0, 1).unwrap();

        let outcome = draft.remove_manual_price(150.0, false).unwrap();
        assert_eq!(outcome, ManualPriceRemoval::NeedsConfirmation { count: 1 });

        let outcome = draft.remove_manual_price(150.0, true).unwrap();
        assert_eq!(outcome, ManualPriceRemoval::Removed { count: 1 });
        assert!(draft.active_sheet().manual_keys.is_empty());
    }

    #[test]
    fn test_manual_price_checked_against_active_list() {
        let mut draft = TallyDraft::new(Condition::Orange);
        assert!(draft.add_manual_price(20.0).is_err());
        let mut draft = draft.with_condition(Condition::White);
        assert_eq!(draft.add_manual_price(20.0).unwrap(), 2000);
    }

    #[test]
    fn test_editing_places_sheet_on_its_side() {
        let counts: TallyCounts = [(12000, 1)].into_iter().collect();
        let sheet = TallySheet::from_stored(Condition::Orange, counts, None);
        let draft = TallyDraft::editing(Condition::Orange, sheet);

        assert_eq!(draft.active(), Condition::Orange);
        assert_eq!(draft.active_sheet().manual_prices(), vec![120.0]);
        assert!(draft.sheet(Condition::White).counts.is_empty());
    }

    #[test]
    fn test_reset_clears_visible_side_only() {
        let mut draft = TallyDraft::default();
        draft.adjust(1.99, 1).unwrap();
        let mut draft = draft.with_condition(Condition::Orange);
        draft.adjust(1.0, 1).unwrap();
        draft.reset_active();

        assert!(draft.active_sheet().counts.is_empty());
        assert_eq!(draft.sheet(Condition::White).counts.get(199), 1);
    }

    #[test]
    fn test_submission_rejects_bad_bin() {
        let draft = TallyDraft::default();
        let result = draft.submission(1_700_000_000, "a_b", "C1", "Sam", "a@x.com");
        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
