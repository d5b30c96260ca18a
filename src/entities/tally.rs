//! Tally entity - One submission of counts for a bin, date and condition.
//!
//! The primary key is the composite record key (`{date}_{binId}_{condition}`),
//! so a second submission for the same triple overwrites the first.
//! Counts and manual-price markers are stored as JSON columns, mirroring the
//! document shape clients send and receive.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tally database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tallies")]
pub struct Model {
    /// Composite record key, e.g. `1700000000_42_white`
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// Operator-assigned bin identifier
    pub bin_id: String,
    /// `white` (new) or `orange` (used)
    pub condition: String,
    /// Free-text operator identifier
    pub counter: String,
    /// Free-text name of the person tallying
    pub tallier: String,
    /// Price key (cents) → count, as a JSON object
    pub tallies: Json,
    /// Price keys added by hand, as a JSON array
    pub manual_keys: Json,
    /// Tallied date as Unix seconds
    pub created_at: i64,
    /// Email of the submitter; never changes after creation
    pub submitted_by: String,
}

/// `Tally` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
