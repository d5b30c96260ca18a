//! Record keys - how a tally record is addressed in storage.
//!
//! A record is addressed by its business triple rendered as
//! `{date}_{binId}_{condition}`. Bin ids may not contain `_`, which keeps the
//! rendering reversible: splitting a key on `_` always gives back the triple.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const SEPARATOR: char = '_';

/// Item state, which also selects the standard price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// New items, tagged white
    White,
    /// Used items, tagged orange
    Orange,
}

impl Condition {
    /// Both conditions, in display order.
    pub const ALL: [Self; 2] = [Self::White, Self::Orange];

    /// Lowercase name used in keys, JSON and the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Orange => "orange",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "white" => Ok(Self::White),
            "orange" => Ok(Self::Orange),
            other => Err(Error::validation(format!(
                "Unknown condition '{other}' (expected 'white' or 'orange')"
            ))),
        }
    }
}

/// Storage address of one tally record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TallyKey {
    date: i64,
    bin_id: String,
    condition: Condition,
}

impl TallyKey {
    /// Builds a key, rejecting bin ids that would make the key ambiguous.
    pub fn new(date: i64, bin_id: impl Into<String>, condition: Condition) -> Result<Self> {
        let bin_id = bin_id.into();
        let trimmed = bin_id.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("Bin id cannot be empty"));
        }
        if trimmed.contains(SEPARATOR) {
            return Err(Error::validation(format!(
                "Bin id '{trimmed}' cannot contain '{SEPARATOR}'"
            )));
        }
        Ok(Self {
            date,
            bin_id: trimmed.to_string(),
            condition,
        })
    }

    /// Tallied date, Unix seconds.
    #[must_use]
    pub const fn date(&self) -> i64 {
        self.date
    }

    #[must_use]
    pub fn bin_id(&self) -> &str {
        &self.bin_id
    }

    #[must_use]
    pub const fn condition(&self) -> Condition {
        self.condition
    }
}

impl fmt::Display for TallyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.date, self.bin_id, self.condition
        )
    }
}

impl FromStr for TallyKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::validation(format!("Malformed tally key '{s}'"));

        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [date, bin_id, condition] = parts.as_slice() else {
            return Err(malformed());
        };
        let date = date.parse::<i64>().map_err(|_| malformed())?;
        let condition = condition.parse::<Condition>()?;

        Self::new(date, *bin_id, condition)
    }
}

impl Serialize for TallyKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TallyKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
