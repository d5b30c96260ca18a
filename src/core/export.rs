//! Export shaping - flattening tally records into CSV rows and bin summaries.

use crate::core::{key::Condition, tally::TallyRecord};
use chrono::DateTime;
use serde::Serialize;

/// Timestamp layout used in the `createdAt` export column.
const CREATED_AT_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

/// One CSV row: a single price/count pair of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub bin_id: String,
    pub condition: Condition,
    pub counter: String,
    pub created_at: String,
    pub submitted_by: String,
    pub tallier: String,
    /// Bucket key (price in cents); `None` only on the placeholder row of an
    /// empty record
    pub price: Option<u32>,
    pub count: Option<u32>,
}

/// Per-record summary shown on the bin overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinCount {
    pub key: String,
    pub bin_id: String,
    pub condition: Condition,
    pub submitted_by: String,
    pub total_tally: u64,
}

fn format_created_at(created_at: i64) -> String {
    DateTime::from_timestamp(created_at, 0)
        .map(|at| at.format(CREATED_AT_FORMAT).to_string())
        .unwrap_or_default()
}

/// Flattens one record into export rows.
///
/// Zero counts are skipped. A record with no buckets at all still gets one
/// row with blank price and count so it shows up in the sheet.
#[must_use]
pub fn flatten_rows(record: &TallyRecord) -> Vec<ExportRow> {
    let row = |price: Option<u32>, count: Option<u32>| ExportRow {
        bin_id: record.bin_id.clone(),
        condition: record.condition,
        counter: record.counter.clone(),
        created_at: format_created_at(record.created_at),
        submitted_by: record.submitted_by.clone(),
        tallier: record.tallier.clone(),
        price,
        count,
    };

    if record.tallies.is_empty() {
        return vec![row(None, None)];
    }

    record
        .tallies
        .iter()
        .filter(|&(_, count)| count > 0)
        .map(|(key, count)| row(Some(key), Some(count)))
        .collect()
}

/// Flattens a set of records, in the order given.
#[must_use]
pub fn flatten_all<'a>(records: impl IntoIterator<Item = &'a TallyRecord>) -> Vec<ExportRow> {
    records.into_iter().flat_map(flatten_rows).collect()
}

#[must_use]
pub fn bin_counts<'a>(records: impl IntoIterator<Item = &'a TallyRecord>) -> Vec<BinCount> {
    records
        .into_iter()
        .map(|record| BinCount {
            key: record.key.to_string(),
            bin_id: record.bin_id.clone(),
            condition: record.condition,
            submitted_by: record.submitted_by.clone(),
            total_tally: record.total(),
        })
        .collect()
}

/// Sum of `total_tally` over the given summaries.
#[must_use]
pub fn grand_total(counts: &[BinCount]) -> u64 {
    counts.iter().map(|c| c.total_tally).sum()
}
