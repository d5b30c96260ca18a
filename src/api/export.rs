//! Export endpoints - range queries, CSV rows, bin summaries and mail.
//!
//! Range endpoints are limited to admins and accountants.

use crate::{
    api::{AppState, records::{RecordMap, into_record_map}},
    core::{
        export::{self, BinCount, ExportRow},
        guard::{self, Caller},
        tally::{self, TallyRecord},
        user::Role,
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

const EXPORT_ROLES: &[Role] = &[Role::Admin, Role::Accountant];

/// Date window plus the trusted-mode identity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub requesting_user: Option<String>,
    /// Older clients send the requester as `userEmail`
    pub user_email: Option<String>,
    /// Restricts bin summaries to one bin
    pub bin_id: Option<String>,
}

impl RangeQuery {
    fn bounds(&self) -> Result<(i64, i64)> {
        let parse = |name: &str, value: Option<&String>| -> Result<i64> {
            let raw = value.ok_or_else(|| Error::validation(format!("{name} is required")))?;
            raw.trim()
                .parse()
                .map_err(|_| Error::validation(format!("{name} must be a Unix timestamp")))
        };
        Ok((
            parse("startDate", self.start_date.as_ref())?,
            parse("endDate", self.end_date.as_ref())?,
        ))
    }

    fn claimed(&self) -> Option<&str> {
        self.requesting_user
            .as_deref()
            .or(self.user_email.as_deref())
    }
}

/// Resolves the caller, checks the export role and loads the window.
async fn load_range(
    state: &AppState,
    headers: &HeaderMap,
    query: &RangeQuery,
) -> Result<(Caller, Vec<TallyRecord>)> {
    let caller = state.caller(headers, query.claimed())?;
    guard::require_role(&state.db, &caller, EXPORT_ROLES).await?;

    let (start, end) = query.bounds()?;
    let records = tally::tallies_in_range(&state.db, start, end).await?;
    Ok((caller, records))
}

/// GET /api/data and GET /api/user/date-range
///
/// An empty window is an empty map, not an error.
pub async fn records_in_range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<RecordMap>> {
    let (caller, records) = load_range(&state, &headers, &query).await?;
    info!(caller = %caller.email, records = records.len(), "Range export");
    Ok(Json(into_record_map(records)))
}

/// GET /api/data/rows
pub async fn export_rows(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<ExportRow>>> {
    let (_, records) = load_range(&state, &headers, &query).await?;
    Ok(Json(export::flatten_all(&records)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinSummary {
    pub bins: Vec<BinCount>,
    pub grand_total: u64,
}

/// GET /api/bins
pub async fn bin_summaries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<BinSummary>> {
    let (_, records) = load_range(&state, &headers, &query).await?;

    let filter = query.bin_id.as_deref().map(str::trim).filter(|b| !b.is_empty());
    let bins = export::bin_counts(
        records
            .iter()
            .filter(|record| filter.is_none_or(|bin| record.bin_id == bin)),
    );
    let grand_total = export::grand_total(&bins);
    Ok(Json(BinSummary { bins, grand_total }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub email: Option<String>,
    pub csv_content: Option<String>,
}

/// POST /api/send-email
pub async fn send_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<Value>> {
    state.session(&headers)?;

    let (Some(email), Some(csv)) = (request.email, request.csv_content) else {
        return Err(Error::validation("email and csvContent are required"));
    };
    state.mailer.send_csv(&email, &csv).await?;
    Ok(Json(json!({ "message": "Email sent successfully!" })))
}
