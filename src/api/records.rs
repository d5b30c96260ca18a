//! Per-submitter record listing.

use crate::{
    api::AppState,
    core::{
        guard,
        tally::{self, TallyRecord},
        user::Role,
    },
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use std::collections::BTreeMap;

/// Records keyed by their storage key.
pub type RecordMap = BTreeMap<String, TallyRecord>;

pub fn into_record_map(records: Vec<TallyRecord>) -> RecordMap {
    records
        .into_iter()
        .map(|record| (record.key.to_string(), record))
        .collect()
}

/// GET /api/records/:email
///
/// Always 200; an unknown submitter yields an empty map. With signed
/// sessions a caller may list only their own records unless they are an
/// admin or accountant.
pub async fn records_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RecordMap>> {
    if let Some(caller) = state.session(&headers)? {
        if caller.email != email {
            guard::require_role(&state.db, &caller, &[Role::Admin, Role::Accountant]).await?;
        }
    }

    let records = tally::tallies_by_submitter(&state.db, &email).await?;
    Ok(Json(into_record_map(records)))
}
