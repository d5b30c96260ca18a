//! Tally endpoints - submit, read, edit, adjust and delete records.

use crate::{
    api::AppState,
    core::{
        counts::TallyCounts,
        key::TallyKey,
        pricing,
        tally::{self, TallyRecord, TallySubmission, TallyUpdate},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::info;

/// A record as returned to clients, with its manual prices and total.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyView {
    #[serde(flatten)]
    pub record: TallyRecord,
    pub manual_prices: Vec<f64>,
    pub total: u64,
}

impl From<TallyRecord> for TallyView {
    fn from(record: TallyRecord) -> Self {
        Self {
            manual_prices: record.sheet().manual_prices(),
            total: record.total(),
            record,
        }
    }
}

/// A key that does not parse cannot address a stored record.
fn parse_key(raw: &str) -> Result<TallyKey> {
    raw.parse::<TallyKey>()
        .map_err(|_| Error::not_found("Tally"))
}

/// POST /api/tally/:binId/tallies/:date
pub async fn submit_tally(
    State(state): State<AppState>,
    Path((bin_id, date)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut submission): Json<TallySubmission>,
) -> Result<(StatusCode, Json<Value>)> {
    if state.auth.is_signed() {
        let caller = state.caller(&headers, None)?;
        submission.submitted_by = Some(caller.email);
    }

    let new = submission.into_new_tally(&bin_id, &date)?;
    let record = tally::set_tally(&state.db, new).await?;
    let key = record.key.to_string();
    info!(%key, submitted_by = %record.submitted_by, "Tally submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Tally data saved successfully",
            "key": key,
            "tally": TallyView::from(record),
        })),
    ))
}

/// GET /api/tally/:key
pub async fn get_tally(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TallyView>> {
    state.session(&headers)?;
    let key = parse_key(&raw_key)?;

    tally::get_tally(&state.db, &key)
        .await?
        .map(|record| Json(TallyView::from(record)))
        .ok_or_else(|| Error::not_found("Tally"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub counter: Option<String>,
    pub tallier: Option<String>,
    pub tallies: Option<TallyCounts>,
    pub manual_keys: Option<BTreeSet<u32>>,
    pub submitted_by: Option<String>,
}

impl From<UpdateRequest> for TallyUpdate {
    fn from(request: UpdateRequest) -> Self {
        Self {
            counter: request.counter,
            tallier: request.tallier,
            tallies: request.tallies,
            manual_keys: request.manual_keys,
        }
    }
}

/// PUT /api/tally/:key
pub async fn update_tally(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<TallyView>> {
    let caller = state.caller(&headers, request.submitted_by.as_deref())?;
    let key = parse_key(&raw_key)?;

    let record = tally::update_tally(&state.db, &key, &caller, request.into()).await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
pub struct Adjustment {
    /// Price in dollars
    pub price: f64,
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub adjustments: Vec<Adjustment>,
    pub submitted_by: Option<String>,
}

/// PATCH /api/tally/:key/counts
pub async fn adjust_counts(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<TallyView>> {
    let caller = state.caller(&headers, request.submitted_by.as_deref())?;
    let key = parse_key(&raw_key)?;

    let adjustments = request
        .adjustments
        .iter()
        .map(|adj| pricing::price_key(adj.price).map(|key| (key, adj.delta)))
        .collect::<Result<Vec<_>>>()?;

    let record = tally::adjust_tally_counts(&state.db, &key, &caller, &adjustments).await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPriceDeleteRequest {
    pub tally_key: String,
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

/// DELETE /api/tally/manual-prices/:priceKey
pub async fn delete_manual_price(
    State(state): State<AppState>,
    Path(price_key): Path<u32>,
    headers: HeaderMap,
    Json(request): Json<ManualPriceDeleteRequest>,
) -> Result<Json<Value>> {
    let caller = state.caller(&headers, request.submitted_by.as_deref())?;
    let key = parse_key(&request.tally_key)?;

    let count =
        tally::delete_manual_price(&state.db, &key, &caller, price_key, request.confirm).await?;
    Ok(Json(json!({
        "message": "Manual price deleted successfully",
        "priceKey": price_key,
        "count": count,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub submitted_by: Option<String>,
}

/// DELETE /api/records/:key and DELETE /api/tallies/:key
pub async fn delete_tally(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
    body: Option<Json<DeleteRequest>>,
) -> Result<Json<Value>> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let caller = state.caller(&headers, request.submitted_by.as_deref())?;
    let key = parse_key(&raw_key)?;

    tally::delete_tally(&state.db, &key, &caller).await?;
    Ok(Json(json!({ "message": "Tally deleted successfully" })))
}
