//! HTTP surface - axum router, shared state and request identity helpers.
//!
//! Handlers are thin: they pull identity and input out of the request, call
//! into [`crate::core`], and let [`crate::errors::Error`] render failures.

use crate::{auth::AuthMode, core::guard::Caller, errors::Result, mail::Mailer};
use axum::{
    Router,
    http::HeaderMap,
    routing::{delete, get, patch, post},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod export;
pub mod health;
pub mod records;
pub mod tally;
pub mod users;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// How callers are identified
    pub auth: AuthMode,
    /// Transport for CSV exports
    pub mailer: Mailer,
}

impl AppState {
    #[must_use]
    pub const fn new(db: DatabaseConnection, auth: AuthMode, mailer: Mailer) -> Self {
        Self { db, auth, mailer }
    }

    /// Identity of a request that acts on someone's behalf.
    ///
    /// `claimed` is the client-supplied email, used only in trusted mode.
    pub fn caller(&self, headers: &HeaderMap, claimed: Option<&str>) -> Result<Caller> {
        self.auth.resolve(headers, claimed)
    }

    /// Verified session for read endpoints: required in signed mode, absent
    /// in trusted mode.
    pub fn session(&self, headers: &HeaderMap) -> Result<Option<Caller>> {
        if self.auth.is_signed() {
            self.auth.resolve(headers, None).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Query string carrying the trusted-mode identity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestingUser {
    pub requesting_user: Option<String>,
}

/// Builds the application router.
pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    let api = Router::new()
        .route("/api/users", post(users::create_user))
        .route("/api/user", get(users::list_users))
        .route("/api/user/date-range", get(export::records_in_range))
        .route(
            "/api/user/:user_id",
            get(users::get_user_role)
                .put(users::update_user_role)
                .delete(users::delete_user),
        )
        .route("/api/tally/:id/tallies/:date", post(tally::submit_tally))
        .route(
            "/api/tally/:id",
            get(tally::get_tally).put(tally::update_tally),
        )
        .route("/api/tally/:id/counts", patch(tally::adjust_counts))
        .route(
            "/api/tally/manual-prices/:price_key",
            delete(tally::delete_manual_price),
        )
        .route(
            "/api/records/:id",
            get(records::records_by_email).delete(tally::delete_tally),
        )
        .route("/api/tallies/:id", delete(tally::delete_tally))
        .route("/api/data", get(export::records_in_range))
        .route("/api/data/rows", get(export::export_rows))
        .route("/api/bins", get(export::bin_summaries))
        .route("/api/send-email", post(export::send_email));

    let router = Router::new()
        .merge(api)
        .merge(health::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
