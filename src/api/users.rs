//! User endpoints - signup and the role administration screens.

use crate::{
    api::{AppState, RequestingUser},
    core::user::{self, Role},
    entities::UserModel,
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub uid: Option<String>,
    pub email: Option<String>,
}

/// POST /api/users
///
/// With signed sessions the new account is the session's own identity.
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let (uid, email) = match state.session(&headers)? {
        Some(caller) => (caller.uid, Some(caller.email)),
        None => (request.uid, request.email),
    };
    let (Some(uid), Some(email)) = (uid, email) else {
        return Err(Error::validation("uid and email are required"));
    };

    let stored = user::create_user(&state.db, &uid, &email).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User data stored successfully", "user": stored })),
    ))
}

/// GET /api/user
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RequestingUser>,
) -> Result<Json<Vec<UserModel>>> {
    let caller = state.caller(&headers, query.requesting_user.as_deref())?;
    Ok(Json(user::list_users_as(&state.db, &caller).await?))
}

/// GET /api/user/:userId
pub async fn get_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RequestingUser>,
) -> Result<Json<Value>> {
    let caller = state.caller(&headers, query.requesting_user.as_deref())?;
    let role = user::read_role(&state.db, &caller, &user_id).await?;
    Ok(Json(json!({ "role": role })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateRequest {
    pub role: Option<String>,
    pub requesting_user: Option<String>,
}

/// PUT /api/user/:userId
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RoleUpdateRequest>,
) -> Result<Json<Value>> {
    let caller = state.caller(&headers, request.requesting_user.as_deref())?;
    let role: Role = request
        .role
        .as_deref()
        .ok_or_else(|| Error::validation("role is required"))?
        .parse()?;

    let updated = user::change_role(&state.db, &caller, &user_id, role).await?;
    Ok(Json(json!({ "message": "User role updated successfully", "user": updated })))
}

/// DELETE /api/user/:userId
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RequestingUser>,
) -> Result<Json<Value>> {
    let caller = state.caller(&headers, query.requesting_user.as_deref())?;
    user::delete_user(&state.db, &caller, &user_id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
