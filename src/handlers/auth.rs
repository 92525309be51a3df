// handlers/auth.rs - token acquisition and user management

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{authenticate, create_user, ADMIN_ROLE};
use crate::error::ApiError;
use crate::middleware::{bearer_token, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// POST /login - exchange username and password for an access token
///
/// ```json
/// { "username": "string", "password": "string" }
/// ```
/// Responds with `{ "access_token": "eyJ..." }`.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(credentials) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let user = match authenticate(state.users.as_ref(), &credentials.username, &credentials.password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::info!("Login failed for '{}': {}", credentials.username, e);
            return Err(e.into());
        }
    };

    let token = state.tokens.issue(&user)?;
    tracing::info!("Issued token for '{}'", user.username);
    Ok(Json(json!({ "access_token": token })))
}

/// GET /refresh - trade the bearer token for a new one while its refresh window is open
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;
    let refreshed = state.tokens.refresh(token)?;
    Ok(Json(json!({ "access_token": refreshed })))
}

/// POST /adduser - create a user (admin role required)
pub async fn add_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    caller.require_role(ADMIN_ROLE)?;
    let Json(new_user) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let user = create_user(
        state.users.as_ref(),
        &new_user.username,
        &new_user.password,
        new_user.roles,
        state.config.auth.password_hash_cost,
    )
    .await?;

    tracing::info!("User '{}' created by '{}'", user.username, caller.username);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "username": user.username, "roles": user.roles })),
    ))
}
