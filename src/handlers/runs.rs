// handlers/runs.rs - run lookup by object id, run number or timestamp
//
// All three routes share one code path; only the identifier kind differs.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::api::format::to_wire;
use crate::error::ApiError;
use crate::runs::IdentifierKind;
use crate::state::AppState;

/// GET /run/objectid/:object_id/:field/
pub async fn by_object_id(
    State(state): State<AppState>,
    Path((object_id, field)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    lookup_field(&state, IdentifierKind::ObjectId, &object_id, &field).await
}

/// GET /run/runnumber/:number/:field/
pub async fn by_run_number(
    State(state): State<AppState>,
    Path((number, field)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    lookup_field(&state, IdentifierKind::RunNumber, &number, &field).await
}

/// GET /run/timestamp/:timestamp/:field/
pub async fn by_timestamp(
    State(state): State<AppState>,
    Path((timestamp, field)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    lookup_field(&state, IdentifierKind::Timestamp, &timestamp, &field).await
}

async fn lookup_field(
    state: &AppState,
    kind: IdentifierKind,
    value: &str,
    field: &str,
) -> Result<Json<Value>, ApiError> {
    let found = state.lookup.lookup(kind, value, field).await?;
    Ok(Json(to_wire(found)))
}
