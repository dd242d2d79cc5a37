use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use quickshop_core::{StoreClosure, StoreError};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClosuresResponse {
    pub closures: Vec<StoreClosure>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/closures", get(list_closures).post(save_closure))
        .route("/closures/{id}", delete(delete_closure))
}

/// Refuses shopper-facing requests while a store closure is active.
pub async fn ensure_store_open(state: &AppState) -> Result<(), AppError> {
    let closures = state.closures.list_closures().await?;
    match StoreClosure::active(&closures, Utc::now()) {
        Some(closure) => Err(AppError::StoreClosed(closure.clone())),
        None => Ok(()),
    }
}

async fn list_closures(
    State(state): State<AppState>,
    _admin: AdminClaims,
) -> Result<Json<ClosuresResponse>, AppError> {
    let closures = state.closures.list_closures().await?;
    Ok(Json(ClosuresResponse { closures }))
}

async fn save_closure(
    State(state): State<AppState>,
    _admin: AdminClaims,
    payload: Result<Json<StoreClosure>, JsonRejection>,
) -> Result<Json<StoreClosure>, AppError> {
    let Json(mut closure) = payload.map_err(|_| AppError::invalid_body())?;
    if closure.end_time <= closure.start_time {
        return Err(AppError::InvalidRequest("Closure must end after it starts".to_string()));
    }

    let id = state.closures.save_closure(&closure).await.map_err(|e| match e {
        StoreError::NotFound => AppError::InvalidRequest("Invalid closure ID".to_string()),
        other => other.into(),
    })?;
    closure.id = Some(id);
    tracing::info!(closure_id = id, start = %closure.start_time, end = %closure.end_time, "store closure saved");
    Ok(Json(closure))
}

async fn delete_closure(
    State(state): State<AppState>,
    _admin: AdminClaims,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::InvalidRequest("Invalid closure ID".to_string()))?;
    state.closures.delete_closure(id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::InvalidRequest("Invalid closure ID".to_string()),
        other => other.into(),
    })?;
    tracing::info!(closure_id = id, "store closure deleted");
    Ok(StatusCode::NO_CONTENT)
}
