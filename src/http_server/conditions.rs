//! Handlers for condition flag endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, ApiState};
use crate::persistence::traits::{DeviceRepository, StateStore};

/// Body of a flag write.
#[derive(Debug, Deserialize)]
pub struct ConditionUpdate {
    /// The new flag value.
    pub active: bool,
}

/// Writes a condition flag and forwards the resulting change to the engine.
///
/// The write is acknowledged once it is stored. A change the engine cannot
/// take (the service is shutting down) is picked up by the next
/// reconciliation sweep.
pub async fn put_condition(
    State(state): State<ApiState>,
    Path((device_id, condition_id)): Path<(String, String)>,
    Json(payload): Json<ConditionUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let change = state.repo.write_flag(&device_id, &condition_id, payload.active).await?;
    tracing::debug!(
        device_id = %device_id,
        condition_id = %condition_id,
        previous = ?change.previous,
        active = payload.active,
        "Condition flag written."
    );

    let previous = change.previous;
    if state.events_tx.send(change).await.is_err() {
        tracing::warn!(
            device_id = %device_id,
            condition_id = %condition_id,
            "Alert engine is not accepting changes; flag stored for the next sweep."
        );
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "device_id": device_id,
            "condition_id": condition_id,
            "previous": previous,
            "active": payload.active,
        })),
    ))
}

/// Returns the stored flag and debounce timestamp of a pair.
pub async fn get_condition(
    State(state): State<ApiState>,
    Path((device_id, condition_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if state.repo.get_flag(&device_id, &condition_id).await?.is_none() {
        return Err(ApiError::NotFound("Condition not found".to_string()));
    }
    let condition = state.repo.get_condition_state(&device_id, &condition_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "device_id": device_id,
            "condition_id": condition_id,
            "active": condition.active,
            "last_notified_at": condition.last_notified_at,
        })),
    ))
}
