//! Device (LPR) CRUD surface, grounded in `original_source/router/lpr.py`
//! and `schema/lpr.py`: `POST/GET/PUT/DELETE/PATCH /v1/lprs`, each
//! mutation calling the matching Admin Hook after the repository commit
//! (the Rust analogue of `crud/lpr.py` calling `tcp_manager.add_connection`
//! et al.).

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::model::DeviceRecord;
use crate::state::AppState;

use super::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/lprs", get(list).post(create))
        .route("/v1/lprs/:id", get(get_one).put(update).delete(delete))
        .route("/v1/lprs/:id/activation", patch(toggle_active))
}

#[derive(Debug, Deserialize)]
struct CreateLpr {
    name: String,
    ip: String,
    port: u16,
    #[serde(default)]
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateLpr {
    name: Option<String>,
    ip: Option<String>,
    port: Option<u16>,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToggleActive {
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
struct LprList {
    items: Vec<DeviceRecord>,
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateLpr>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let token = body
        .auth_token
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let device = state.repo.create_device(&body.name, &body.ip, body.port, &token).await?;
    if let Err(e) = state.hooks.device_created(device.id, device.is_active).await {
        tracing::warn!(device_id = device.id, error = %e, "admin hook failed after create");
    }
    Ok(Json(device))
}

async fn list(
    State(state): State<AppState>,
    Query(_pagination): Query<Pagination>,
) -> Result<Json<LprList>, ApiError> {
    let items = state.repo.devices_active().await?;
    Ok(Json(LprList { items }))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<DeviceRecord>, ApiError> {
    Ok(Json(state.repo.device(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLpr>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let device = state
        .repo
        .update_device(id, body.name.as_deref(), body.ip.as_deref(), body.port, body.auth_token.as_deref())
        .await?;
    if let Err(e) = state.hooks.device_updated(device.id, device.is_active).await {
        tracing::warn!(device_id = device.id, error = %e, "admin hook failed after update");
    }
    Ok(Json(device))
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<(), ApiError> {
    state.repo.delete_device(id).await?;
    if let Err(e) = state.hooks.device_deleted(id).await {
        tracing::warn!(device_id = id, error = %e, "admin hook failed after delete");
    }
    Ok(())
}

async fn toggle_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ToggleActive>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let device = state.repo.set_device_active(id, body.is_active).await?;
    if let Err(e) = state.hooks.device_updated(device.id, device.is_active).await {
        tracing::warn!(device_id = device.id, error = %e, "admin hook failed after activation toggle");
    }
    Ok(Json(device))
}
