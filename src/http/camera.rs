//! Camera CRUD surface, grounded in `original_source/router/camera.py` /
//! `schema/camera.py`: camera mutations that touch the linked-device set
//! trigger `Pool.update` for every device still (or newly) linked, via
//! `AdminHooks::camera_links_changed`.

use axum::extract::{Path, State};
use axum::{Json, Router};
use serde::Deserialize;

use crate::model::CameraRecord;
use crate::state::AppState;

use super::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/cameras", axum::routing::get(list).post(create))
        .route("/v1/cameras/:id", axum::routing::get(get_one).put(update).delete(delete))
}

#[derive(Debug, Deserialize)]
struct CreateCamera {
    name: String,
    gate_id: i64,
    #[serde(default)]
    device_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct UpdateCamera {
    name: Option<String>,
    device_ids: Option<Vec<i64>>,
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateCamera>,
) -> Result<Json<CameraRecord>, ApiError> {
    let camera = state.repo.create_camera(&body.name, body.gate_id, &body.device_ids).await?;
    if let Err(e) = state.hooks.camera_links_changed(&camera.device_ids).await {
        tracing::warn!(camera_id = camera.id, error = %e, "admin hook failed after camera create");
    }
    Ok(Json(camera))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<CameraRecord>>, ApiError> {
    // The repository trait exposes camera listing only by device; the
    // CRUD surface's general listing is intentionally out of scope here
    // (spec.md treats buildings/gates as the minimal stub they are).
    let devices = state.repo.devices_active().await?;
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for device in devices {
        for camera in state.repo.cameras_for_device(device.id).await? {
            if seen.insert(camera.id) {
                out.push(camera);
            }
        }
    }
    Ok(Json(out))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<CameraRecord>, ApiError> {
    Ok(Json(state.repo.camera(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCamera>,
) -> Result<Json<CameraRecord>, ApiError> {
    let camera = state
        .repo
        .update_camera(id, body.name.as_deref(), body.device_ids.as_deref())
        .await?;
    if let Err(e) = state.hooks.camera_links_changed(&camera.device_ids).await {
        tracing::warn!(camera_id = camera.id, error = %e, "admin hook failed after camera update");
    }
    Ok(Json(camera))
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<(), ApiError> {
    let camera = state.repo.camera(id).await?;
    state.repo.delete_camera(id).await?;
    if let Err(e) = state.hooks.camera_links_changed(&camera.device_ids).await {
        tracing::warn!(camera_id = id, error = %e, "admin hook failed after camera delete");
    }
    Ok(())
}
