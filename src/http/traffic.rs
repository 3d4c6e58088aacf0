//! Paginated traffic listing, grounded in
//! `original_source/backend/crud/traffic.py::get_all_traffics`.

use axum::extract::{Query, State};
use axum::{Json, Router};
use serde::Deserialize;

use crate::model::TrafficEvent;
use crate::state::AppState;

use super::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/traffic", axum::routing::get(list))
}

#[derive(Debug, Deserialize)]
struct TrafficQuery {
    camera_id: Option<i64>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<TrafficQuery>,
) -> Result<Json<Vec<TrafficEvent>>, ApiError> {
    let items = state
        .repo
        .list_traffic(query.camera_id, query.limit.clamp(1, 500), query.offset.max(0))
        .await?;
    Ok(Json(items))
}
