//! Shared application state handed to every Axum handler, grounded in
//! the teacher's pattern of a single cloneable context type threaded
//! through `Router::with_state` (teacher itself wires its camera/web
//! state directly into closures; this crate's CRUD surface is new, so
//! it follows the more common `AppState` shape used across the pack).

use std::sync::Arc;

use crate::admin_hooks::AdminHooks;
use crate::bridge::Bridge;
use crate::config::AppConfig;
use crate::pool::Pool;
use crate::repo::Repository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub pool: Arc<Pool>,
    pub hooks: Arc<AdminHooks>,
    pub bridge: Arc<Bridge>,
    pub config: Arc<AppConfig>,
}
