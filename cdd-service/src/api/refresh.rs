//! Administrative cache refresh

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::error::DictionaryResult;
use crate::AppState;

/// GET /api/refreshCache
///
/// Forces a refresh. A failure invalidates the cache and answers 503.
pub async fn refresh_cache(State(state): State<AppState>) -> DictionaryResult<Json<Value>> {
    let outcome = state.lookup.force_reset_cache().await?;
    info!(?outcome, "Forced cache refresh complete");
    Ok(Json(json!({ "response": "Success!" })))
}

pub fn refresh_routes() -> Router<AppState> {
    Router::new().route("/api/refreshCache", get(refresh_cache))
}
