//! Override policy listing

use axum::{extract::State, routing::get, Json, Router};
use cdd_common::PolicyName;

use crate::error::DictionaryResult;
use crate::AppState;

/// GET /api/overridePolicies (also /api/cancerStudies)
pub async fn list_policies(
    State(state): State<AppState>,
) -> DictionaryResult<Json<Vec<PolicyName>>> {
    Ok(Json(state.lookup.list_policies().await?))
}

pub fn policy_routes() -> Router<AppState> {
    Router::new()
        .route("/api/overridePolicies", get(list_policies))
        .route("/api/cancerStudies", get(list_policies))
}
