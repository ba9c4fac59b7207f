//! Clinical attribute lookup endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use cdd_common::AttributeRecord;
use tracing::debug;

use super::PolicyQuery;
use crate::error::DictionaryResult;
use crate::AppState;

/// GET /api/
///
/// Every clinical attribute, resolved under the optional policy.
pub async fn get_all(
    State(state): State<AppState>,
    query: Result<Query<PolicyQuery>, QueryRejection>,
) -> DictionaryResult<Json<Vec<AttributeRecord>>> {
    let Query(query) = query?;
    Ok(Json(state.lookup.get_all(query.policy()).await?))
}

/// POST /api/
///
/// Body: JSON array of column headers. Unknown headers fail the whole
/// request with a 404 listing all of them.
pub async fn get_many(
    State(state): State<AppState>,
    query: Result<Query<PolicyQuery>, QueryRejection>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> DictionaryResult<Json<Vec<AttributeRecord>>> {
    let Query(query) = query?;
    let Json(column_headers) = body?;
    debug!(count = column_headers.len(), "Clinical attribute batch lookup");
    Ok(Json(
        state
            .lookup
            .resolve_many(query.policy(), &column_headers)
            .await?,
    ))
}

/// GET /api/:column_header
pub async fn get_one(
    State(state): State<AppState>,
    Path(column_header): Path<String>,
    query: Result<Query<PolicyQuery>, QueryRejection>,
) -> DictionaryResult<Json<AttributeRecord>> {
    let Query(query) = query?;
    Ok(Json(
        state.lookup.resolve(query.policy(), &column_header).await?,
    ))
}

pub fn attribute_routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(get_all).post(get_many))
        .route("/api/", get(get_all).post(get_many))
        .route("/api/:column_header", get(get_one))
        .route("/api/:column_header/", get(get_one))
}
