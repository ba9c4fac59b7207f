//! Fuzzy search endpoint

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::post,
    Json, Router,
};
use cdd_common::AttributeRecord;
use serde::Deserialize;

use crate::error::DictionaryResult;
use crate::search::SearchQuery;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(rename = "attributeType")]
    pub attribute_type: Option<String>,
    #[serde(rename = "inclusiveSearch", default)]
    pub inclusive_search: bool,
}

/// POST /api/search
///
/// Body: JSON array of search terms. Results are ordered closest first.
pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> DictionaryResult<Json<Vec<AttributeRecord>>> {
    let Query(params) = params?;
    let Json(terms) = body?;
    let query = SearchQuery {
        terms,
        attribute_type: params.attribute_type,
        inclusive: params.inclusive_search,
    };
    Ok(Json(state.search.search(&query).await?))
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search", post(search))
}
