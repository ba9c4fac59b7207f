//! cdd-service library interface
//!
//! Clinical Data Dictionary: cached clinical attribute metadata with
//! per-study override resolution and fuzzy search, served over HTTP.

pub mod api;
pub mod cache;
pub mod error;
pub mod notify;
pub mod resolver;
pub mod scheduler;
pub mod search;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::error::{DictionaryError, DictionaryResult};

use axum::Router;
use cache::RefreshableCache;
use chrono::{DateTime, Utc};
use resolver::LookupService;
use search::{DistanceCache, SearchService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RefreshableCache>,
    /// Search distance memoization, shared with the refresh scheduler
    pub distances: Arc<DistanceCache>,
    pub lookup: Arc<LookupService>,
    pub search: Arc<SearchService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(cache: Arc<RefreshableCache>, reset_priority_policies: Vec<String>) -> Self {
        let distances = Arc::new(DistanceCache::new());
        Self {
            lookup: Arc::new(LookupService::new(
                cache.clone(),
                distances.clone(),
                reset_priority_policies,
            )),
            search: Arc::new(SearchService::new(cache.clone(), distances.clone())),
            cache,
            distances,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::search_routes())
        .merge(api::policy_routes())
        .merge(api::refresh_routes())
        .merge(api::attribute_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Any origin may read the dictionary
        .layer(CorsLayer::permissive())
}
