//! HTTP API handlers for cdd-service

pub mod attributes;
pub mod health;
pub mod policies;
pub mod refresh;
pub mod search;

pub use attributes::attribute_routes;
pub use health::health_routes;
pub use policies::policy_routes;
pub use refresh::refresh_routes;
pub use search::search_routes;

use serde::Deserialize;

/// Optional override policy selector shared by the lookup endpoints
///
/// `cancerStudy` is accepted as the legacy name of `overridePolicy`.
#[derive(Debug, Default, Deserialize)]
pub struct PolicyQuery {
    #[serde(rename = "overridePolicy", alias = "cancerStudy")]
    pub policy: Option<String>,
}

impl PolicyQuery {
    pub fn policy(&self) -> Option<&str> {
        self.policy.as_deref()
    }
}
