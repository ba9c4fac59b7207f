//! Shared helpers for cdd-service integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cdd_common::AttributeRecord;
use cdd_service::cache::{CacheSettings, RefreshableCache};
use cdd_service::source::{FileSource, MetadataSource, RawOverrides, SourceError};
use cdd_service::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("dictionary.json")
}

/// Fixture file source that can be made to fail
pub struct SwitchableSource {
    inner: FileSource,
    failing: AtomicBool,
}

impl SwitchableSource {
    pub fn new() -> Self {
        Self {
            inner: FileSource::new(fixture_path()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MetadataSource for SwitchableSource {
    fn name(&self) -> &'static str {
        "switchable"
    }

    async fn fetch_attributes(&self) -> Result<Vec<AttributeRecord>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        self.inner.fetch_attributes().await
    }

    async fn fetch_overrides(&self) -> Result<RawOverrides, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        self.inner.fetch_overrides().await
    }
}

/// Populated app state over the fixture
pub async fn test_app_state() -> (AppState, Arc<SwitchableSource>) {
    let source = Arc::new(SwitchableSource::new());
    let cache = Arc::new(RefreshableCache::new(
        source.clone(),
        CacheSettings::default(),
    ));
    cache.refresh(false).await.unwrap();
    (
        AppState::new(cache, vec!["mskimpact".to_string()]),
        source,
    )
}

pub async fn test_app() -> Router {
    build_router(test_app_state().await.0)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// GET `uri`, returning status and raw body
pub async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

/// POST `body` as JSON to `uri`, returning status and raw body
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, String) {
    post_raw(app, uri, &body.to_string()).await
}

/// POST `body` verbatim with a JSON content type
pub async fn post_raw(app: Router, uri: &str, body: &str) -> (StatusCode, String) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

/// Priority of `column_header` in a JSON array of attributes
pub fn priority(attributes: &Value, column_header: &str) -> Option<String> {
    attributes
        .as_array()?
        .iter()
        .find(|a| a["column_header"] == column_header)
        .and_then(|a| a["priority"].as_str())
        .map(str::to_string)
}

pub fn column_headers(attributes: &Value) -> Vec<String> {
    attributes
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|a| a["column_header"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
