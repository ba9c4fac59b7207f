//! Local JSON dictionary file source
//!
//! File layout (same shape as the persisted raw data):
//!
//! ```json
//! {
//!   "attributes": [{"column_header": "AGE", "display_name": "Diagnosis Age", ...}],
//!   "overrides": {"test_override_study": [{"column_header": "AGE", "priority": "100"}]}
//! }
//! ```
//!
//! The file is re-read on every fetch so edits are picked up by the next
//! refresh.

use super::{MetadataSource, RawOverrides, SourceError};
use cdd_common::{AttributeRecord, RawMetadata};
use std::path::PathBuf;
use tracing::debug;

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<RawMetadata, SourceError> {
        debug!(path = %self.path.display(), "Reading dictionary file");
        let content = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&content)
            .map_err(|e| SourceError::Parse(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait::async_trait]
impl MetadataSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_attributes(&self) -> Result<Vec<AttributeRecord>, SourceError> {
        Ok(self.read().await?.attributes)
    }

    async fn fetch_overrides(&self) -> Result<RawOverrides, SourceError> {
        Ok(self.read().await?.overrides)
    }
}
