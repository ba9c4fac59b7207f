//! Metadata sources
//!
//! A [`MetadataSource`] fetches the raw attribute list and per-study
//! overrides from wherever the dictionary lives. Exactly one implementation
//! is active per deployment, selected by `[source].kind`:
//!
//! - [`SparqlSource`]: TopBraid knowledge system (SPARQL over HTTP)
//! - [`FileSource`]: local JSON dictionary file
//!
//! Any error is treated by the cache as transient unavailability.

pub mod file;
pub mod session;
pub mod sparql;

pub use file::FileSource;
pub use session::SessionManager;
pub use sparql::SparqlSource;

use cdd_common::config::{SourceConfig, SourceKind};
use cdd_common::AttributeRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Metadata source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The source answered but returned no attributes
    #[error("Source returned no clinical attributes")]
    Empty,
}

/// Overrides as fetched: policy id → override rows
pub type RawOverrides = BTreeMap<String, Vec<AttributeRecord>>;

/// A remote (or local) provider of clinical attribute metadata
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch every default clinical attribute
    async fn fetch_attributes(&self) -> Result<Vec<AttributeRecord>, SourceError>;

    /// Fetch override rows grouped by policy / study id
    async fn fetch_overrides(&self) -> Result<RawOverrides, SourceError>;
}

/// Build the source selected by configuration
pub fn from_config(config: &SourceConfig) -> Result<Arc<dyn MetadataSource>, SourceError> {
    match config.kind {
        SourceKind::Sparql => Ok(Arc::new(SparqlSource::new(config)?)),
        SourceKind::File => {
            let path = config.path.clone().ok_or_else(|| {
                SourceError::Config("source.path is required for the file source".to_string())
            })?;
            Ok(Arc::new(FileSource::new(path)))
        }
    }
}
