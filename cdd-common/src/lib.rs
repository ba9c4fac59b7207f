//! # CDD Common Library
//!
//! Shared code for the Clinical Data Dictionary service including:
//! - Clinical attribute records and override sets
//! - Configuration loading
//! - Persistent snapshot storage (SQLite)
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{AttributeRecord, OverrideSet, PolicyName, RawMetadata};
