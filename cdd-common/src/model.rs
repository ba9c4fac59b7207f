//! Clinical attribute records and override sets
//!
//! An [`AttributeRecord`] is an immutable value. Consumers that need a
//! variant of a cached record (e.g. a policy-wide priority reset) derive a new
//! record through the `with_*` / [`AttributeRecord::backfilled_from`]
//! constructors instead of mutating the cached one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Priority assigned by policy-wide priority reset rules
pub const RESET_PRIORITY: &str = "0";

/// Overrides keyed by policy id, then by normalized column header
pub type OverrideSet = BTreeMap<String, BTreeMap<String, AttributeRecord>>;

/// Normalize a column header for case-insensitive map lookups
pub fn normalize_header(column_header: &str) -> String {
    column_header.trim().to_uppercase()
}

/// Metadata for one clinical attribute (one data column)
///
/// Serialized field order matches the public API:
/// `column_header, display_name, description, datatype, attribute_type, priority`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRecord {
    column_header: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    datatype: String,
    #[serde(default)]
    attribute_type: String,
    #[serde(default)]
    priority: String,
    /// Study owning an override row (SPARQL override query only)
    #[serde(default, skip_serializing)]
    study_id: Option<String>,
}

impl AttributeRecord {
    pub fn new(
        column_header: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        datatype: impl Into<String>,
        attribute_type: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            column_header: column_header.into(),
            display_name: display_name.into(),
            description: description.into(),
            datatype: datatype.into(),
            attribute_type: attribute_type.into(),
            priority: priority.into(),
            study_id: None,
        }
    }

    pub fn column_header(&self) -> &str {
        &self.column_header
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    pub fn attribute_type(&self) -> &str {
        &self.attribute_type
    }

    pub fn priority(&self) -> &str {
        &self.priority
    }

    pub fn study_id(&self) -> Option<&str> {
        self.study_id.as_deref()
    }

    /// Map key for this record (upper-cased column header)
    pub fn normalized_header(&self) -> String {
        normalize_header(&self.column_header)
    }

    /// Derive a copy with a different priority
    pub fn with_priority(&self, priority: impl Into<String>) -> Self {
        Self {
            priority: priority.into(),
            ..self.clone()
        }
    }

    /// Derive a copy tagged with the study it overrides
    pub fn with_study_id(&self, study_id: impl Into<String>) -> Self {
        Self {
            study_id: Some(study_id.into()),
            ..self.clone()
        }
    }

    /// Derive a copy whose blank fields are filled from `default`
    ///
    /// The column header is kept as-is; every other blank field (empty or
    /// whitespace only) takes the value of the matching default field.
    pub fn backfilled_from(&self, default: &AttributeRecord) -> Self {
        fn pick(value: &str, fallback: &str) -> String {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        }

        Self {
            column_header: self.column_header.clone(),
            display_name: pick(&self.display_name, &default.display_name),
            description: pick(&self.description, &default.description),
            datatype: pick(&self.datatype, &default.datatype),
            attribute_type: pick(&self.attribute_type, &default.attribute_type),
            priority: pick(&self.priority, &default.priority),
            study_id: self.study_id.clone(),
        }
    }

    /// Whether `term` appears (case-insensitively) in the column header,
    /// display name or description
    pub fn mentions(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        [&self.column_header, &self.display_name, &self.description]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Text fuzzy search measures distances against
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {}",
            self.column_header, self.display_name, self.description
        )
    }
}

/// Lightweight named entity for an override policy (cancer study)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyName {
    pub name: String,
}

impl PolicyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Raw data as fetched from a metadata source
///
/// This is what gets persisted to the backing store; snapshots are always
/// rebuilt from it rather than stored resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub attributes: Vec<AttributeRecord>,
    #[serde(default)]
    pub overrides: BTreeMap<String, Vec<AttributeRecord>>,
}
