//! In-memory metadata source and dictionary fixture for unit tests

use crate::source::{MetadataSource, RawOverrides, SourceError};
use cdd_common::{AttributeRecord, RawMetadata};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn fixture_attributes() -> Vec<AttributeRecord> {
    vec![
        AttributeRecord::new(
            "AGE",
            "Diagnosis Age",
            "Age at which a condition or disease was first diagnosed.",
            "NUMBER",
            "PATIENT",
            "1",
        ),
        AttributeRecord::new(
            "BONE_MARROW_SAMPLE_HISTOLOGY",
            "Bone Marrow Sample Histology",
            "Bone Marrow Sample Histology",
            "STRING",
            "SAMPLE",
            "1",
        ),
        AttributeRecord::new(
            "CLIN_M_STAGE",
            "Neoplasm American Joint Committee on Cancer Clinical Distant Metastasis M Stage",
            "Extent of the distant metastasis for the cancer based on evidence obtained from clinical assessment parameters determined prior to treatment.",
            "STRING",
            "PATIENT",
            "1",
        ),
        AttributeRecord::new(
            "DISEASE_STAGE",
            "Disease Stage",
            "Disease Stage",
            "STRING",
            "SAMPLE",
            "1",
        ),
        AttributeRecord::new(
            "LAST_STATUS",
            "Last Status",
            "Last Status.",
            "STRING",
            "PATIENT",
            "1",
        ),
    ]
}

/// Override rows carry only the priority; everything else is backfilled
pub fn fixture_overrides() -> RawOverrides {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        "test_override_study".to_string(),
        vec![
            AttributeRecord::new("AGE", "", "", "", "", "100"),
            AttributeRecord::new("DISEASE_STAGE", "", "", "", "", "10"),
        ],
    );
    overrides.insert(
        "mskimpact".to_string(),
        vec![AttributeRecord::new("LAST_STATUS", "", "", "", "", "1")],
    );
    overrides
}

pub fn fixture_raw() -> RawMetadata {
    RawMetadata {
        attributes: fixture_attributes(),
        overrides: fixture_overrides(),
    }
}

/// Metadata source whose failures can be switched on and off
pub struct MockSource {
    raw: RawMetadata,
    failing: AtomicBool,
    overrides_failing: AtomicBool,
}

impl MockSource {
    pub fn working() -> Self {
        Self::with_raw(fixture_raw())
    }

    pub fn with_raw(raw: RawMetadata) -> Self {
        Self {
            raw,
            failing: AtomicBool::new(false),
            overrides_failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_overrides_failing(&self, failing: bool) {
        self.overrides_failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MetadataSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_attributes(&self) -> Result<Vec<AttributeRecord>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        Ok(self.raw.attributes.clone())
    }

    async fn fetch_overrides(&self) -> Result<RawOverrides, SourceError> {
        if self.failing.load(Ordering::SeqCst) || self.overrides_failing.load(Ordering::SeqCst) {
            return Err(SourceError::Api(500, "internal error".to_string()));
        }
        Ok(self.raw.overrides.clone())
    }
}
