//! Fuzzy attribute search
//!
//! Candidates are filtered by attribute type and by substring presence of
//! the search terms, then ranked by edit distance to their searchable text
//! (`column_header display_name description`).

pub mod distance_cache;

pub use distance_cache::{edit_distance, DistanceCache};

use crate::cache::RefreshableCache;
use crate::error::{DictionaryError, DictionaryResult};
use cdd_common::AttributeRecord;
use std::sync::Arc;
use tracing::debug;

/// One search request
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    /// Only attributes of this type (case-insensitive); `None` or blank for all
    pub attribute_type: Option<String>,
    /// Every term must be present, rather than any term
    pub inclusive: bool,
}

pub struct SearchService {
    cache: Arc<RefreshableCache>,
    distances: Arc<DistanceCache>,
}

impl SearchService {
    pub fn new(cache: Arc<RefreshableCache>, distances: Arc<DistanceCache>) -> Self {
        Self { cache, distances }
    }

    /// Matching attributes, closest first
    pub async fn search(&self, query: &SearchQuery) -> DictionaryResult<Vec<AttributeRecord>> {
        let terms: Vec<String> = query
            .terms
            .iter()
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty())
            .collect();
        if terms.is_empty() {
            return Err(DictionaryError::BadRequest(
                "at least one search term is required".to_string(),
            ));
        }
        let attribute_type = query
            .attribute_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let snapshot = self.cache.snapshot().await?;
        let joined = terms.join(" ");

        let mut scored: Vec<(usize, &AttributeRecord)> = Vec::new();
        for record in snapshot.attributes().values() {
            if let Some(wanted) = attribute_type {
                if !record.attribute_type().eq_ignore_ascii_case(wanted) {
                    continue;
                }
            }

            let present: Vec<&String> = terms.iter().filter(|t| record.mentions(t)).collect();
            let all_present = present.len() == terms.len();
            let qualifies = if query.inclusive {
                all_present
            } else {
                !present.is_empty()
            };
            if !qualifies {
                continue;
            }

            let mut score = usize::MAX;
            for term in &terms {
                score = score.min(self.distances.distance(&snapshot, record, term).await);
            }
            if all_present && terms.len() > 1 {
                score = score.min(self.distances.distance(&snapshot, record, &joined).await);
            }
            scored.push((score, record));
        }

        if scored.is_empty() {
            return Err(DictionaryError::AttributeNotFound(terms));
        }

        // Stable: ties keep map order
        scored.sort_by_key(|(score, _)| *score);
        debug!(
            terms = ?terms,
            results = scored.len(),
            "Clinical attribute search"
        );
        Ok(scored.into_iter().map(|(_, record)| record.clone()).collect())
    }
}
