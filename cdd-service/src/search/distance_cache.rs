//! Memoized edit distances
//!
//! Distances are cached per (column header, lower-cased term), and only for
//! terms the attribute's searchable text contains; other distances are
//! computed on every call. An entry stays meaningful only while the text
//! still contains the term, so whenever a new snapshot is observed the cache
//! is pruned:
//! attributes that disappeared are dropped, terms no longer present in the
//! refreshed text are dropped, and surviving distances are recomputed.

use crate::cache::CacheSnapshot;
use cdd_common::model::normalize_header;
use cdd_common::AttributeRecord;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Case-insensitive Levenshtein distance (unit costs, char based)
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

#[derive(Default)]
struct CacheState {
    /// Snapshot generation the entries were last checked against
    generation: Option<u64>,
    entries: HashMap<String, HashMap<String, usize>>,
}

impl CacheState {
    fn prune(&mut self, snapshot: &CacheSnapshot) {
        let before: usize = self.entries.values().map(HashMap::len).sum();

        self.entries.retain(|header, terms| {
            let Some(record) = snapshot.attribute(header) else {
                return false;
            };
            let text = record.searchable_text().to_lowercase();
            terms.retain(|term, distance| {
                if text.contains(term.as_str()) {
                    *distance = edit_distance(term, &text);
                    true
                } else {
                    false
                }
            });
            !terms.is_empty()
        });

        let after: usize = self.entries.values().map(HashMap::len).sum();
        debug!(
            generation = snapshot.generation(),
            removed = before - after,
            kept = after,
            "Pruned search distance cache"
        );
        self.generation = Some(snapshot.generation());
    }
}

#[derive(Default)]
pub struct DistanceCache {
    state: Mutex<CacheState>,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance between `term` and the searchable text of `record`
    ///
    /// `record` must belong to `snapshot`.
    pub async fn distance(
        &self,
        snapshot: &CacheSnapshot,
        record: &AttributeRecord,
        term: &str,
    ) -> usize {
        let mut state = self.state.lock().await;
        if state.generation != Some(snapshot.generation()) {
            state.prune(snapshot);
        }

        let term = term.to_lowercase();
        let header = record.normalized_header();
        if let Some(distance) = state.entries.get(&header).and_then(|t| t.get(&term)) {
            return *distance;
        }

        let text = record.searchable_text();
        let distance = edit_distance(&term, &text);
        if text.to_lowercase().contains(term.as_str()) {
            state.entries.entry(header).or_default().insert(term, distance);
        }
        distance
    }

    /// Prune against `snapshot` even if it was already seen
    pub async fn prune(&self, snapshot: &CacheSnapshot) {
        self.state.lock().await.prune(snapshot);
    }

    /// Cached distance, without computing it
    pub async fn cached(&self, column_header: &str, term: &str) -> Option<usize> {
        let state = self.state.lock().await;
        state
            .entries
            .get(&normalize_header(column_header))
            .and_then(|terms| terms.get(&term.to_lowercase()))
            .copied()
    }

    /// Number of cached (attribute, term) pairs
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
