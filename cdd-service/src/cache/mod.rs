//! Refreshable clinical attribute cache
//!
//! Owns the single published [`CacheSnapshot`]. A refresh builds a complete
//! new snapshot off to the side and swaps it in atomically; readers only
//! ever clone the published `Arc` and never observe a half-built state.
//!
//! Failure handling on refresh:
//! 1. Fetch fails → consecutive-failure counter is incremented
//! 2. A snapshot is published, the counter is below the threshold and the
//!    refresh was not forced → the previous snapshot keeps being served
//! 3. Otherwise, persistent store configured and readable → snapshot rebuilt
//!    from the last known-good raw data (primary, then backup)
//! 4. Otherwise the published snapshot is invalidated; the refresh fails
//!    once the counter reached the threshold or the refresh was forced
//!
//! The counter is reset only by a fully successful fetch of both attributes
//! and overrides.

pub mod persistent;

pub use persistent::PersistentStore;

use crate::error::{DictionaryError, DictionaryResult};
use crate::source::{MetadataSource, SourceError};
use cdd_common::model::{normalize_header, OverrideSet};
use cdd_common::{AttributeRecord, RawMetadata};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// One immutable, atomically published view of the dictionary
#[derive(Debug)]
pub struct CacheSnapshot {
    attributes: BTreeMap<String, AttributeRecord>,
    overrides: OverrideSet,
    built_at: DateTime<Utc>,
    generation: u64,
}

impl CacheSnapshot {
    /// Build a snapshot from raw fetched data
    ///
    /// Override fields left blank are backfilled here from the default
    /// record with the same column header, never at read time.
    pub fn build(raw: RawMetadata, generation: u64) -> Self {
        let mut attributes = BTreeMap::new();
        for record in raw.attributes {
            let key = record.normalized_header();
            if attributes.insert(key.clone(), record).is_some() {
                warn!(column_header = %key, "Duplicate clinical attribute, keeping the last one");
            }
        }

        let mut overrides: OverrideSet = BTreeMap::new();
        for (policy, rows) in raw.overrides {
            let entries = overrides.entry(policy.clone()).or_default();
            for row in rows {
                let key = row.normalized_header();
                let resolved = match attributes.get(&key) {
                    Some(default) => row.backfilled_from(default),
                    None => {
                        warn!(
                            policy = %policy,
                            column_header = %key,
                            "Override references an unknown clinical attribute"
                        );
                        row
                    }
                };
                entries.insert(key, resolved);
            }
        }

        Self {
            attributes,
            overrides,
            built_at: Utc::now(),
            generation,
        }
    }

    /// Default attributes keyed by normalized column header
    pub fn attributes(&self) -> &BTreeMap<String, AttributeRecord> {
        &self.attributes
    }

    /// Case-insensitive default attribute lookup
    pub fn attribute(&self, column_header: &str) -> Option<&AttributeRecord> {
        self.attributes.get(&normalize_header(column_header))
    }

    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    /// Overrides of one policy, if the policy exists
    pub fn policy(&self, policy: &str) -> Option<&BTreeMap<String, AttributeRecord>> {
        self.overrides.get(policy)
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Monotonic build counter, distinct for every published snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What a refresh that did not fail ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Fresh data fetched and published
    Refreshed,
    /// Fetch failed; last known-good data restored from the persistent store
    RestoredFromBackup,
    /// Fetch failed; previous snapshot left in place
    KeptStale,
}

/// Cache tuning
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Maximum age of the last successful refresh before the cache is stale
    pub max_age: Duration,
    /// Consecutive failures tolerated before the snapshot is invalidated
    pub failure_threshold: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3 * 24 * 60 * 60),
            failure_threshold: 3,
        }
    }
}

/// Point-in-time cache diagnostics (reported by `/health`)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub valid: bool,
    pub stale: bool,
    pub attribute_count: usize,
    pub policy_count: usize,
    pub built_at: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

pub struct RefreshableCache {
    source: Arc<dyn MetadataSource>,
    persistent: Option<PersistentStore>,
    settings: CacheSettings,
    published: RwLock<Option<Arc<CacheSnapshot>>>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
    consecutive_failures: AtomicU32,
    next_generation: AtomicU64,
    /// Serializes fetch-build-publish
    refresh_lock: Mutex<()>,
}

impl RefreshableCache {
    /// Create an empty (invalid) cache; call [`refresh`](Self::refresh) to populate it
    pub fn new(source: Arc<dyn MetadataSource>, settings: CacheSettings) -> Self {
        Self {
            source,
            persistent: None,
            settings,
            published: RwLock::new(None),
            last_refresh: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            next_generation: AtomicU64::new(1),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Attach the persistent backup store used as refresh fallback
    pub fn with_persistent_store(mut self, store: PersistentStore) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Currently published snapshot, `None` when invalid
    pub async fn get(&self) -> Option<Arc<CacheSnapshot>> {
        self.published.read().await.clone()
    }

    /// Currently published snapshot, or `MetadataSourceUnresponsive`
    pub async fn snapshot(&self) -> DictionaryResult<Arc<CacheSnapshot>> {
        self.get()
            .await
            .ok_or(DictionaryError::MetadataSourceUnresponsive)
    }

    /// Whether the last successful refresh is older than the maximum age
    ///
    /// A cache that never refreshed successfully is stale.
    pub async fn is_stale(&self) -> bool {
        match *self.last_refresh.read().await {
            None => true,
            Some(last) => match (Utc::now() - last).to_std() {
                Ok(age) => age > self.settings.max_age,
                // Clock went backwards
                Err(_) => false,
            },
        }
    }

    /// Whether the scheduler should attempt a refresh
    pub async fn needs_refresh(&self) -> bool {
        self.is_stale().await || self.get().await.is_none()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read().await
    }

    pub async fn status(&self) -> CacheStatus {
        let snapshot = self.get().await;
        CacheStatus {
            valid: snapshot.is_some(),
            stale: self.is_stale().await,
            attribute_count: snapshot.as_ref().map_or(0, |s| s.attributes().len()),
            policy_count: snapshot.as_ref().map_or(0, |s| s.overrides().len()),
            built_at: snapshot.as_ref().map(|s| s.built_at()),
            last_refresh: self.last_refresh().await,
            consecutive_failures: self.consecutive_failures(),
        }
    }

    /// Fetch fresh data and publish a new snapshot
    ///
    /// `force` invalidates the cache on the first failure instead of waiting
    /// for the failure threshold.
    pub async fn refresh(&self, force: bool) -> DictionaryResult<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;
        info!(
            force,
            source = self.source.name(),
            "Refilling clinical attribute cache"
        );

        match self.fetch().await {
            Ok(raw) => {
                if let Some(store) = &self.persistent {
                    if let Err(e) = store.save(&raw).await {
                        warn!("Failed to update persistent cache: {}", e);
                    }
                }

                let snapshot = self.build(raw);
                info!(
                    attributes = snapshot.attributes().len(),
                    policies = snapshot.overrides().len(),
                    "Refilled clinical attribute cache"
                );
                self.publish(Some(snapshot)).await;
                self.consecutive_failures.store(0, Ordering::SeqCst);
                *self.last_refresh.write().await = Some(Utc::now());
                Ok(RefreshOutcome::Refreshed)
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    consecutive_failures = failures,
                    "Failed to fetch clinical attributes from {}: {}",
                    self.source.name(),
                    e
                );

                let giving_up = force || failures >= self.settings.failure_threshold;
                if !giving_up && self.get().await.is_some() {
                    warn!(
                        consecutive_failures = failures,
                        threshold = self.settings.failure_threshold,
                        "Keeping previous clinical attribute cache"
                    );
                    return Ok(RefreshOutcome::KeptStale);
                }

                if let Some(store) = &self.persistent {
                    if let Some(raw) = store.load().await {
                        let snapshot = self.build(raw);
                        warn!(
                            attributes = snapshot.attributes().len(),
                            "Serving clinical attributes restored from persistent cache"
                        );
                        self.publish(Some(snapshot)).await;
                        return Ok(RefreshOutcome::RestoredFromBackup);
                    }
                }

                if giving_up {
                    error!(
                        consecutive_failures = failures,
                        force, "Invalidating clinical attribute cache"
                    );
                    self.publish(None).await;
                    Err(DictionaryError::FailedCacheRefresh)
                } else {
                    warn!(
                        consecutive_failures = failures,
                        threshold = self.settings.failure_threshold,
                        "Clinical attribute cache still empty"
                    );
                    Ok(RefreshOutcome::KeptStale)
                }
            }
        }
    }

    async fn fetch(&self) -> Result<RawMetadata, SourceError> {
        let attributes = self.source.fetch_attributes().await?;
        if attributes.is_empty() {
            return Err(SourceError::Empty);
        }
        let overrides = self.source.fetch_overrides().await?;
        Ok(RawMetadata {
            attributes,
            overrides,
        })
    }

    fn build(&self, raw: RawMetadata) -> Arc<CacheSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        Arc::new(CacheSnapshot::build(raw, generation))
    }

    async fn publish(&self, snapshot: Option<Arc<CacheSnapshot>>) {
        *self.published.write().await = snapshot;
    }

    #[cfg(test)]
    pub(crate) async fn set_last_refresh(&self, at: Option<DateTime<Utc>>) {
        *self.last_refresh.write().await = at;
    }
}
