//! Override resolution
//!
//! Resolution order for one column header under a policy:
//! 1. Explicit override of the policy (already backfilled), returned as is
//! 2. Default record, transformed by the policy's blanket rule
//!    (priority reset for policies in `reset_priority_policies`)
//! 3. `AttributeNotFound`
//!
//! Every returned record is an owned copy; the published snapshot is never
//! modified.

use crate::cache::{CacheSnapshot, RefreshOutcome, RefreshableCache};
use crate::error::{DictionaryError, DictionaryResult};
use crate::search::DistanceCache;
use cdd_common::model::{normalize_header, RESET_PRIORITY};
use cdd_common::{AttributeRecord, PolicyName};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub struct LookupService {
    cache: Arc<RefreshableCache>,
    distances: Arc<DistanceCache>,
    reset_priority_policies: Vec<String>,
}

/// A policy validated against one snapshot
struct Policy<'a> {
    overrides: Option<&'a BTreeMap<String, AttributeRecord>>,
    reset_priority: bool,
}

impl LookupService {
    pub fn new(
        cache: Arc<RefreshableCache>,
        distances: Arc<DistanceCache>,
        reset_priority_policies: Vec<String>,
    ) -> Self {
        Self {
            cache,
            distances,
            reset_priority_policies,
        }
    }

    /// Resolve one column header under an optional policy
    pub async fn resolve(
        &self,
        policy: Option<&str>,
        column_header: &str,
    ) -> DictionaryResult<AttributeRecord> {
        let snapshot = self.cache.snapshot().await?;
        let policy = self.policy(&snapshot, policy)?;
        resolve_in(&snapshot, &policy, column_header)
            .ok_or_else(|| DictionaryError::AttributeNotFound(vec![column_header.to_string()]))
    }

    /// Resolve several column headers, reporting every unknown one at once
    pub async fn resolve_many(
        &self,
        policy: Option<&str>,
        column_headers: &[String],
    ) -> DictionaryResult<Vec<AttributeRecord>> {
        let snapshot = self.cache.snapshot().await?;
        let policy = self.policy(&snapshot, policy)?;

        let mut resolved = Vec::with_capacity(column_headers.len());
        let mut missing = Vec::new();
        for column_header in column_headers {
            match resolve_in(&snapshot, &policy, column_header) {
                Some(record) => resolved.push(record),
                None => missing.push(column_header.clone()),
            }
        }

        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(DictionaryError::AttributeNotFound(missing))
        }
    }

    /// Every attribute resolved under an optional policy, ordered by column header
    pub async fn get_all(&self, policy: Option<&str>) -> DictionaryResult<Vec<AttributeRecord>> {
        let snapshot = self.cache.snapshot().await?;
        let policy = self.policy(&snapshot, policy)?;

        Ok(snapshot
            .attributes()
            .keys()
            .filter_map(|header| resolve_in(&snapshot, &policy, header))
            .collect())
    }

    /// Known override policies, sorted by name
    pub async fn list_policies(&self) -> DictionaryResult<Vec<PolicyName>> {
        let snapshot = self.cache.snapshot().await?;
        Ok(snapshot.overrides().keys().map(PolicyName::new).collect())
    }

    /// Forced refresh, then drop search distances the new data invalidated
    pub async fn force_reset_cache(&self) -> DictionaryResult<RefreshOutcome> {
        info!("Forced clinical attribute cache reset requested");
        let outcome = self.cache.refresh(true).await?;
        if let Some(snapshot) = self.cache.get().await {
            self.distances.prune(&snapshot).await;
        }
        Ok(outcome)
    }

    fn policy<'a>(
        &self,
        snapshot: &'a CacheSnapshot,
        policy: Option<&str>,
    ) -> DictionaryResult<Policy<'a>> {
        let Some(name) = policy.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(Policy {
                overrides: None,
                reset_priority: false,
            });
        };

        let overrides = snapshot
            .policy(name)
            .ok_or_else(|| DictionaryError::PolicyNotFound(name.to_string()))?;
        Ok(Policy {
            overrides: Some(overrides),
            reset_priority: self.reset_priority_policies.iter().any(|p| p == name),
        })
    }
}

fn resolve_in(
    snapshot: &CacheSnapshot,
    policy: &Policy<'_>,
    column_header: &str,
) -> Option<AttributeRecord> {
    let key = normalize_header(column_header);
    if let Some(record) = policy.overrides.and_then(|o| o.get(&key)) {
        return Some(record.clone());
    }

    let default = snapshot.attributes().get(&key)?;
    if policy.reset_priority {
        Some(default.with_priority(RESET_PRIORITY))
    } else {
        Some(default.clone())
    }
}
