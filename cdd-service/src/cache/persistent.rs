//! Persistent backup of the last known-good raw metadata
//!
//! Two stores (`primary.db`, `backup.db`) each hold the `attributes` and
//! `overrides` slots. Saves go to both; loads try the primary first and fall
//! back to the backup when the primary is missing, incomplete or unreadable.

use cdd_common::config::CacheConfig;
use cdd_common::db::{init_store, read_slot, write_slot, SlotRecord};
use cdd_common::{AttributeRecord, RawMetadata};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

const ATTRIBUTES_SLOT: &str = "attributes";
const OVERRIDES_SLOT: &str = "overrides";

pub struct PersistentStore {
    primary: SqlitePool,
    backup: SqlitePool,
}

impl PersistentStore {
    /// Open (or create) the primary and backup stores under `dir`
    pub async fn open(dir: &Path) -> cdd_common::Result<Self> {
        let primary = init_store(&dir.join("primary.db")).await?;
        let backup = init_store(&dir.join("backup.db")).await?;
        Ok(Self { primary, backup })
    }

    /// Open the store named by `[cache].persistent_dir`
    ///
    /// `None` when no directory is configured, or when the store cannot be
    /// opened (the service then runs without a fallback).
    pub async fn from_config(config: &CacheConfig) -> Option<Self> {
        let Some(dir) = &config.persistent_dir else {
            info!("Persistent cache disabled (no cache.persistent_dir)");
            return None;
        };

        match Self::open(dir).await {
            Ok(store) => {
                info!("Persistent cache: {}", dir.display());
                Some(store)
            }
            Err(e) => {
                warn!(
                    "Persistent cache unavailable at {}, continuing without it: {}",
                    dir.display(),
                    e
                );
                None
            }
        }
    }

    /// Write `raw` to both stores
    ///
    /// Both stores are attempted even if the first write fails; the first
    /// error is returned.
    pub async fn save(&self, raw: &RawMetadata) -> cdd_common::Result<()> {
        let primary = write_raw(&self.primary, raw).await;
        let backup = write_raw(&self.backup, raw).await;
        primary.and(backup)
    }

    /// Load the last saved raw metadata, primary first
    pub async fn load(&self) -> Option<RawMetadata> {
        for (label, pool) in [("primary", &self.primary), ("backup", &self.backup)] {
            match read_raw(pool).await {
                Ok(Some(SlotRecord { value, saved_at })) => {
                    info!(
                        saved_at = %saved_at,
                        "Loaded {} clinical attributes from {} persistent cache",
                        value.attributes.len(),
                        label
                    );
                    return Some(value);
                }
                Ok(None) => warn!("No clinical attribute data in {} persistent cache", label),
                Err(e) => warn!("Failed to read {} persistent cache: {}", label, e),
            }
        }
        None
    }
}

/// Both slots change together or not at all
async fn write_raw(pool: &SqlitePool, raw: &RawMetadata) -> cdd_common::Result<()> {
    let mut tx = pool.begin().await?;
    write_slot(&mut *tx, ATTRIBUTES_SLOT, &raw.attributes).await?;
    write_slot(&mut *tx, OVERRIDES_SLOT, &raw.overrides).await?;
    tx.commit().await?;
    Ok(())
}

/// Both slots are required; a store with only one is treated as empty
///
/// The returned `saved_at` is that of the attributes slot.
async fn read_raw(pool: &SqlitePool) -> cdd_common::Result<Option<SlotRecord<RawMetadata>>> {
    let attributes = read_slot::<Vec<AttributeRecord>>(pool, ATTRIBUTES_SLOT).await?;
    let overrides =
        read_slot::<BTreeMap<String, Vec<AttributeRecord>>>(pool, OVERRIDES_SLOT).await?;

    match (attributes, overrides) {
        (Some(attributes), Some(overrides)) if !attributes.value.is_empty() => {
            Ok(Some(SlotRecord {
                value: RawMetadata {
                    attributes: attributes.value,
                    overrides: overrides.value,
                },
                saved_at: attributes.saved_at,
            }))
        }
        _ => Ok(None),
    }
}
