//! Named slot reads and writes

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};

/// A decoded slot together with when it was written
#[derive(Debug, Clone)]
pub struct SlotRecord<T> {
    pub value: T,
    pub saved_at: DateTime<Utc>,
}

/// Serialize `value` as JSON into `slot`, replacing any previous payload
///
/// Accepts a pool or a transaction, so several slots can be written atomically.
pub async fn write_slot<'e, E, T>(executor: E, slot: &str, value: &T) -> Result<()>
where
    E: SqliteExecutor<'e>,
    T: Serialize,
{
    let payload = serde_json::to_string(value)?;

    sqlx::query(
        "INSERT OR REPLACE INTO snapshot_slots (slot, payload, saved_at) VALUES (?, ?, ?)",
    )
    .bind(slot)
    .bind(payload)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

/// Read and decode `slot`; `Ok(None)` when the slot was never written
pub async fn read_slot<T: DeserializeOwned>(
    pool: &SqlitePool,
    slot: &str,
) -> Result<Option<SlotRecord<T>>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT payload, saved_at FROM snapshot_slots WHERE slot = ?")
            .bind(slot)
            .fetch_optional(pool)
            .await?;

    let Some((payload, saved_at)) = row else {
        return Ok(None);
    };

    let value = serde_json::from_str(&payload)?;
    let saved_at = DateTime::parse_from_rfc3339(&saved_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid saved_at for slot {}: {}", slot, e)))?;

    Ok(Some(SlotRecord { value, saved_at }))
}
