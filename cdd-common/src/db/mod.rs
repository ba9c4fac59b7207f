//! Persistent snapshot storage
//!
//! Each store is a small SQLite database holding named slots of raw JSON
//! payloads. The service keeps a primary and a backup store so the last
//! known-good dictionary survives both a source outage and a damaged file.

pub mod init;
pub mod slots;

pub use init::init_store;
pub use slots::{read_slot, write_slot, SlotRecord};
