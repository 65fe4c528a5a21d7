//! Completion tracking for study items.
//!
//! `ProgressStore` keeps one set of completed item ids per [`Category`] and
//! mirrors the whole record to a single durable slot on every mutation.
//! Restoring is forgiving: a missing slot or corrupt payload leaves every
//! category empty rather than failing startup.

pub mod category;
pub mod store;

pub use category::{Category, ItemId};
pub use store::{ProgressSnapshot, ProgressStats, ProgressStore, RestoreOutcome, PROGRESS_KEY};

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Failed to persist progress: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to serialize progress: {0}")]
    Serialization(#[from] serde_json::Error),
}
