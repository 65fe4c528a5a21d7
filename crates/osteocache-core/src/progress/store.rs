use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use super::{Category, ItemId, ProgressError};
use crate::storage::KeyValueStore;

/// Storage key of the durable progress slot.
pub const PROGRESS_KEY: &str = "osteopathAppProgress";

/// Persisted form of the completion record.
///
/// Absent or `null` categories deserialize as empty so a payload written by
/// an older build, or holding only some categories, still restores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub anatomy: Vec<ItemId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub techniques: Vec<ItemId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cases: Vec<ItemId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub quizzes: Vec<ItemId>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ItemId>, D::Error> {
    Ok(Option::<Vec<ItemId>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProgressSnapshot {
    pub fn ids(&self, category: Category) -> &[ItemId] {
        match category {
            Category::Anatomy => &self.anatomy,
            Category::Techniques => &self.techniques,
            Category::Cases => &self.cases,
            Category::Quizzes => &self.quizzes,
        }
    }
}

/// Completed-item counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    pub anatomy: usize,
    pub techniques: usize,
    pub cases: usize,
    pub quizzes: usize,
}

impl ProgressStats {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Anatomy => self.anatomy,
            Category::Techniques => self.techniques,
            Category::Cases => self.cases,
            Category::Quizzes => self.quizzes,
        }
    }

    pub fn total(&self) -> usize {
        self.anatomy + self.techniques + self.cases + self.quizzes
    }
}

/// What `restore` found in the durable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No slot yet; first run.
    Missing,
    Restored,
    /// Slot unreadable or malformed; state left empty.
    Corrupt,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompletionRecord {
    anatomy: BTreeSet<ItemId>,
    techniques: BTreeSet<ItemId>,
    cases: BTreeSet<ItemId>,
    quizzes: BTreeSet<ItemId>,
}

impl CompletionRecord {
    fn set(&self, category: Category) -> &BTreeSet<ItemId> {
        match category {
            Category::Anatomy => &self.anatomy,
            Category::Techniques => &self.techniques,
            Category::Cases => &self.cases,
            Category::Quizzes => &self.quizzes,
        }
    }

    fn set_mut(&mut self, category: Category) -> &mut BTreeSet<ItemId> {
        match category {
            Category::Anatomy => &mut self.anatomy,
            Category::Techniques => &mut self.techniques,
            Category::Cases => &mut self.cases,
            Category::Quizzes => &mut self.quizzes,
        }
    }

    fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        let mut record = Self::default();
        for category in Category::ALL {
            record
                .set_mut(category)
                .extend(snapshot.ids(category).iter().copied());
        }
        record
    }

    fn to_snapshot(&self) -> ProgressSnapshot {
        let ids = |category: Category| -> Vec<ItemId> { self.set(category).iter().copied().collect() };
        ProgressSnapshot {
            anatomy: ids(Category::Anatomy),
            techniques: ids(Category::Techniques),
            cases: ids(Category::Cases),
            quizzes: ids(Category::Quizzes),
        }
    }
}

/// Per-category completion sets, written through to a [`KeyValueStore`].
///
/// The store is the sole writer of [`PROGRESS_KEY`] in its backing storage.
pub struct ProgressStore<S: KeyValueStore> {
    storage: S,
    completed: CompletionRecord,
}

impl<S: KeyValueStore> ProgressStore<S> {
    /// Create an empty store. Nothing is read until [`restore`](Self::restore).
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            completed: CompletionRecord::default(),
        }
    }

    /// Create a store and restore it from the durable slot.
    pub fn open(storage: S) -> Self {
        let mut store = Self::new(storage);
        store.restore();
        store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn is_complete(&self, category: Category, id: ItemId) -> bool {
        self.completed.set(category).contains(&id)
    }

    /// Flip `id` in `category`, persist, and return the new membership.
    pub fn toggle_complete(&mut self, category: Category, id: ItemId) -> Result<bool, ProgressError> {
        let set = self.completed.set_mut(category);
        let now_complete = if set.remove(&id) {
            false
        } else {
            set.insert(id);
            true
        };
        debug!(category = %category, id = id, complete = now_complete, "Toggled completion");
        self.persist()?;
        Ok(now_complete)
    }

    /// Add `id` to `category` if absent, then persist. Never removes.
    pub fn mark_complete(&mut self, category: Category, id: ItemId) -> Result<(), ProgressError> {
        if self.completed.set_mut(category).insert(id) {
            debug!(category = %category, id = id, "Marked complete");
        }
        self.persist()
    }

    pub fn completed_count(&self, category: Category) -> usize {
        self.completed.set(category).len()
    }

    pub fn completed_ids(&self, category: Category) -> impl Iterator<Item = ItemId> + '_ {
        self.completed.set(category).iter().copied()
    }

    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            anatomy: self.completed_count(Category::Anatomy),
            techniques: self.completed_count(Category::Techniques),
            cases: self.completed_count(Category::Cases),
            quizzes: self.completed_count(Category::Quizzes),
        }
    }

    /// Current record in persisted form, ids ascending.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.completed.to_snapshot()
    }

    /// Write every category to the durable slot in a single `set`.
    pub fn persist(&mut self) -> Result<(), ProgressError> {
        let payload = serde_json::to_string(&self.snapshot())?;
        self.storage.set(PROGRESS_KEY, &payload)?;
        Ok(())
    }

    /// Load the durable slot, replacing the in-memory record.
    ///
    /// Never fails: unreadable or malformed content is logged and the record
    /// is left empty.
    pub fn restore(&mut self) -> RestoreOutcome {
        self.completed = CompletionRecord::default();

        let raw = match self.storage.get(PROGRESS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No saved progress");
                return RestoreOutcome::Missing;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read saved progress, starting empty");
                return RestoreOutcome::Corrupt;
            }
        };

        match serde_json::from_str::<ProgressSnapshot>(&raw) {
            Ok(snapshot) => {
                self.completed = CompletionRecord::from_snapshot(&snapshot);
                info!(total = self.stats().total(), "Restored progress");
                RestoreOutcome::Restored
            }
            Err(e) => {
                warn!(error = %e, "Saved progress is malformed, starting empty");
                RestoreOutcome::Corrupt
            }
        }
    }
}
