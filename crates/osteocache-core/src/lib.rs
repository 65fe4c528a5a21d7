//! Core library for osteocache.
//!
//! Two independent components make up the core of the study application:
//!
//! - [`progress`]: the per-category completion store, mirrored wholesale to a
//!   durable key-value slot and restored at startup.
//! - [`offline`]: the network-first resource cache with a single versioned
//!   bucket, seeded from a fixed manifest and refreshed from live traffic.
//!
//! [`content`] loads the four study datasets through the offline cache and
//! checks quiz answers, and [`config`] locates everything on disk.

pub mod config;
pub mod content;
pub mod offline;
pub mod progress;
pub mod storage;

pub use config::Config;
pub use content::{ContentError, ContentItem, ContentLibrary, Quiz, QuizAttempt, QuizResult};
pub use offline::{
    CacheBucket, CacheError, CacheSettings, CacheStorage, CachedResponse, Destination,
    FetchError, HttpTransport, InterceptOutcome, LifecycleState, OfflineCache, Request,
    Response, Transport,
};
pub use progress::{Category, ItemId, ProgressError, ProgressSnapshot, ProgressStats, ProgressStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
