//! Network-first offline resource cache.
//!
//! `OfflineCache` sits between the application and the network. Every
//! request is tried live first; successful responses are copied into the
//! current versioned bucket in the background. When the network fails the
//! bucket answers instead, and navigations with no cached copy get the shell
//! document so the application always loads.
//!
//! Lifecycle:
//! - install: seed the bucket from the manifest, all or nothing
//! - activate: purge every bucket whose tag is not the current version
//! - intercept: network first, cache fallback, shell fallback for documents

pub mod bucket;
pub mod error;
pub mod request;
pub mod transport;
pub mod worker;

pub use bucket::{CacheBucket, CacheStorage, CachedResponse};
pub use error::{CacheError, FetchError};
pub use request::{Destination, Request, Response};
pub use transport::{HttpTransport, Transport};
pub use worker::{InterceptOutcome, LifecycleState, OfflineCache};

use std::time::Duration;

use crate::progress::Category;

/// Bucket tag of the current deployment. Bump whenever the manifest or the
/// caching logic changes so installs purge and reseed.
pub const CACHE_VERSION: &str = "osteopath-app-v1";

/// Document served for navigations that miss the cache while offline.
pub const SHELL_DOCUMENT: &str = "/index.html";

/// Time allowed for a live fetch before falling back to the cache.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 10;

/// Application shell plus the four content datasets.
pub fn default_manifest() -> Vec<String> {
    let mut manifest: Vec<String> = ["/", SHELL_DOCUMENT, "/style.css", "/app.js", "/manifest.json"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    manifest.extend(Category::ALL.iter().map(|c| c.dataset_path().to_string()));
    manifest
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub version: String,
    pub manifest: Vec<String>,
    pub shell_document: String,
    pub network_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            manifest: default_manifest(),
            shell_document: SHELL_DOCUMENT.to_string(),
            network_timeout: Duration::from_secs(DEFAULT_NETWORK_TIMEOUT_SECS),
        }
    }
}

impl CacheSettings {
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
