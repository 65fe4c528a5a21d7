use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::try_join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::bucket::{CacheBucket, CacheStorage, CachedResponse};
use super::error::{CacheError, FetchError};
use super::request::{Request, Response};
use super::transport::Transport;
use super::CacheSettings;

/// Where this version of the cache logic is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Installed,
    Activated,
}

/// How an intercepted request was answered.
#[derive(Debug)]
pub enum InterceptOutcome {
    /// Live network response. A copy is being written behind if cacheable.
    LiveHit(Response),
    /// Network failed; the bucket had this request.
    CacheHit(CachedResponse),
    /// Network failed on a navigation the bucket lacked; the shell document.
    ShellFallback(CachedResponse),
    /// Network failed and nothing suitable was cached.
    Failure(CacheError),
}

impl InterceptOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            InterceptOutcome::LiveHit(response) => Some(response),
            InterceptOutcome::CacheHit(cached) | InterceptOutcome::ShellFallback(cached) => {
                Some(&cached.response)
            }
            InterceptOutcome::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Response, CacheError> {
        match self {
            InterceptOutcome::LiveHit(response) => Ok(response),
            InterceptOutcome::CacheHit(cached) | InterceptOutcome::ShellFallback(cached) => {
                Ok(cached.response)
            }
            InterceptOutcome::Failure(e) => Err(e),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InterceptOutcome::LiveHit(_) => "live",
            InterceptOutcome::CacheHit(_) => "cache",
            InterceptOutcome::ShellFallback(_) => "shell",
            InterceptOutcome::Failure(_) => "failure",
        }
    }
}

/// Network-first interceptor owning the versioned cache buckets.
///
/// The application never touches buckets directly; everything goes through
/// [`intercept`](Self::intercept). Requests are served from the bucket named
/// by the storage's active tag, which only moves when an install succeeds.
/// Before any install has succeeded the configured version is served.
pub struct OfflineCache {
    transport: Arc<dyn Transport>,
    storage: CacheStorage,
    settings: CacheSettings,
    state: Mutex<LifecycleState>,
    // Dropping a handle detaches the task, so pending writes outlive the cache
    write_behind: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineCache {
    pub fn new(transport: Arc<dyn Transport>, storage: CacheStorage, settings: CacheSettings) -> Self {
        Self {
            transport,
            storage,
            settings,
            state: Mutex::new(LifecycleState::New),
            write_behind: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.state)
    }

    /// Tag of the bucket requests are served from.
    pub async fn serving_tag(&self) -> String {
        match self.storage.active_tag().await {
            Ok(Some(tag)) => tag,
            Ok(None) => self.settings.version.clone(),
            Err(e) => {
                warn!(error = %e, "Unreadable active cache marker, using configured version");
                self.settings.version.clone()
            }
        }
    }

    /// Bucket requests are served from. May not exist on disk yet.
    pub async fn current_bucket(&self) -> Result<CacheBucket, CacheError> {
        Ok(self.storage.bucket(&self.serving_tag().await)?)
    }

    /// Seed the current bucket with every manifest URL.
    ///
    /// All manifest fetches must succeed with an OK status before anything is
    /// written; otherwise install fails and the bucket is left untouched. A
    /// write failure removes the half-seeded bucket unless it is the one being
    /// served. On success the new version becomes the active tag.
    /// Returns the number of entries seeded.
    pub async fn install(&self) -> Result<usize, CacheError> {
        info!(version = %self.settings.version, urls = self.settings.manifest.len(), "Installing offline cache");

        let fetches = self.settings.manifest.iter().map(|url| async move {
            let request = Request::for_url(url.as_str());
            let response = self
                .fetch_live(&request)
                .await
                .map_err(|source| CacheError::Seed {
                    url: url.clone(),
                    source,
                })?;
            if !response.ok() {
                return Err(CacheError::BadStatus {
                    url: url.clone(),
                    status: response.status,
                });
            }
            Ok((request, response))
        });

        let seeded = match try_join_all(fetches).await {
            Ok(seeded) => seeded,
            Err(e) => {
                warn!(version = %self.settings.version, error = %e, "Install failed");
                return Err(e);
            }
        };

        if let Err(e) = self.seed(&seeded).await {
            warn!(version = %self.settings.version, error = %e, "Install failed while writing");
            self.discard_partial_install().await;
            return Err(e);
        }
        self.storage.set_active_tag(&self.settings.version).await?;

        *lock(&self.state) = LifecycleState::Installed;
        info!(version = %self.settings.version, entries = seeded.len(), "Offline cache installed");
        Ok(seeded.len())
    }

    async fn seed(&self, seeded: &[(Request, Response)]) -> Result<(), CacheError> {
        let bucket = self.storage.open(&self.settings.version).await?;
        for (request, response) in seeded {
            bucket.put(request, response).await?;
        }
        Ok(())
    }

    async fn discard_partial_install(&self) {
        let version = &self.settings.version;
        match self.storage.active_tag().await {
            Ok(Some(active)) if &active == version => return,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Unreadable active cache marker, keeping partial bucket");
                return;
            }
        }
        if let Err(e) = self.storage.delete(version).await {
            warn!(version = %version, error = %e, "Failed to remove partial bucket");
        }
    }

    /// Delete every bucket whose tag is not the current version.
    /// Returns the purged tags.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        if self.state() == LifecycleState::New {
            return Err(CacheError::NotInstalled);
        }

        let mut purged = Vec::new();
        for tag in self.storage.keys().await? {
            if tag != self.settings.version {
                info!(tag = %tag, "Deleting stale cache");
                self.storage.delete(&tag).await?;
                purged.push(tag);
            }
        }

        *lock(&self.state) = LifecycleState::Activated;
        Ok(purged)
    }

    /// Answer `request` network first, falling back to the bucket.
    pub async fn intercept(&self, request: Request) -> InterceptOutcome {
        match self.fetch_live(&request).await {
            Ok(response) => {
                if request.is_cacheable() && response.ok() {
                    match self.current_bucket().await {
                        Ok(bucket) => self.spawn_write_behind(bucket, request, response.clone()),
                        Err(e) => warn!(error = %e, "No bucket for write-behind"),
                    }
                }
                InterceptOutcome::LiveHit(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network unavailable, trying cache");
                self.fallback(&request, e).await
            }
        }
    }

    /// Wait for every outstanding write-behind task.
    pub async fn settle(&self) {
        let pending = std::mem::take(&mut *lock(&self.write_behind));
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cache write task did not complete");
            }
        }
    }

    async fn fetch_live(&self, request: &Request) -> Result<Response, FetchError> {
        let timeout = self.settings.network_timeout;
        match tokio::time::timeout(timeout, self.transport.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    async fn fallback(&self, request: &Request, error: FetchError) -> InterceptOutcome {
        if !request.is_cacheable() {
            return InterceptOutcome::Failure(error.into());
        }

        let bucket = match self.current_bucket().await {
            Ok(bucket) => bucket,
            Err(e) => return InterceptOutcome::Failure(e),
        };

        match bucket.match_request(request).await {
            Ok(Some(cached)) => return InterceptOutcome::CacheHit(cached),
            Ok(None) => {}
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed"),
        }

        if request.is_navigation() {
            match bucket.match_url(&self.settings.shell_document).await {
                Ok(Some(shell)) => {
                    debug!(url = %request.url, "Serving shell document");
                    return InterceptOutcome::ShellFallback(shell);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Shell document lookup failed"),
            }
        }

        InterceptOutcome::Failure(error.into())
    }

    /// Best effort: a failed write is logged and dropped.
    fn spawn_write_behind(&self, bucket: CacheBucket, request: Request, response: Response) {
        let handle = tokio::spawn(async move {
            if let Err(e) = bucket.put(&request, &response).await {
                warn!(url = %request.url, error = %e, "Failed to cache response");
            }
        });

        let mut pending = lock(&self.write_behind);
        // Reap finished writes so the list doesn't grow without bound
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
