use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::request::{cache_key, Request, Response};
use crate::storage::{validate_key, StorageError};

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// File under the storage root naming the bucket being served. The leading
/// dot keeps it out of the tag namespace.
const ACTIVE_MARKER: &str = ".active";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A response served from a bucket, with the time it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// On-disk metadata of one bucket entry. The body sits next to it.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    method: String,
    url: String,
    response: Response,
    cached_at: DateTime<Utc>,
}

/// Root directory holding one subdirectory per bucket tag.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle to the bucket for `tag` without touching the disk. Lookups on a
    /// bucket that does not exist yet simply miss.
    pub fn bucket(&self, tag: &str) -> Result<CacheBucket, StorageError> {
        validate_key(tag)?;
        Ok(CacheBucket {
            tag: tag.to_string(),
            dir: self.root.join(tag),
        })
    }

    /// Open the bucket for `tag`, creating it if needed.
    pub async fn open(&self, tag: &str) -> Result<CacheBucket, StorageError> {
        let bucket = self.bucket(tag)?;
        tokio::fs::create_dir_all(&bucket.dir).await?;
        Ok(bucket)
    }

    pub async fn has(&self, tag: &str) -> Result<bool, StorageError> {
        let bucket = self.bucket(tag)?;
        Ok(tokio::fs::try_exists(&bucket.dir).await?)
    }

    /// Tags of every existing bucket, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut tags = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    tags.push(name);
                }
            }
        }
        tags.sort();
        Ok(tags)
    }

    /// Delete a bucket and everything in it. Returns whether it existed.
    pub async fn delete(&self, tag: &str) -> Result<bool, StorageError> {
        let bucket = self.bucket(tag)?;
        match tokio::fs::remove_dir_all(&bucket.dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Tag of the last bucket to be installed successfully, if any.
    pub async fn active_tag(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.root.join(ACTIVE_MARKER)).await {
            Ok(tag) => {
                let tag = tag.trim();
                validate_key(tag)?;
                Ok(Some(tag.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_active_tag(&self, tag: &str) -> Result<(), StorageError> {
        validate_key(tag)?;
        write_atomic(&self.root.join(ACTIVE_MARKER), tag.as_bytes()).await?;
        Ok(())
    }
}

/// One versioned store of request to response pairs.
#[derive(Debug, Clone)]
pub struct CacheBucket {
    tag: String,
    dir: PathBuf,
}

impl CacheBucket {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{}.{}", key, META_EXT)),
            self.dir.join(format!("{}.{}", key, BODY_EXT)),
        )
    }

    /// Store `response` under `request`, replacing any previous entry.
    /// Concurrent puts for the same request: last write wins.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let (meta_path, body_path) = self.entry_paths(&request.cache_key());
        let entry = StoredEntry {
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            response: response.clone(),
            cached_at: Utc::now(),
        };
        let meta = serde_json::to_vec_pretty(&entry)?;

        // Body first so a visible metadata file always has a body beside it
        write_atomic(&body_path, &response.body).await?;
        write_atomic(&meta_path, &meta).await?;
        debug!(bucket = %self.tag, url = %request.url, bytes = response.body.len(), "Cached response");
        Ok(())
    }

    /// Look up `request`. Non-GET requests never match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<CachedResponse>, StorageError> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        self.match_key(&request.cache_key()).await
    }

    /// Look up a GET for `url`.
    pub async fn match_url(&self, url: &str) -> Result<Option<CachedResponse>, StorageError> {
        self.match_key(&cache_key("GET", url)).await
    }

    async fn match_key(&self, key: &str) -> Result<Option<CachedResponse>, StorageError> {
        let (meta_path, body_path) = self.entry_paths(key);
        let meta = match tokio::fs::read(&meta_path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_slice(&meta)?;
        let body = match tokio::fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(bucket = %self.tag, url = %entry.url, "Cache entry has no body, ignoring");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut response = entry.response;
        response.body = body;
        Ok(Some(CachedResponse {
            response,
            cached_at: entry.cached_at,
        }))
    }

    /// Remove the entry for `request`. Returns whether one existed.
    pub async fn delete(&self, request: &Request) -> Result<bool, StorageError> {
        let (meta_path, body_path) = self.entry_paths(&request.cache_key());
        let existed = remove_if_exists(&meta_path).await?;
        remove_if_exists(&body_path).await?;
        Ok(existed)
    }

    /// URLs of every stored entry, sorted.
    pub async fn urls(&self) -> Result<Vec<String>, StorageError> {
        let mut urls = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(urls),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let meta = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<StoredEntry>(&meta) {
                Ok(stored) => urls.push(stored.url),
                Err(e) => warn!(path = %path.display(), error = %e, "Unreadable cache entry"),
            }
        }
        urls.sort();
        Ok(urls)
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    // Unique per write so concurrent puts of one entry never share a temp file
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    tmp.push(format!(".{}-{}.tmp", std::process::id(), seq));
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
