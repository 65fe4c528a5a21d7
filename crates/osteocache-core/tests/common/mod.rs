#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use osteocache_core::offline::default_manifest;
use osteocache_core::{
    CacheSettings, CacheStorage, FetchError, OfflineCache, Request, Response, Transport,
};

/// In-process network double: a route table plus an online switch.
#[derive(Default)]
pub struct ScriptedNetwork {
    online: AtomicBool,
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn online() -> Arc<Self> {
        let network = Self::default();
        network.online.store(true, Ordering::SeqCst);
        Arc::new(network)
    }

    /// Serves every manifest URL with a 200 and a body naming the URL.
    pub fn serving_manifest() -> Arc<Self> {
        let network = Self::online();
        for url in default_manifest() {
            network.route(&url, 200, format!("content of {}", url));
        }
        network
    }

    pub fn route(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.into()));
    }

    pub fn unroute(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Network("network unreachable".to_string()));
        }
        let route = self.routes.lock().unwrap().get(&request.url).cloned();
        match route {
            Some((status, body)) => Ok(Response::new(request.url.clone(), status, body)),
            None => Ok(Response::new(request.url.clone(), 404, b"not found".to_vec())),
        }
    }
}

pub fn offline_cache(network: &Arc<ScriptedNetwork>, root: &Path, version: &str) -> OfflineCache {
    let storage = CacheStorage::new(root).unwrap();
    let settings = CacheSettings::default().with_version(version);
    OfflineCache::new(network.clone(), storage, settings)
}
