//! Scripted network and storage for unit tests

use crate::error::{SwCacheError, SwCacheResult};
use crate::fetch::Fetcher;
use crate::http::{Request, RequestKey, Response};
use crate::storage::{CacheStorage, MemoryStorage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Fetcher answering from a URL → response table and recording every call
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: Mutex<bool>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits for a permit on the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (fetcher, gate)
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SwCacheError::Internal(e.to_string()))?;
            permit.forget();
        }

        if *self.offline.lock().unwrap() {
            return Err(SwCacheError::network(url, "offline"));
        }

        let scripted = self.routes.lock().unwrap().get(&url).cloned();
        Ok(scripted.unwrap_or_else(|| Response::new(404, "not found")))
    }
}

/// In-memory storage that rejects every write after the first `allowed`
pub struct FailingPuts {
    inner: MemoryStorage,
    allowed: AtomicUsize,
}

impl FailingPuts {
    pub fn new(allowed: usize) -> Self {
        Self {
            inner: MemoryStorage::new(),
            allowed: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl CacheStorage for FailingPuts {
    async fn open(&self, namespace: &str) -> SwCacheResult<()> {
        self.inner.open(namespace).await
    }

    async fn has(&self, namespace: &str) -> SwCacheResult<bool> {
        self.inner.has(namespace).await
    }

    async fn namespaces(&self) -> SwCacheResult<Vec<String>> {
        self.inner.namespaces().await
    }

    async fn delete_namespace(&self, namespace: &str) -> SwCacheResult<bool> {
        self.inner.delete_namespace(namespace).await
    }

    async fn match_entry(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> SwCacheResult<Option<Response>> {
        self.inner.match_entry(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: RequestKey, response: Response) -> SwCacheResult<()> {
        let granted = self
            .allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !granted {
            return Err(SwCacheError::Storage("quota exceeded".to_string()));
        }
        self.inner.put(namespace, key, response).await
    }

    async fn delete_entry(&self, namespace: &str, key: &RequestKey) -> SwCacheResult<bool> {
        self.inner.delete_entry(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> SwCacheResult<Vec<RequestKey>> {
        self.inner.keys(namespace).await
    }
}
