//! In-memory cache storage

use super::CacheStorage;
use crate::error::SwCacheResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Namespace {
    entries: HashMap<RequestKey, (u64, Response)>,
    next_seq: u64,
}

impl Namespace {
    fn insert(&mut self, key: RequestKey, response: Response) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, (seq, response));
    }

    fn ordered_keys(&self) -> Vec<RequestKey> {
        let mut keyed: Vec<_> = self.entries.iter().map(|(k, (seq, _))| (*seq, k)).collect();
        keyed.sort_by_key(|(seq, _)| *seq);
        keyed.into_iter().map(|(_, k)| k.clone()).collect()
    }
}

/// Storage held in process memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    namespaces: RwLock<BTreeMap<String, Namespace>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, namespace: &str) -> SwCacheResult<()> {
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, namespace: &str) -> SwCacheResult<bool> {
        Ok(self.namespaces.read().await.contains_key(namespace))
    }

    async fn namespaces(&self) -> SwCacheResult<Vec<String>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> SwCacheResult<bool> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }

    async fn match_entry(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> SwCacheResult<Option<Response>> {
        let guard = self.namespaces.read().await;
        Ok(guard
            .get(namespace)
            .and_then(|ns| ns.entries.get(key))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, namespace: &str, key: RequestKey, response: Response) -> SwCacheResult<()> {
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    async fn delete_entry(&self, namespace: &str, key: &RequestKey) -> SwCacheResult<bool> {
        let mut guard = self.namespaces.write().await;
        Ok(guard
            .get_mut(namespace)
            .map(|ns| ns.entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, namespace: &str) -> SwCacheResult<Vec<RequestKey>> {
        let guard = self.namespaces.read().await;
        Ok(guard
            .get(namespace)
            .map(Namespace::ordered_keys)
            .unwrap_or_default())
    }
}
