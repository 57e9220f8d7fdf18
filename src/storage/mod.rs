//! Persistent cache storage
//!
//! The controller keeps no state across suspensions; everything that must
//! survive lives behind [`CacheStorage`]. Each operation is atomic with
//! respect to the others.
//!
//! # Ordering
//!
//! Backends record an insertion sequence for every entry and list keys in
//! that order. Replacing an entry gives it a fresh sequence number, so the
//! first key listed is always the least recently written one. Eviction
//! depends on this.
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | [`MemoryStorage`] | process lifetime | tests, embedding |
//! | [`DiskStorage`] | directory tree | CLI |

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::error::SwCacheResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;

/// Namespaced request/response storage
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist yet
    async fn open(&self, namespace: &str) -> SwCacheResult<()>;

    /// Whether the namespace exists
    async fn has(&self, namespace: &str) -> SwCacheResult<bool>;

    /// Names of all existing namespaces
    async fn namespaces(&self) -> SwCacheResult<Vec<String>>;

    /// Delete a namespace and all its entries, returning whether it existed
    async fn delete_namespace(&self, namespace: &str) -> SwCacheResult<bool>;

    /// Look up an entry
    async fn match_entry(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> SwCacheResult<Option<Response>>;

    /// Insert or wholesale replace an entry, creating the namespace if needed
    async fn put(&self, namespace: &str, key: RequestKey, response: Response) -> SwCacheResult<()>;

    /// Remove an entry, returning whether it existed
    async fn delete_entry(&self, namespace: &str, key: &RequestKey) -> SwCacheResult<bool>;

    /// Keys of a namespace, oldest insertion first
    ///
    /// A missing namespace lists as empty.
    async fn keys(&self, namespace: &str) -> SwCacheResult<Vec<RequestKey>>;
}
