//! Response strategies and namespace trimming
//!
//! | Strategy | Hit | Miss | Network down, nothing cached |
//! |----------|-----|------|------------------------------|
//! | Network-first | only after network failure | n/a | index fallback, then error response |
//! | Cache-first | served, no network | fetch + store + trim | error propagated |
//! | Stale-while-revalidate | served, background refresh | fetch + store + trim | error response |
//!
//! Writes are best effort: a failed put or trim is logged and the response
//! already in hand is still returned.

use crate::error::SwCacheResult;
use crate::fetch::Fetcher;
use crate::http::{Request, RequestKey, Response};
use crate::storage::CacheStorage;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    Preload,
    Cache,
    /// Cached index document served for a failed navigation
    IndexFallback,
    /// Synthetic error response
    Error,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Preload => write!(f, "preload"),
            Self::Cache => write!(f, "cache"),
            Self::IndexFallback => write!(f, "index-fallback"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A response produced by a strategy
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: Source,
    /// Background revalidation the host should keep alive until it finishes
    pub revalidation: Option<JoinHandle<()>>,
}

impl Served {
    fn new(response: Response, source: Source) -> Self {
        Self {
            response,
            source,
            revalidation: None,
        }
    }

    fn error() -> Self {
        Self::new(Response::error(), Source::Error)
    }
}

/// Remove oldest entries until the namespace holds at most `max` entries
///
/// Returns how many entries were evicted.
pub async fn trim(storage: &dyn CacheStorage, namespace: &str, max: usize) -> SwCacheResult<usize> {
    let keys = storage.keys(namespace).await?;
    if keys.len() <= max {
        return Ok(0);
    }

    let excess = keys.len() - max;
    let mut evicted = 0;
    for key in keys.into_iter().take(excess) {
        if storage.delete_entry(namespace, &key).await? {
            evicted += 1;
        }
    }

    debug!("Evicted {} entries from {}", evicted, namespace);
    Ok(evicted)
}

/// Store a 2xx response and enforce the bound, logging instead of failing
pub async fn store(
    storage: &dyn CacheStorage,
    namespace: &str,
    key: RequestKey,
    response: Response,
    bound: Option<usize>,
) {
    if !response.is_ok() {
        return;
    }

    if let Err(e) = storage.put(namespace, key.clone(), response).await {
        warn!("Failed to cache {} in {}: {}", key, namespace, e);
        return;
    }

    if let Some(max) = bound {
        if let Err(e) = trim(storage, namespace, max).await {
            warn!("Failed to trim {}: {}", namespace, e);
        }
    }
}

/// Cache lookup that treats storage failures as a miss
async fn lookup(storage: &dyn CacheStorage, namespace: &str, key: &RequestKey) -> Option<Response> {
    match storage.match_entry(namespace, key).await {
        Ok(hit) => hit,
        Err(e) => {
            warn!("Cache lookup for {} in {} failed: {}", key, namespace, e);
            None
        }
    }
}

/// Strategies bound to one storage handle and one network
#[derive(Clone)]
pub struct Strategies {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl Strategies {
    pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { storage, fetcher }
    }

    /// Network-first with app-shell fallback
    ///
    /// `preload` is the outcome of a navigation preload the host already
    /// started, if any. A failed preload counts as a network failure.
    pub async fn network_first(
        &self,
        request: &Request,
        preload: Option<SwCacheResult<Response>>,
        namespace: &str,
        index: &RequestKey,
    ) -> Served {
        let (outcome, source) = match preload {
            Some(preloaded) => (preloaded, Source::Preload),
            None => (self.fetcher.fetch(request).await, Source::Network),
        };

        match outcome {
            Ok(response) => {
                store(
                    self.storage.as_ref(),
                    namespace,
                    request.key(),
                    response.clone(),
                    None,
                )
                .await;
                Served::new(response, source)
            }
            Err(e) => {
                debug!("Navigation to {} failed, trying cache: {}", request.url, e);
                if let Some(cached) = lookup(self.storage.as_ref(), namespace, &request.key()).await
                {
                    return Served::new(cached, Source::Cache);
                }
                if let Some(index) = lookup(self.storage.as_ref(), namespace, index).await {
                    return Served::new(index, Source::IndexFallback);
                }
                warn!("No cached fallback for {}", request.url);
                Served::error()
            }
        }
    }

    /// Cache-first; a network failure on a miss is returned as the error
    pub async fn cache_first(
        &self,
        request: &Request,
        namespace: &str,
        max_entries: usize,
    ) -> SwCacheResult<Served> {
        let key = request.key();
        if let Some(cached) = lookup(self.storage.as_ref(), namespace, &key).await {
            debug!("Cache hit {}", key);
            return Ok(Served::new(cached, Source::Cache));
        }

        let response = self.fetcher.fetch(request).await?;
        store(
            self.storage.as_ref(),
            namespace,
            key,
            response.clone(),
            Some(max_entries),
        )
        .await;
        Ok(Served::new(response, Source::Network))
    }

    /// Stale-while-revalidate; a hit returns at once and refreshes in the background
    pub async fn stale_while_revalidate(
        &self,
        request: &Request,
        namespace: &str,
        max_entries: usize,
    ) -> Served {
        let key = request.key();
        let cached = lookup(self.storage.as_ref(), namespace, &key).await;

        if let Some(cached) = cached {
            debug!("Serving {} stale, revalidating", key);
            let this = self.clone();
            let request = request.clone();
            let namespace = namespace.to_string();
            let handle = tokio::spawn(async move {
                this.revalidate(&request, &namespace, max_entries).await;
            });
            return Served {
                revalidation: Some(handle),
                ..Served::new(cached, Source::Cache)
            };
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                store(
                    self.storage.as_ref(),
                    namespace,
                    key,
                    response.clone(),
                    Some(max_entries),
                )
                .await;
                Served::new(response, Source::Network)
            }
            Err(e) => {
                debug!("Image fetch {} failed with nothing cached: {}", key, e);
                Served::error()
            }
        }
    }

    async fn revalidate(&self, request: &Request, namespace: &str, max_entries: usize) {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                store(
                    self.storage.as_ref(),
                    namespace,
                    request.key(),
                    response,
                    Some(max_entries),
                )
                .await
            }
            Err(e) => debug!("Revalidation of {} failed: {}", request.url, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwCacheError;
    use crate::storage::MemoryStorage;
    use crate::test_support::{FailingPuts, ScriptedFetcher};
    use url::Url;

    const APP: &str = "erp:app:g1";
    const STATIC: &str = "erp:static:g1";
    const IMAGES: &str = "erp:images:g1";

    fn url(path: &str) -> String {
        format!("https://admin.test{}", path)
    }

    fn get(path: &str) -> Request {
        Request::parse_get(&url(path)).unwrap()
    }

    fn key(path: &str) -> RequestKey {
        get(path).key()
    }

    fn setup(fetcher: ScriptedFetcher) -> (Arc<MemoryStorage>, Arc<ScriptedFetcher>, Strategies) {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(fetcher);
        let strategies = Strategies::new(storage.clone(), fetcher.clone());
        (storage, fetcher, strategies)
    }

    #[tokio::test]
    async fn trim_evicts_oldest_excess() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            storage
                .put("ns", key(&format!("/{}.js", i)), Response::new(200, ""))
                .await
                .unwrap();
        }

        assert_eq!(trim(&storage, "ns", 3).await.unwrap(), 2);
        assert_eq!(
            storage.keys("ns").await.unwrap(),
            vec![key("/2.js"), key("/3.js"), key("/4.js")]
        );
        assert_eq!(trim(&storage, "ns", 3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_skips_non_success() {
        let storage = MemoryStorage::new();
        store(&storage, "ns", key("/a.js"), Response::new(500, ""), None).await;
        store(&storage, "ns", key("/b.js"), Response::error(), None).await;
        assert!(storage.keys("ns").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_first_hit_never_touches_network() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        storage
            .put(STATIC, key("/assets/app.js"), Response::new(200, "cached"))
            .await
            .unwrap();

        let served = strategies
            .cache_first(&get("/assets/app.js"), STATIC, 200)
            .await
            .unwrap();

        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.body, "cached");
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn cache_first_miss_fetches_and_stores() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        fetcher.respond(&url("/assets/app.js"), Response::new(200, "fresh"));

        let served = strategies
            .cache_first(&get("/assets/app.js"), STATIC, 200)
            .await
            .unwrap();

        assert_eq!(served.source, Source::Network);
        let stored = storage.match_entry(STATIC, &key("/assets/app.js")).await.unwrap();
        assert_eq!(stored.unwrap().body, "fresh");
    }

    #[tokio::test]
    async fn cache_first_does_not_store_errors() {
        let (storage, _fetcher, strategies) = setup(ScriptedFetcher::new());

        let served = strategies
            .cache_first(&get("/assets/missing.js"), STATIC, 200)
            .await
            .unwrap();

        assert_eq!(served.response.status, 404);
        assert!(storage.keys(STATIC).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_first_offline_miss_propagates() {
        let (_storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        fetcher.set_offline(true);

        let err = strategies
            .cache_first(&get("/assets/app.js"), STATIC, 200)
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn cache_first_bound_evicts_first_inserted() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        for i in 0..201 {
            let path = format!("/assets/chunk-{}.js", i);
            fetcher.respond(&url(&path), Response::new(200, "js"));
            strategies.cache_first(&get(&path), STATIC, 200).await.unwrap();
        }

        let keys = storage.keys(STATIC).await.unwrap();
        assert_eq!(keys.len(), 200);
        assert!(!keys.contains(&key("/assets/chunk-0.js")));
        assert_eq!(keys[0], key("/assets/chunk-1.js"));
        assert_eq!(keys[199], key("/assets/chunk-200.js"));
    }

    #[tokio::test]
    async fn failed_put_still_returns_response() {
        let storage = Arc::new(FailingPuts::new(0));
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&url("/assets/app.js"), Response::new(200, "fresh"));
        let strategies = Strategies::new(storage.clone(), fetcher.clone());

        let served = strategies
            .cache_first(&get("/assets/app.js"), STATIC, 200)
            .await
            .unwrap();

        assert_eq!(served.response.body, "fresh");
        assert!(storage.keys(STATIC).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn swr_hit_returns_before_network_resolves() {
        let (fetcher, gate) = ScriptedFetcher::gated();
        let (storage, fetcher, strategies) = setup(fetcher);
        storage
            .put(IMAGES, key("/img/logo.png"), Response::new(200, "old"))
            .await
            .unwrap();
        fetcher.respond(&url("/img/logo.png"), Response::new(200, "new"));

        let served = strategies
            .stale_while_revalidate(&get("/img/logo.png"), IMAGES, 60)
            .await;

        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.body, "old");

        gate.add_permits(1);
        served.revalidation.unwrap().await.unwrap();

        let refreshed = storage.match_entry(IMAGES, &key("/img/logo.png")).await.unwrap();
        assert_eq!(refreshed.unwrap().body, "new");
        assert_eq!(fetcher.call_count(&url("/img/logo.png")), 1);
    }

    #[tokio::test]
    async fn swr_failed_revalidation_keeps_entry() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        storage
            .put(IMAGES, key("/img/logo.png"), Response::new(200, "old"))
            .await
            .unwrap();
        fetcher.set_offline(true);

        let served = strategies
            .stale_while_revalidate(&get("/img/logo.png"), IMAGES, 60)
            .await;
        served.revalidation.unwrap().await.unwrap();

        let kept = storage.match_entry(IMAGES, &key("/img/logo.png")).await.unwrap();
        assert_eq!(kept.unwrap().body, "old");
    }

    #[tokio::test]
    async fn swr_miss_waits_for_network_and_trims() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        for i in 0..3 {
            let path = format!("/img/{}.png", i);
            fetcher.respond(&url(&path), Response::new(200, "png"));
            let served = strategies.stale_while_revalidate(&get(&path), IMAGES, 2).await;
            assert_eq!(served.source, Source::Network);
            assert!(served.revalidation.is_none());
        }

        assert_eq!(
            storage.keys(IMAGES).await.unwrap(),
            vec![key("/img/1.png"), key("/img/2.png")]
        );
    }

    #[tokio::test]
    async fn swr_offline_miss_is_swallowed() {
        let (_storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        fetcher.set_offline(true);

        let served = strategies
            .stale_while_revalidate(&get("/img/logo.png"), IMAGES, 60)
            .await;

        assert_eq!(served.source, Source::Error);
        assert!(served.response.is_error());
    }

    #[tokio::test]
    async fn network_first_stores_successful_navigation() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        fetcher.respond(&url("/orders"), Response::new(200, "orders"));
        let nav = Request::navigate(Url::parse(&url("/orders")).unwrap());

        let served = strategies
            .network_first(&nav, None, APP, &key("/index.html"))
            .await;

        assert_eq!(served.source, Source::Network);
        let stored = storage.match_entry(APP, &nav.key()).await.unwrap();
        assert_eq!(stored.unwrap().body, "orders");
    }

    #[tokio::test]
    async fn network_first_prefers_preload() {
        let (_storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        let nav = Request::navigate(Url::parse(&url("/orders")).unwrap());

        let served = strategies
            .network_first(
                &nav,
                Some(Ok(Response::new(200, "preloaded"))),
                APP,
                &key("/index.html"),
            )
            .await;

        assert_eq!(served.source, Source::Preload);
        assert_eq!(served.response.body, "preloaded");
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn network_first_fallback_chain() {
        let (storage, fetcher, strategies) = setup(ScriptedFetcher::new());
        fetcher.set_offline(true);
        let index = key("/index.html");
        let orders = Request::navigate(Url::parse(&url("/orders")).unwrap());
        let stock = Request::navigate(Url::parse(&url("/stock")).unwrap());

        // Nothing cached: generic error
        let served = strategies.network_first(&orders, None, APP, &index).await;
        assert_eq!(served.source, Source::Error);
        assert!(served.response.is_error());

        // Index cached: index fallback
        storage
            .put(APP, index.clone(), Response::new(200, "shell"))
            .await
            .unwrap();
        let served = strategies.network_first(&stock, None, APP, &index).await;
        assert_eq!(served.source, Source::IndexFallback);
        assert_eq!(served.response.body, "shell");

        // Exact page cached: exact match wins
        storage
            .put(APP, orders.key(), Response::new(200, "orders"))
            .await
            .unwrap();
        let served = strategies.network_first(&orders, None, APP, &index).await;
        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.body, "orders");
    }

    #[tokio::test]
    async fn network_first_failed_preload_falls_back() {
        let (storage, _fetcher, strategies) = setup(ScriptedFetcher::new());
        let index = key("/index.html");
        storage
            .put(APP, index.clone(), Response::new(200, "shell"))
            .await
            .unwrap();
        let nav = Request::navigate(Url::parse(&url("/orders")).unwrap());

        let served = strategies
            .network_first(
                &nav,
                Some(Err(SwCacheError::network(url("/orders"), "reset"))),
                APP,
                &index,
            )
            .await;

        assert_eq!(served.source, Source::IndexFallback);
    }
}
