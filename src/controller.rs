//! Cache controller for one deployed generation
//!
//! A controller owns the three namespaces of its generation and reacts to
//! four kinds of events:
//!
//! | Event | Handler | Outcome |
//! |-------|---------|---------|
//! | install | pre-populate app shell | `Installed` or `InstallFailed` |
//! | activate | enable preload, prune stale generations, claim clients | `Activated` |
//! | message | skip-wait request | `SkipWaiting` / `Ignored` |
//! | fetch | route + strategy | `Served` / `Passthrough` |
//!
//! Lifecycle: `parsed → installing → installed → activating → activated`,
//! with `redundant` reachable from any state. The controller holds no state
//! that must survive a suspension; [`CacheController::resume`] rebuilds an
//! activated controller from settings alone.

use crate::config::schema::{CacheConfig, Config, RoutingConfig};
use crate::error::{SwCacheError, SwCacheResult};
use crate::fetch::Fetcher;
use crate::generation::GenerationTag;
use crate::http::{Request, RequestKey, Response};
use crate::namespace::{self, Namespaces};
use crate::routing::{Bypass, Route, RouteTable, Strategy};
use crate::storage::CacheStorage;
use crate::strategy::{Served, Strategies};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Static settings of one generation's controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub prefix: String,
    pub generation: GenerationTag,
    /// Registration scope; must end with `/`
    pub scope: Url,
    pub static_max_entries: usize,
    pub image_max_entries: usize,
    pub routing: RoutingConfig,
    /// Whether the host can start navigation requests before the controller runs
    pub navigation_preload_supported: bool,
}

impl ControllerSettings {
    pub fn new(
        prefix: &str,
        generation: GenerationTag,
        scope: &str,
        routing: RoutingConfig,
    ) -> SwCacheResult<Self> {
        let bounds = CacheConfig::default();
        Ok(Self {
            prefix: prefix.to_string(),
            generation,
            scope: parse_scope(scope)?,
            static_max_entries: bounds.static_max_entries,
            image_max_entries: bounds.image_max_entries,
            routing,
            navigation_preload_supported: false,
        })
    }

    /// Settings from loaded configuration
    pub fn from_config(
        config: &Config,
        generation: GenerationTag,
        scope: &str,
    ) -> SwCacheResult<Self> {
        Ok(Self {
            static_max_entries: config.cache.static_max_entries,
            image_max_entries: config.cache.image_max_entries,
            ..Self::new(
                &config.cache.prefix,
                generation,
                scope,
                config.routing.clone(),
            )?
        })
    }

    /// The scope root document
    pub fn root_url(&self) -> Url {
        self.scope.clone()
    }

    /// The index document under the scope
    pub fn index_url(&self) -> Url {
        let mut url = self.scope.clone();
        url.set_path(&format!("{}index.html", self.scope.path()));
        url
    }
}

fn parse_scope(scope: &str) -> SwCacheResult<Url> {
    let invalid = |reason: &str| SwCacheError::InvalidScope {
        scope: scope.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(scope).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if !url.path().ends_with('/') {
        return Err(invalid("path must end with '/'"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment"));
    }
    Ok(url)
}

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        write!(f, "{}", name)
    }
}

/// Structured message posted by a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate a waiting generation now instead of when all clients close
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a raw message; malformed payloads are `Unknown`
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            debug!("Ignoring malformed client message: {}", e);
            Self::Unknown
        })
    }
}

/// An intercepted request
#[derive(Debug)]
pub struct FetchEvent {
    pub request: Request,
    /// Result of a navigation preload the host already started
    pub preload: Option<SwCacheResult<Response>>,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            preload: None,
        }
    }

    pub fn with_preload(mut self, preload: SwCacheResult<Response>) -> Self {
        self.preload = Some(preload);
        self
    }
}

/// Events delivered to a controller
#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Message(String),
    Fetch(FetchEvent),
}

/// Discriminant of [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Message,
    Fetch,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Install => EventKind::Install,
            Self::Activate => EventKind::Activate,
            Self::Message(_) => EventKind::Message,
            Self::Fetch(_) => EventKind::Fetch,
        }
    }
}

/// What activation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale namespaces removed
    pub deleted: Vec<String>,
    pub navigation_preload: bool,
    /// Whether open clients were claimed without a reload
    pub claimed: bool,
}

/// Result of handling one event
#[derive(Debug)]
pub enum Outcome {
    Installed,
    Activated(ActivationReport),
    SkipWaiting,
    Ignored,
    Served(Served),
    Passthrough(Bypass),
}

/// Controller for one generation
pub struct CacheController {
    settings: ControllerSettings,
    namespaces: Namespaces,
    routes: RouteTable,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    strategies: Strategies,
    state: LifecycleState,
    navigation_preload: bool,
    skip_waiting: bool,
}

impl CacheController {
    /// Create a freshly parsed controller
    pub fn new(
        settings: ControllerSettings,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let namespaces = Namespaces::new(&settings.prefix, &settings.generation);
        let routes = RouteTable::new(settings.scope.clone(), &settings.routing);
        let strategies = Strategies::new(storage.clone(), fetcher.clone());
        Self {
            settings,
            namespaces,
            routes,
            storage,
            fetcher,
            strategies,
            state: LifecycleState::Parsed,
            navigation_preload: false,
            skip_waiting: false,
        }
    }

    /// Rebuild an already-activated controller after a suspension
    pub fn resume(
        settings: ControllerSettings,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let navigation_preload = settings.navigation_preload_supported;
        Self {
            state: LifecycleState::Activated,
            navigation_preload,
            ..Self::new(settings, storage, fetcher)
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn generation(&self) -> &GenerationTag {
        &self.settings.generation
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    pub fn navigation_preload_enabled(&self) -> bool {
        self.navigation_preload
    }

    /// Dispatch an event to its handler
    pub async fn handle(&mut self, event: Event) -> SwCacheResult<Outcome> {
        debug!(
            generation = %self.settings.generation,
            kind = ?event.kind(),
            "Handling event"
        );
        match event {
            Event::Install => self.install().await.map(|()| Outcome::Installed),
            Event::Activate => self.activate().await.map(Outcome::Activated),
            Event::Message(raw) => Ok(self.on_message(&raw)),
            Event::Fetch(fetch) => self.respond(fetch).await,
        }
    }

    /// Mark the controller as replaced
    pub fn make_redundant(&mut self) {
        if self.state != LifecycleState::Redundant {
            info!(generation = %self.settings.generation, "Generation is redundant");
            self.state = LifecycleState::Redundant;
        }
    }

    fn transition(&mut self, from: LifecycleState, to: LifecycleState) -> SwCacheResult<()> {
        if self.state != from {
            return Err(SwCacheError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Pre-populate the app shell with the scope root and index document
    async fn install(&mut self) -> SwCacheResult<()> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing)?;

        match self.precache_shell().await {
            Ok(()) => {
                self.state = LifecycleState::Installed;
                info!(generation = %self.settings.generation, "Installed");
                Ok(())
            }
            Err(reason) => {
                self.state = LifecycleState::Redundant;
                warn!(
                    generation = %self.settings.generation,
                    "Install failed: {}", reason
                );
                Err(SwCacheError::InstallFailed {
                    generation: self.settings.generation.to_string(),
                    reason,
                })
            }
        }
    }

    /// All-or-nothing: nothing is stored unless every shell document fetched,
    /// and a failed write removes whatever part of the shell was written
    async fn precache_shell(&self) -> Result<(), String> {
        let requests = [
            Request::get(self.settings.root_url()),
            Request::get(self.settings.index_url()),
        ];
        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(response) if response.is_ok() => fetched.push((request.key(), response)),
                Ok(response) => {
                    return Err(format!("{} returned {}", request.url, response.status))
                }
                Err(e) => return Err(e.to_string()),
            }
        }

        let namespace = &self.namespaces.app_shell;
        for (key, response) in fetched {
            if let Err(e) = self.storage.put(namespace, key, response).await {
                if let Err(cleanup) = self.storage.delete_namespace(namespace).await {
                    warn!("Failed to remove partial shell {}: {}", namespace, cleanup);
                }
                return Err(e.to_string());
            }
        }
        Ok(())
    }

    /// Enable preload, delete stale generations, open current namespaces, claim clients
    async fn activate(&mut self) -> SwCacheResult<ActivationReport> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)?;

        self.navigation_preload = self.settings.navigation_preload_supported;
        let deleted = self.prune_stale().await;

        for namespace in self.namespaces.iter() {
            if let Err(e) = self.storage.open(namespace).await {
                warn!("Failed to open {}: {}", namespace, e);
            }
        }

        self.state = LifecycleState::Activated;
        info!(
            generation = %self.settings.generation,
            deleted = deleted.len(),
            "Activated"
        );

        Ok(ActivationReport {
            deleted,
            navigation_preload: self.navigation_preload,
            claimed: true,
        })
    }

    async fn prune_stale(&self) -> Vec<String> {
        let names = match self.storage.namespaces().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list namespaces: {}", e);
                return Vec::new();
            }
        };

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| {
                namespace::is_stale(name, &self.settings.prefix, &self.settings.generation)
            })
            .collect();

        let results = join_all(stale.iter().map(|name| self.storage.delete_namespace(name))).await;

        stale
            .into_iter()
            .zip(results)
            .filter_map(|(name, result)| match result {
                Ok(_) => {
                    info!("Deleted stale namespace {}", name);
                    Some(name)
                }
                Err(e) => {
                    warn!("Failed to delete stale namespace {}: {}", name, e);
                    None
                }
            })
            .collect()
    }

    fn on_message(&mut self, raw: &str) -> Outcome {
        match ClientMessage::parse(raw) {
            ClientMessage::SkipWaiting => {
                debug!(generation = %self.settings.generation, "Skip waiting requested");
                self.skip_waiting = true;
                Outcome::SkipWaiting
            }
            ClientMessage::Unknown => Outcome::Ignored,
        }
    }

    /// Answer an intercepted request
    ///
    /// Only cache-first can fail: a miss while offline propagates.
    pub async fn respond(&self, event: FetchEvent) -> SwCacheResult<Outcome> {
        if self.state != LifecycleState::Activated {
            return Ok(Outcome::Passthrough(Bypass::Inactive));
        }

        let FetchEvent { request, preload } = event;
        let strategy = match self.routes.route(&request) {
            Route::Passthrough(reason) => {
                debug!("Passthrough {} {} ({:?})", request.method, request.url, reason);
                return Ok(Outcome::Passthrough(reason));
            }
            Route::Intercept(strategy) => strategy,
        };
        debug!("{} {} via {}", request.method, request.url, strategy);

        let served = match strategy {
            Strategy::NetworkFirst => {
                let preload = if self.navigation_preload { preload } else { None };
                let index = RequestKey::get(&self.settings.index_url());
                self.strategies
                    .network_first(&request, preload, &self.namespaces.app_shell, &index)
                    .await
            }
            Strategy::CacheFirst => {
                self.strategies
                    .cache_first(
                        &request,
                        &self.namespaces.static_assets,
                        self.settings.static_max_entries,
                    )
                    .await?
            }
            Strategy::StaleWhileRevalidate => {
                self.strategies
                    .stale_while_revalidate(
                        &request,
                        &self.namespaces.images,
                        self.settings.image_max_entries,
                    )
                    .await
            }
        };

        Ok(Outcome::Served(served))
    }
}
