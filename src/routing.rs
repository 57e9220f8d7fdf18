//! Request classification
//!
//! Decides, per request, which strategy handles it or whether it goes to the
//! network untouched. Only same-origin GET requests outside the excluded
//! prefixes are considered; the rest of the table is an ordered list of
//! (predicate, strategy) rules where the first match wins.

use crate::config::schema::RoutingConfig;
use crate::http::{Destination, Request, RequestMode};
use std::fmt;
use url::Url;

/// How an intercepted request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkFirst => write!(f, "network-first"),
            Self::CacheFirst => write!(f, "cache-first"),
            Self::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Why a request was left to the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    NotGet,
    CrossOrigin,
    Excluded,
    Unmatched,
    /// The controller is not activated and intercepts nothing
    Inactive,
}

/// Routing decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Intercept(Strategy),
    Passthrough(Bypass),
}

/// Condition a rule tests against the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Navigation mode or document destination
    Navigation,
    /// URL path starts with the prefix
    PathPrefix(String),
    /// Last path segment ends with one of the extensions (lowercase, no dot)
    Extension(Vec<String>),
}

impl Predicate {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Self::Navigation => {
                request.mode == RequestMode::Navigate
                    || request.destination == Destination::Document
            }
            Self::PathPrefix(prefix) => request.url.path().starts_with(prefix.as_str()),
            Self::Extension(exts) => match extension(&request.url) {
                Some(ext) => exts.iter().any(|e| *e == ext),
                None => false,
            },
        }
    }
}

/// Lowercased extension of the last path segment
fn extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub strategy: Strategy,
}

/// Ordered routing table for one scope
#[derive(Debug, Clone)]
pub struct RouteTable {
    scope: Url,
    excluded_prefixes: Vec<String>,
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Build the table from routing configuration
    pub fn new(scope: Url, config: &RoutingConfig) -> Self {
        let normalise = |exts: &[String]| -> Vec<String> {
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        };

        let rules = vec![
            RouteRule {
                name: "navigation",
                predicate: Predicate::Navigation,
                strategy: Strategy::NetworkFirst,
            },
            RouteRule {
                name: "static-dir",
                predicate: Predicate::PathPrefix(config.static_dir.clone()),
                strategy: Strategy::CacheFirst,
            },
            RouteRule {
                name: "static-ext",
                predicate: Predicate::Extension(normalise(&config.static_extensions)),
                strategy: Strategy::CacheFirst,
            },
            RouteRule {
                name: "image-ext",
                predicate: Predicate::Extension(normalise(&config.image_extensions)),
                strategy: Strategy::StaleWhileRevalidate,
            },
        ];

        Self {
            scope,
            excluded_prefixes: config.excluded_prefixes.clone(),
            rules,
        }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Classify a request
    pub fn route(&self, request: &Request) -> Route {
        if !request.is_get() {
            return Route::Passthrough(Bypass::NotGet);
        }
        if request.url.origin() != self.scope.origin() {
            return Route::Passthrough(Bypass::CrossOrigin);
        }
        let path = request.url.path();
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Route::Passthrough(Bypass::Excluded);
        }

        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(request))
            .map(|rule| Route::Intercept(rule.strategy))
            .unwrap_or(Route::Passthrough(Bypass::Unmatched))
    }
}
