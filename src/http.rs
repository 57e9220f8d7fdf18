//! Request and response values passed through the controller
//!
//! These mirror the parts of fetch-style requests the routing table and
//! cache storage care about: method, URL, mode, destination, and a
//! status/headers/body response.

use crate::error::{SwCacheError, SwCacheResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How the request was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document navigation
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// What the requester intends to do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Script,
    Style,
    Font,
    Image,
    #[default]
    Empty,
}

/// An outbound request seen by the controller
#[derive(Debug, Clone)]
pub struct Request {
    /// Upper-case HTTP method
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    /// Create a GET request for a URL
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Parse a URL string and create a GET request for it
    pub fn parse_get(url: &str) -> SwCacheResult<Self> {
        let url = Url::parse(url).map_err(|e| SwCacheError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::get(url))
    }

    /// Create a navigation request for a URL
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            destination: Destination::Document,
            ..Self::get(url)
        }
    }

    /// Override the method
    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    /// Override the destination
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Cache signature of this request
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Cache signature of a request: method plus URL without fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
        }
    }

    /// GET signature for a URL
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Whether a response came from the network or is the synthetic error response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Basic,
    Error,
}

/// A response body plus metadata, cheap to clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl Response {
    /// Create a basic response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// The generic network-error response surfaced to pages
    pub fn error() -> Self {
        Self {
            status: 0,
            headers: Vec::new(),
            body: Bytes::new(),
            kind: ResponseKind::Error,
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Status in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
