//! Network access
//!
//! The controller never talks to the network directly; it goes through a
//! [`Fetcher`]. A failed fetch is an `Err`; an HTTP error status is still an
//! `Ok` response, matching fetch semantics.

use crate::error::{SwCacheError, SwCacheResult};
use crate::http::{Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Issues requests to the network
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response>;
}

/// Blocking `ureq` agent driven from the tokio blocking pool
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher with a global request timeout
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn fetch_blocking(agent: &ureq::Agent, request: &Request) -> SwCacheResult<Response> {
        let url = request.url.as_str();
        let network_err = |e: ureq::Error| SwCacheError::network(url, e.to_string());

        let mut response = match request.method.as_str() {
            "GET" => with_headers(agent.get(url), &request.headers).call(),
            "HEAD" => with_headers(agent.head(url), &request.headers).call(),
            "DELETE" => with_headers(agent.delete(url), &request.headers).call(),
            "POST" => with_headers(agent.post(url), &request.headers).send(&request.body[..]),
            "PUT" => with_headers(agent.put(url), &request.headers).send(&request.body[..]),
            "PATCH" => with_headers(agent.patch(url), &request.headers).send(&request.body[..]),
            other => return Err(SwCacheError::UnsupportedMethod(other.to_string())),
        }
        .map_err(network_err)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_vec().map_err(network_err)?;

        debug!("{} {} -> {}", request.method, url, status);
        Ok(Response {
            headers,
            ..Response::new(status, Bytes::from(body))
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(30)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response> {
        let agent = self.agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &request))
            .await
            .map_err(|e| SwCacheError::Internal(format!("fetch task failed: {}", e)))?
    }
}

/// A fetcher for which the network is always down
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response> {
        Err(SwCacheError::network(request.url.as_str(), "offline"))
    }
}
