//! swcache - Versioned offline caching layer
//!
//! Keeps a web application usable offline by routing its requests through
//! generation-scoped cache namespaces with network-first, cache-first and
//! stale-while-revalidate strategies.

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod generation;
pub mod http;
pub mod namespace;
pub mod registration;
pub mod routing;
pub mod storage;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{SwCacheError, SwCacheResult};
