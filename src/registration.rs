//! Per-scope registration of controller generations
//!
//! Holds at most one waiting and one active controller plus the set of open
//! clients. A newly installed generation waits while clients controlled by
//! the previous generation are open, unless a client posts a skip-wait
//! message. Generations never share in-memory state; they only meet in the
//! cache storage.

use crate::controller::{ActivationReport, CacheController, Event, FetchEvent, Outcome};
use crate::error::{SwCacheError, SwCacheResult};
use crate::generation::GenerationTag;
use crate::http::Request;
use crate::routing::Bypass;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// What happened to a registered generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Activated straight away
    Activated(ActivationReport),
    /// Installed; waiting for clients of the previous generation to close
    Waiting,
}

/// The controller slots and clients of one scope
#[derive(Default)]
pub struct Registration {
    waiting: Option<CacheController>,
    active: Option<CacheController>,
    /// Open clients and the generation controlling each, if any
    clients: HashMap<Uuid, Option<GenerationTag>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&CacheController> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&CacheController> {
        self.waiting.as_ref()
    }

    pub fn active_generation(&self) -> Option<&GenerationTag> {
        self.active.as_ref().map(|c| c.generation())
    }

    /// Generation controlling a client
    pub fn controller_of(&self, client: Uuid) -> SwCacheResult<Option<&GenerationTag>> {
        self.clients
            .get(&client)
            .map(|g| g.as_ref())
            .ok_or(SwCacheError::UnknownClient(client))
    }

    /// Open a page; it is controlled by the active generation if there is one
    pub fn open_client(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        let generation = self.active_generation().cloned();
        debug!("Client {} opened under {:?}", id, generation);
        self.clients.insert(id, generation);
        id
    }

    /// Close a page; closing the last one lets a waiting generation activate
    pub async fn close_client(&mut self, client: Uuid) -> SwCacheResult<Option<ActivationReport>> {
        if self.clients.remove(&client).is_none() {
            return Err(SwCacheError::UnknownClient(client));
        }
        debug!("Client {} closed", client);

        if self.clients.is_empty() && self.waiting.is_some() {
            return self.activate_waiting().await.map(Some);
        }
        Ok(None)
    }

    /// Install a new generation and activate it if nothing holds it back
    ///
    /// On install failure the new controller is discarded and the active
    /// generation keeps serving.
    pub async fn register(&mut self, mut controller: CacheController) -> SwCacheResult<RegisterOutcome> {
        controller.handle(Event::Install).await?;

        if let Some(mut previous) = self.waiting.take() {
            previous.make_redundant();
        }
        self.waiting = Some(controller);

        if self.active.is_none() || self.clients.is_empty() {
            return self.activate_waiting().await.map(RegisterOutcome::Activated);
        }

        info!(
            active = ?self.active_generation().map(|g| g.to_string()),
            "New generation waiting for {} client(s)",
            self.clients.len()
        );
        Ok(RegisterOutcome::Waiting)
    }

    /// Deliver a page message to the waiting generation
    ///
    /// A skip-wait request activates it immediately.
    pub async fn post_message(&mut self, raw: &str) -> SwCacheResult<Option<ActivationReport>> {
        let Some(waiting) = self.waiting.as_mut() else {
            debug!("Message with no waiting generation ignored");
            return Ok(None);
        };

        match waiting.handle(Event::Message(raw.to_string())).await? {
            Outcome::SkipWaiting => self.activate_waiting().await.map(Some),
            _ => Ok(None),
        }
    }

    /// Promote the waiting generation and claim every open client
    pub async fn activate_waiting(&mut self) -> SwCacheResult<ActivationReport> {
        let mut next = self.waiting.take().ok_or(SwCacheError::NothingWaiting)?;

        let report = match next.handle(Event::Activate).await? {
            Outcome::Activated(report) => report,
            other => {
                return Err(SwCacheError::Internal(format!(
                    "activation returned {:?}",
                    other
                )))
            }
        };

        if let Some(mut previous) = self.active.take() {
            previous.make_redundant();
        }

        let generation = next.generation().clone();
        if report.claimed {
            for controlled in self.clients.values_mut() {
                *controlled = Some(generation.clone());
            }
        }
        self.active = Some(next);
        Ok(report)
    }

    /// Route a client's request through the active generation
    pub async fn fetch(&self, client: Uuid, request: Request) -> SwCacheResult<Outcome> {
        if !self.clients.contains_key(&client) {
            return Err(SwCacheError::UnknownClient(client));
        }
        match &self.active {
            Some(controller) => controller.respond(FetchEvent::new(request)).await,
            None => Ok(Outcome::Passthrough(Bypass::Inactive)),
        }
    }
}
