use color_eyre::eyre::OptionExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::api::ApiClientError;
use crate::api::types::{ListEntry, ListKind, Page, ProfileDetails, RoleTuple, Stats, TagCounts};
use crate::graph::identity::Identity;
use crate::graph::key::CacheKey;
use crate::graph::pagination::PageTicket;

/// API result type using `Arc` so errors are `Clone`.
pub type ApiResult<T> = Result<T, Arc<ApiClientError>>;

/// Everything that can wake the engine: identity changes and fetch results
/// coming back from spawned tasks. Each result carries the key it was
/// issued for.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    IdentityChanged(Option<Identity>),

    ProfileLoaded {
        key: CacheKey,
        result: ApiResult<Option<ProfileDetails>>,
    },
    StatsLoaded {
        key: CacheKey,
        result: ApiResult<Option<Stats>>,
    },
    TagsLoaded {
        list: ListKind,
        key: CacheKey,
        result: ApiResult<TagCounts>,
    },
    PageLoaded {
        list: ListKind,
        ticket: PageTicket,
        result: ApiResult<Page>,
    },
    TopEightLoaded {
        key: CacheKey,
        result: ApiResult<Vec<ListEntry>>,
    },
    RolesLoaded {
        key: CacheKey,
        result: ApiResult<RoleTuple>,
    },
}

impl EngineEvent {
    /// True for events that complete a spawned fetch.
    pub fn is_fetch_result(&self) -> bool {
        !matches!(self, EngineEvent::IdentityChanged(_))
    }
}

enum Wake {
    Event(Option<EngineEvent>),
    Identity { alive: bool },
}

/// Engine event handler.
///
/// Owns the unbounded channel that fetch tasks report back on and, when
/// attached, the watch channel carrying the viewer identity.
#[derive(Debug)]
pub struct EventHandler {
    /// Event sender channel.
    sender: mpsc::UnboundedSender<EngineEvent>,
    /// Event receiver channel.
    receiver: mpsc::UnboundedReceiver<EngineEvent>,
    identity: Option<watch::Receiver<Option<Identity>>>,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            identity: None,
        }
    }

    /// Start listening to an identity source. Returns the identity current
    /// at the time of attaching.
    pub fn attach_identity(
        &mut self,
        mut identity: watch::Receiver<Option<Identity>>,
    ) -> Option<Identity> {
        let current = identity.borrow_and_update().clone();
        self.identity = Some(identity);
        current
    }

    /// Receives the next event, waiting until one is available.
    pub async fn next(&mut self) -> color_eyre::Result<EngineEvent> {
        loop {
            let wake = match self.identity.as_mut() {
                Some(identity) => tokio::select! {
                    changed = identity.changed() => Wake::Identity { alive: changed.is_ok() },
                    event = self.receiver.recv() => Wake::Event(event),
                },
                None => Wake::Event(self.receiver.recv().await),
            };

            match wake {
                Wake::Event(event) => return event.ok_or_eyre("Failed to receive event"),
                Wake::Identity { alive: true } => {
                    let current = self
                        .identity
                        .as_mut()
                        .map(|identity| identity.borrow_and_update().clone())
                        .unwrap_or_default();
                    return Ok(EngineEvent::IdentityChanged(current));
                }
                Wake::Identity { alive: false } => {
                    tracing::debug!("identity source closed");
                    self.identity = None;
                }
            }
        }
    }

    /// Queue an event to be processed by the engine.
    pub fn send(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    /// Clone the underlying sender for use in spawned async tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.sender.clone()
    }
}
