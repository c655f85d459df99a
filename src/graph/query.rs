//! Keyed cache cell for entities that resolve to a single value.

use std::collections::HashMap;

use crate::api::ApiClientError;
use crate::event::ApiResult;
use crate::graph::key::{CacheKey, EntityKind};

/// Cached keys kept per query, the active one included.
pub const MAX_SLOTS: usize = 32;

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    error: Option<std::sync::Arc<ApiClientError>>,
    in_flight: bool,
    last_used: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            in_flight: false,
            last_used: 0,
        }
    }
}

/// What consumers see for the active key.
#[derive(Debug)]
pub struct QueryView<'a, T> {
    pub data: Option<&'a T>,
    /// No value yet and a fetch is running, or the key itself is still
    /// waiting on another entity.
    pub is_loading: bool,
    /// A value is shown while a newer one is being fetched.
    pub is_refetching: bool,
    pub error: Option<&'a ApiClientError>,
}

#[derive(Debug)]
pub struct Query<T> {
    kind: EntityKind,
    active: Option<CacheKey>,
    slots: HashMap<CacheKey, Slot<T>>,
    waiting: bool,
    clock: u64,
}

impl<T> Query<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            active: None,
            slots: HashMap::new(),
            waiting: false,
            clock: 0,
        }
    }

    pub fn active_key(&self) -> Option<&CacheKey> {
        self.active.as_ref()
    }

    pub fn is_active(&self, key: &CacheKey) -> bool {
        self.active.as_ref() == Some(key)
    }

    /// Point the query at `key`, reusing whatever is cached under it.
    pub fn set_key(&mut self, key: CacheKey) {
        if self.active.as_ref() == Some(&key) {
            return;
        }
        tracing::debug!(entity = %self.kind, %key, cached = self.slots.contains_key(&key), "key changed");
        self.waiting = false;
        self.clock += 1;
        self.slots
            .retain(|cached, slot| slot.in_flight || !cached.superseded_by(&key));
        self.slots.entry(key.clone()).or_default().last_used = self.clock;
        self.active = Some(key);
        self.evict_over_capacity();
    }

    /// Stop pointing at any key; the view reads as empty until the next
    /// `set_key`.
    pub fn detach(&mut self) {
        self.active = None;
        self.waiting = false;
    }

    /// Like [`detach`](Self::detach), but the view reports loading because
    /// the next key depends on data still being fetched.
    pub fn wait(&mut self) {
        self.active = None;
        self.waiting = true;
    }

    /// True when the active key has never produced a value or an error and
    /// nothing is fetching it.
    pub fn wants_fetch(&self) -> bool {
        self.active_slot()
            .is_some_and(|slot| slot.value.is_none() && slot.error.is_none() && !slot.in_flight)
    }

    /// Claim the active key for a fetch. Returns `None` when a fetch for it
    /// is already running.
    pub fn begin(&mut self) -> Option<CacheKey> {
        let key = self.active.clone()?;
        let slot = self.slots.entry(key.clone()).or_default();
        if slot.in_flight {
            tracing::trace!(entity = %self.kind, %key, "fetch already in flight");
            return None;
        }
        slot.in_flight = true;
        Some(key)
    }

    /// Store a completed fetch. A failure keeps the previous value.
    pub fn resolve(&mut self, key: &CacheKey, result: ApiResult<T>) {
        let Some(slot) = self.slots.get_mut(key) else {
            tracing::trace!(entity = %self.kind, %key, "dropping result for evicted key");
            return;
        };
        slot.in_flight = false;
        match result {
            Ok(value) => {
                slot.value = Some(value);
                slot.error = None;
            }
            Err(e) => {
                tracing::warn!(entity = %self.kind, %key, error = %e, "fetch failed");
                slot.error = Some(e);
            }
        }
    }

    pub fn view(&self) -> QueryView<'_, T> {
        match self.active_slot() {
            Some(slot) => QueryView {
                data: slot.value.as_ref(),
                is_loading: slot.in_flight && slot.value.is_none(),
                is_refetching: slot.in_flight && slot.value.is_some(),
                error: slot.error.as_deref(),
            },
            None => QueryView {
                data: None,
                is_loading: self.waiting,
                is_refetching: false,
                error: None,
            },
        }
    }

    fn active_slot(&self) -> Option<&Slot<T>> {
        self.active.as_ref().and_then(|key| self.slots.get(key))
    }

    /// Drop least recently selected keys beyond [`MAX_SLOTS`]. The active
    /// key and keys with a fetch in flight are never dropped.
    fn evict_over_capacity(&mut self) {
        while self.slots.len() > MAX_SLOTS {
            let oldest = self
                .slots
                .iter()
                .filter(|(key, slot)| !slot.in_flight && self.active.as_ref() != Some(*key))
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone());
            let Some(oldest) = oldest else {
                break;
            };
            tracing::trace!(entity = %self.kind, key = %oldest, "evicting cached key");
            self.slots.remove(&oldest);
        }
    }
}
