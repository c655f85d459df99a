//! One-shot "skip the cache" overrides.
//!
//! Setting a scope fresh bumps its generation, which every key in that scope
//! folds in, so the forced result is cached next to (not on top of) the
//! normal one. Each entity in the scope then gets exactly one fresh fetch:
//! the pending flag is taken when that fetch is dispatched.

use std::collections::{HashMap, HashSet};

use crate::graph::key::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreshScope {
    Profile,
    Stats,
}

impl FreshScope {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "profile" => Some(FreshScope::Profile),
            "stats" => Some(FreshScope::Stats),
            _ => None,
        }
    }

    /// Entities whose keys carry this scope's generation.
    pub fn dependents(self) -> impl Iterator<Item = EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(move |kind| kind.fresh_scope() == Some(self))
    }
}

#[derive(Debug, Default)]
pub struct Freshness {
    generations: HashMap<FreshScope, u64>,
    pending: HashSet<EntityKind>,
}

impl Freshness {
    pub fn set_fresh(&mut self, scope: FreshScope) {
        *self.generations.entry(scope).or_default() += 1;
        self.pending.extend(scope.dependents());
        tracing::debug!(?scope, generation = self.generations[&scope], "forcing fresh data");
    }

    /// Withdraw outstanding fresh requests without touching generations.
    pub fn clear_fresh(&mut self, scope: FreshScope) {
        self.pending.retain(|kind| kind.fresh_scope() != Some(scope));
    }

    /// True while any entity in the scope still owes a fresh fetch.
    pub fn is_fresh(&self, scope: FreshScope) -> bool {
        self.pending
            .iter()
            .any(|kind| kind.fresh_scope() == Some(scope))
    }

    pub fn generation(&self, kind: EntityKind) -> u64 {
        kind.fresh_scope()
            .and_then(|scope| self.generations.get(&scope).copied())
            .unwrap_or(0)
    }

    /// Consume the pending flag for `kind`; returns whether the fetch being
    /// dispatched should bypass backend caches.
    pub fn take(&mut self, kind: EntityKind) -> bool {
        self.pending.remove(&kind)
    }
}
