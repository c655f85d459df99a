//! Views computed from data the engine has already fetched.

use serde::Serialize;

use crate::api::types::{EnsProfile, ListEntry, ListKind, PageRequest, SortMode, TagCounts};
use crate::graph::identity::Identity;
use crate::graph::key::KeyExtra;

pub const RECENT_TAGS_LIMIT: usize = 5;

/// Tags that never show up as suggestions.
pub const BLOCKED_MUTED_TAGS: [&str; 2] = ["block", "mute"];

/// Bounded most-recently-used tag list, newest first, no duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTags {
    tags: Vec<String>,
}

impl RecentTags {
    pub fn new<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut recent = Self { tags: Vec::new() };
        recent.prepend(seed.into_iter().map(Into::into).collect());
        recent
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    /// Move `tag` to the front.
    pub fn add(&mut self, tag: &str) {
        self.prepend(vec![tag.to_owned()]);
    }

    /// Fold in a freshly fetched following-tags aggregate: most used first,
    /// block/mute excluded, ahead of what was already there.
    pub fn merge_counts(&mut self, counts: &TagCounts) {
        if counts.tag_counts.is_empty() {
            return;
        }
        let mut ranked: Vec<_> = counts.tag_counts.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        let applied = ranked
            .into_iter()
            .map(|tc| tc.tag.clone())
            .filter(|tag| !BLOCKED_MUTED_TAGS.contains(&tag.as_str()))
            .collect();
        self.prepend(applied);
    }

    fn prepend(&mut self, front: Vec<String>) {
        let mut merged: Vec<String> = Vec::with_capacity(RECENT_TAGS_LIMIT);
        for tag in front.into_iter().chain(self.tags.drain(..)) {
            if merged.len() == RECENT_TAGS_LIMIT {
                break;
            }
            if !merged.contains(&tag) {
                merged.push(tag);
            }
        }
        self.tags = merged;
    }
}

// ---------------------------------------------------------------------------
// Top eight
// ---------------------------------------------------------------------------

/// Fixed parameters of the top-N query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopEightSpec {
    pub tag: String,
    pub limit: u32,
}

impl TopEightSpec {
    pub const SORT: SortMode = SortMode::LatestFirst;

    pub fn key_extra(&self) -> KeyExtra {
        KeyExtra::default()
            .with_sort(Self::SORT)
            .with_tags([self.tag.clone()])
    }

    pub fn request(&self, identity: Identity, fresh: bool) -> PageRequest {
        PageRequest {
            list: ListKind::Following,
            identity,
            limit: self.limit,
            sort: Self::SORT,
            tags: vec![self.tag.clone()],
            search: None,
            cursor: 0,
            fresh,
        }
    }

    /// Keep at most `limit` entries, first occurrence of an address wins.
    pub fn cap(&self, entries: Vec<ListEntry>) -> Vec<ListEntry> {
        let mut seen = std::collections::HashSet::new();
        entries
            .into_iter()
            .filter(|entry| seen.insert(entry.dedup_key()))
            .take(self.limit as usize)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEightEntry {
    pub address: String,
    pub ens: Option<EnsProfile>,
}

impl From<&ListEntry> for TopEightEntry {
    fn from(entry: &ListEntry) -> Self {
        Self {
            address: entry.address.clone(),
            ens: entry.ens.clone(),
        }
    }
}
