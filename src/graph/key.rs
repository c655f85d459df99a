//! Cache keys. A query's key is the only thing that decides whether cached
//! data is reused; changing any component yields a new key and therefore a
//! new fetch.

use std::fmt;

use crate::api::types::SortMode;
use crate::graph::freshness::FreshScope;
use crate::graph::identity::Identity;

/// Search text shorter than this many characters does not filter.
pub const MIN_SEARCH_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Profile,
    Stats,
    FollowerTags,
    FollowingTags,
    Followers,
    Following,
    TopEight,
    Roles,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Profile,
        EntityKind::Stats,
        EntityKind::FollowerTags,
        EntityKind::FollowingTags,
        EntityKind::Followers,
        EntityKind::Following,
        EntityKind::TopEight,
        EntityKind::Roles,
    ];

    /// The freshness flag folded into this entity's key, if any.
    ///
    /// Following data and the aggregates derived from it share the Stats
    /// flag so a forced refresh of counts also refreshes what the counts
    /// summarize.
    pub fn fresh_scope(self) -> Option<FreshScope> {
        match self {
            EntityKind::Profile => Some(FreshScope::Profile),
            EntityKind::Stats
            | EntityKind::FollowingTags
            | EntityKind::Following
            | EntityKind::TopEight => Some(FreshScope::Stats),
            EntityKind::FollowerTags | EntityKind::Followers | EntityKind::Roles => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Profile => "profile",
            EntityKind::Stats => "stats",
            EntityKind::FollowerTags => "follower-tags",
            EntityKind::FollowingTags => "following-tags",
            EntityKind::Followers => "followers",
            EntityKind::Following => "following",
            EntityKind::TopEight => "top-eight",
            EntityKind::Roles => "roles",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(input.trim()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the search text that should reach the backend, if any.
pub fn effective_search(text: &str) -> Option<&str> {
    (text.chars().count() >= MIN_SEARCH_CHARS).then_some(text)
}

/// Entity-specific key components, normalized on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyExtra {
    sort: Option<SortMode>,
    tags: Vec<String>,
    search: Option<String>,
    list: Option<String>,
    generation: u64,
}

impl KeyExtra {
    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Tags are stored sorted and de-duplicated so set order never matters.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        tags.sort();
        tags.dedup();
        self.tags = tags;
        self
    }

    pub fn with_search(mut self, text: &str) -> Self {
        self.search = effective_search(text).map(str::to_owned);
        self
    }

    pub fn with_list(mut self, list: Option<&str>) -> Self {
        self.list = list.map(str::to_owned);
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn sort(&self) -> Option<SortMode> {
        self.sort
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn list(&self) -> Option<&str> {
        self.list.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: EntityKind,
    identity: Option<Identity>,
    extra: KeyExtra,
}

impl CacheKey {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn extra(&self) -> &KeyExtra {
        &self.extra
    }

    /// True when `newer` is this same query under a later freshness
    /// generation.
    pub fn superseded_by(&self, newer: &CacheKey) -> bool {
        let same_query = KeyExtra {
            generation: newer.extra.generation(),
            ..self.extra.clone()
        } == newer.extra;
        self.kind() == newer.kind()
            && self.identity == newer.identity
            && self.extra.generation() < newer.extra.generation()
            && same_query
    }
}

pub fn key(kind: EntityKind, identity: Option<&Identity>, extra: KeyExtra) -> CacheKey {
    CacheKey {
        kind,
        identity: identity.cloned(),
        extra,
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match &self.identity {
            Some(identity) => write!(f, "/{identity}")?,
            None => f.write_str("/-")?,
        }
        if let Some(sort) = self.extra.sort {
            write!(f, "/sort={}", sort.label())?;
        }
        if !self.extra.tags.is_empty() {
            write!(f, "/tags={}", self.extra.tags.join(","))?;
        }
        if let Some(search) = &self.extra.search {
            write!(f, "/search={search}")?;
        }
        if let Some(list) = &self.extra.list {
            write!(f, "/list={list}")?;
        }
        write!(f, "/gen={}", self.extra.generation)
    }
}
