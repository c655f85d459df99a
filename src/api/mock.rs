//! Scripted in-memory backend used by engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::types::{
    ListEntry, ListKind, Page, PageRequest, ProfileDetails, RoleTuple, Stats, TagCount, TagCounts,
};
use crate::api::{ApiClientError, GraphService};
use crate::graph::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Profile { identity: Identity, fresh: bool },
    Stats { identity: Identity, fresh: bool },
    Tags { list: ListKind, fresh: bool },
    Page(PageRequest),
    Roles { list: String, chains: Vec<u64> },
}

type PageFn = Box<dyn Fn(&PageRequest) -> Vec<ListEntry> + Send + Sync>;

#[derive(Default)]
struct Script {
    profiles: HashMap<Identity, ProfileDetails>,
    stats: HashMap<Identity, Stats>,
    tags: HashMap<ListKind, Vec<TagCount>>,
    pages: Option<PageFn>,
    roles: Option<RoleTuple>,
    failures: HashMap<&'static str, String>,
}

#[derive(Default)]
pub struct MockService {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl MockService {
    pub fn with_profile(&self, identity: &Identity, primary_list: Option<&str>) {
        let profile = ProfileDetails {
            address: identity.to_string(),
            ens: Default::default(),
            primary_list: primary_list.map(str::to_owned),
            ranks: None,
        };
        self.script().profiles.insert(identity.clone(), profile);
    }

    pub fn with_stats(&self, identity: &Identity, followers: u64, following: u64) {
        self.script().stats.insert(
            identity.clone(),
            Stats {
                followers_count: followers,
                following_count: following,
            },
        );
    }

    pub fn with_tags(&self, list: ListKind, counts: &[(&str, u64)]) {
        let counts = counts
            .iter()
            .map(|(tag, count)| TagCount {
                tag: (*tag).to_owned(),
                count: *count,
            })
            .collect();
        self.script().tags.insert(list, counts);
    }

    /// Serve `total` synthetic entries per list, `request.limit` at a time.
    pub fn with_list_of(&self, total: u64) {
        self.with_pages(move |request| {
            (request.cursor..total.min(request.cursor + u64::from(request.limit)))
                .map(|i| ListEntry::new(&format!("0x{:040x}", i + 1), &[]))
                .collect()
        });
    }

    pub fn with_pages<F>(&self, pages: F)
    where
        F: Fn(&PageRequest) -> Vec<ListEntry> + Send + Sync + 'static,
    {
        self.script().pages = Some(Box::new(pages));
    }

    pub fn with_roles(&self, roles: RoleTuple) {
        self.script().roles = Some(roles);
    }

    pub fn fail_roles(&self, detail: &str) {
        self.script().failures.insert("roles", detail.to_owned());
    }

    pub fn fail_stats(&self, detail: &str) {
        self.script().failures.insert("stats", detail.to_owned());
    }

    pub fn fail_pages(&self, detail: &str) {
        self.script().failures.insert("pages", detail.to_owned());
    }

    pub fn heal(&self) {
        self.script().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn page_calls(&self, list: ListKind) -> Vec<PageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Page(request) if request.list == list => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn role_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Roles { .. }))
            .count()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(&self, what: &str) -> Result<(), ApiClientError> {
        match self.script().failures.get(what) {
            Some(detail) => Err(ApiClientError::ApiError {
                status: 503,
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GraphService for MockService {
    async fn fetch_profile(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<ProfileDetails>, ApiClientError> {
        self.record(Call::Profile {
            identity: identity.clone(),
            fresh,
        });
        self.failure("profile")?;
        Ok(self.script().profiles.get(identity).cloned())
    }

    async fn fetch_stats(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<Stats>, ApiClientError> {
        self.record(Call::Stats {
            identity: identity.clone(),
            fresh,
        });
        self.failure("stats")?;
        Ok(self.script().stats.get(identity).cloned())
    }

    async fn fetch_tags(
        &self,
        list: ListKind,
        identity: &Identity,
        fresh: bool,
    ) -> Result<TagCounts, ApiClientError> {
        self.record(Call::Tags { list, fresh });
        self.failure("tags")?;
        let tag_counts = self.script().tags.get(&list).cloned().unwrap_or_default();
        Ok(TagCounts {
            address: Some(identity.to_string()),
            tags: tag_counts.iter().map(|tc| tc.tag.clone()).collect(),
            tag_counts,
        })
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ApiClientError> {
        self.record(Call::Page(request.clone()));
        self.failure("pages")?;
        let entries = match &self.script().pages {
            Some(pages) => pages(request),
            None => Vec::new(),
        };
        Ok(Page {
            next_cursor: Some(request.cursor + entries.len() as u64),
            entries,
        })
    }

    async fn fetch_roles(
        &self,
        list: &str,
        chains: &[u64],
        _identity: &Identity,
    ) -> Result<RoleTuple, ApiClientError> {
        self.record(Call::Roles {
            list: list.to_owned(),
            chains: chains.to_vec(),
        });
        self.failure("roles")?;
        self.script()
            .roles
            .clone()
            .ok_or_else(|| ApiClientError::ApiError {
                status: 404,
                detail: format!("list {list} not found"),
            })
    }
}
