//! Incrementally loaded, de-duplicated list for one (list kind, key).
//!
//! ```text
//! Idle -> Loading -> HasPages <-> LoadingMore
//!            \           \            \
//!             `-----------`------------`--> End   (a page came back empty)
//! ```
//!
//! Any key change resets to `Idle` and bumps the epoch; responses carry the
//! ticket they were issued under and are dropped if it is no longer current.

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::ApiClientError;
use crate::api::types::{ListEntry, ListKind, Page};
use crate::event::ApiResult;
use crate::graph::key::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    Loading,
    HasPages,
    LoadingMore,
    End,
    /// The first page failed; nothing to show.
    Failed,
}

/// Identifies one page request. A response is applied only if its ticket
/// still matches the list's key, epoch and expected cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub key: CacheKey,
    pub epoch: u64,
    pub cursor: u64,
    pub fresh: bool,
}

#[derive(Debug)]
pub struct ListView<'a> {
    pub entries: &'a [ListEntry],
    pub is_loading: bool,
    pub loading_more: bool,
    pub end_of_list: bool,
    pub error: Option<&'a ApiClientError>,
}

#[derive(Debug)]
pub struct PaginatedList {
    list: ListKind,
    key: Option<CacheKey>,
    epoch: u64,
    state: PageState,
    entries: Vec<ListEntry>,
    positions: HashMap<String, usize>,
    cursor: u64,
    /// Fresh flag taken by the first page, reused for the rest of the epoch.
    fresh: bool,
    error: Option<Arc<ApiClientError>>,
}

impl PaginatedList {
    pub fn new(list: ListKind) -> Self {
        Self {
            list,
            key: None,
            epoch: 0,
            state: PageState::Idle,
            entries: Vec::new(),
            positions: HashMap::new(),
            cursor: 0,
            fresh: false,
            error: None,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Switch to `key`. A different key starts a brand-new sequence.
    pub fn set_key(&mut self, key: CacheKey) -> bool {
        if self.key.as_ref() == Some(&key) {
            return false;
        }
        tracing::debug!(list = self.list.as_str(), %key, "list key changed, resetting pages");
        self.key = Some(key);
        self.reset();
        true
    }

    /// Start over under the same key. Ignored while a request is out.
    pub fn restart(&mut self) -> bool {
        if matches!(self.state, PageState::Loading | PageState::LoadingMore) {
            return false;
        }
        self.reset();
        true
    }

    /// `Idle -> Loading`. The caller decides whether this page is fresh.
    pub fn start_first_page(&mut self, fresh: bool) -> Option<PageTicket> {
        if self.state != PageState::Idle {
            return None;
        }
        let key = self.key.clone()?;
        self.state = PageState::Loading;
        self.fresh = fresh;
        Some(self.ticket(key))
    }

    /// `HasPages -> LoadingMore`; a no-op in every other state.
    pub fn start_load_more(&mut self) -> Option<PageTicket> {
        if self.state != PageState::HasPages {
            tracing::trace!(list = self.list.as_str(), state = ?self.state, "load more ignored");
            return None;
        }
        let key = self.key.clone()?;
        self.state = PageState::LoadingMore;
        Some(self.ticket(key))
    }

    /// Apply a completed page. Returns false if the response was stale.
    pub fn apply_page(&mut self, ticket: &PageTicket, result: ApiResult<Page>) -> bool {
        let expecting = matches!(self.state, PageState::Loading | PageState::LoadingMore);
        if !expecting
            || self.key.as_ref() != Some(&ticket.key)
            || self.epoch != ticket.epoch
            || self.cursor != ticket.cursor
        {
            tracing::trace!(
                list = self.list.as_str(),
                key = %ticket.key,
                epoch = ticket.epoch,
                cursor = ticket.cursor,
                "discarding stale page"
            );
            return false;
        }

        match result {
            Ok(page) if page.entries.is_empty() => {
                tracing::debug!(list = self.list.as_str(), cursor = self.cursor, "end of list");
                self.state = PageState::End;
                self.error = None;
            }
            Ok(page) => {
                let received = page.entries.len() as u64;
                self.merge(page.entries);
                let next = page.next_cursor.unwrap_or(self.cursor + received);
                self.cursor = next.max(self.cursor + 1);
                self.state = PageState::HasPages;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(list = self.list.as_str(), cursor = self.cursor, error = %e, "page fetch failed");
                self.state = if self.entries.is_empty() {
                    PageState::Failed
                } else {
                    PageState::HasPages
                };
                self.error = Some(e);
            }
        }
        true
    }

    pub fn view(&self) -> ListView<'_> {
        ListView {
            entries: &self.entries,
            is_loading: self.state == PageState::Loading,
            loading_more: self.state == PageState::LoadingMore,
            end_of_list: self.state == PageState::End,
            error: self.error.as_deref(),
        }
    }

    fn ticket(&self, key: CacheKey) -> PageTicket {
        PageTicket {
            key,
            epoch: self.epoch,
            cursor: self.cursor,
            fresh: self.fresh,
        }
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.state = PageState::Idle;
        self.entries.clear();
        self.positions.clear();
        self.cursor = 0;
        self.fresh = false;
        self.error = None;
    }

    /// Append in fetch order; a repeated address keeps its first position
    /// and takes the newest data.
    fn merge(&mut self, entries: Vec<ListEntry>) {
        for entry in entries {
            let dedup_key = entry.dedup_key();
            match self.positions.get(&dedup_key) {
                Some(&index) => self.entries[index] = entry,
                None => {
                    self.positions.insert(dedup_key, self.entries.len());
                    self.entries.push(entry);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::api::types::SortMode;
    use crate::graph::identity::Identity;
    use crate::graph::key::{EntityKind, KeyExtra, key};

    fn list_key(sort: SortMode) -> CacheKey {
        key(
            EntityKind::Following,
            Some(&Identity::parse("alice.eth").unwrap()),
            KeyExtra::default().with_sort(sort),
        )
    }

    fn page(addresses: &[&str]) -> ApiResult<Page> {
        Ok(Page {
            entries: addresses.iter().map(|a| ListEntry::new(a, &[])).collect(),
            next_cursor: None,
        })
    }

    fn loaded(addresses: &[&str]) -> PaginatedList {
        let mut list = PaginatedList::new(ListKind::Following);
        list.set_key(list_key(SortMode::FollowerCount));
        let ticket = list.start_first_page(false).unwrap();
        assert!(list.apply_page(&ticket, page(addresses)));
        list
    }

    #[test]
    fn first_page_moves_to_has_pages() {
        let list = loaded(&["0x01", "0x02"]);
        assert_eq!(list.state(), PageState::HasPages);
        assert_eq!(list.cursor(), 2);
        assert_eq!(list.view().entries.len(), 2);
    }

    #[test]
    fn only_one_load_more_at_a_time() {
        let mut list = loaded(&["0x01"]);
        let ticket = list.start_load_more().unwrap();
        assert!(list.start_load_more().is_none());
        assert!(list.view().loading_more);

        assert!(list.apply_page(&ticket, page(&["0x02"])));
        assert!(list.start_load_more().is_some());
    }

    #[test]
    fn empty_page_ends_the_list() {
        let mut list = loaded(&["0x01"]);
        let ticket = list.start_load_more().unwrap();
        assert!(list.apply_page(&ticket, page(&[])));

        assert!(list.view().end_of_list);
        assert!(list.start_load_more().is_none());
        assert!(list.view().end_of_list);
        assert_eq!(list.view().entries.len(), 1);
    }

    #[test]
    fn overlapping_pages_stay_unique_and_last_tags_win() {
        let mut list = loaded(&["0xAA", "0xbb"]);
        let ticket = list.start_load_more().unwrap();
        let overlapping = Ok(Page {
            entries: vec![ListEntry::new("0xaa", &["irl"]), ListEntry::new("0xcc", &[])],
            next_cursor: None,
        });
        assert!(list.apply_page(&ticket, overlapping));

        let entries = list.view().entries;
        let unique: HashSet<_> = entries.iter().map(ListEntry::dedup_key).collect();
        assert_eq!(unique.len(), entries.len());
        assert_eq!(
            entries.iter().map(|e| e.address.as_str()).collect::<Vec<_>>(),
            vec!["0xaa", "0xbb", "0xcc"]
        );
        assert_eq!(entries[0].tags, vec!["irl"]);
    }

    #[test]
    fn key_change_resets_cursor_and_entries() {
        let mut list = loaded(&["0x01", "0x02"]);
        assert!(list.set_key(list_key(SortMode::LatestFirst)));

        assert_eq!(list.state(), PageState::Idle);
        assert_eq!(list.cursor(), 0);
        assert!(list.view().entries.is_empty());
        assert!(!list.set_key(list_key(SortMode::LatestFirst)));
    }

    #[test]
    fn response_for_abandoned_key_is_discarded() {
        let mut list = loaded(&["0x01"]);
        let stale = list.start_load_more().unwrap();

        list.set_key(list_key(SortMode::LatestFirst));
        let current = list.start_first_page(false).unwrap();

        assert!(!list.apply_page(&stale, page(&["0xold"])));
        assert!(list.view().entries.is_empty());
        assert!(list.view().is_loading);

        assert!(list.apply_page(&current, page(&["0xnew"])));
        assert_eq!(list.view().entries[0].address, "0xnew");
    }

    #[test]
    fn returning_to_a_key_does_not_accept_old_epoch() {
        let mut list = PaginatedList::new(ListKind::Following);
        list.set_key(list_key(SortMode::FollowerCount));
        let first = list.start_first_page(false).unwrap();

        list.set_key(list_key(SortMode::LatestFirst));
        list.set_key(list_key(SortMode::FollowerCount));
        let second = list.start_first_page(false).unwrap();

        assert!(!list.apply_page(&first, page(&["0xold"])));
        assert!(list.apply_page(&second, page(&["0xnew"])));
        assert_eq!(list.view().entries.len(), 1);
    }

    #[test]
    fn failed_first_page_is_scoped_error() {
        let mut list = PaginatedList::new(ListKind::Followers);
        list.set_key(list_key(SortMode::FollowerCount));
        let ticket = list.start_first_page(false).unwrap();
        let err = Err(Arc::new(ApiClientError::ApiError {
            status: 502,
            detail: "bad gateway".into(),
        }));

        assert!(list.apply_page(&ticket, err));
        assert_eq!(list.state(), PageState::Failed);
        assert!(list.view().error.is_some());
        assert!(list.start_load_more().is_none());

        assert!(list.restart());
        assert!(list.start_first_page(false).is_some());
    }

    #[test]
    fn failed_load_more_keeps_pages_and_allows_retry() {
        let mut list = loaded(&["0x01"]);
        let ticket = list.start_load_more().unwrap();
        let err = Err(Arc::new(ApiClientError::Deserialize("bad".into())));

        assert!(list.apply_page(&ticket, err));
        assert_eq!(list.state(), PageState::HasPages);
        assert_eq!(list.view().entries.len(), 1);
        assert_eq!(list.start_load_more().map(|t| t.cursor), Some(1));
    }

    #[test]
    fn fresh_flag_carries_through_the_epoch() {
        let mut list = PaginatedList::new(ListKind::Following);
        list.set_key(list_key(SortMode::FollowerCount));
        let first = list.start_first_page(true).unwrap();
        assert!(first.fresh);
        list.apply_page(&first, page(&["0x01"]));
        assert!(list.start_load_more().unwrap().fresh);
    }
}
