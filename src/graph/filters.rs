use std::collections::BTreeSet;

use crate::api::types::{ListKind, SortMode};
use crate::graph::key::{KeyExtra, effective_search};

/// Tag filter, sort and search for one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    tags: BTreeSet<String>,
    sort: SortMode,
    search: String,
}

impl ListFilters {
    /// Add `tag` if absent, remove it if present. Returns whether the tag is
    /// active afterwards.
    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        if self.tags.remove(tag) {
            false
        } else {
            self.tags.insert(tag.to_owned());
            true
        }
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_owned();
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    /// Raw search text as typed.
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn effective_search(&self) -> Option<&str> {
        effective_search(&self.search)
    }

    pub fn key_extra(&self) -> KeyExtra {
        KeyExtra::default()
            .with_sort(self.sort)
            .with_tags(self.tags.iter().cloned())
            .with_search(&self.search)
    }
}

#[derive(Debug, Default)]
pub struct FilterState {
    followers: ListFilters,
    following: ListFilters,
}

impl FilterState {
    pub fn get(&self, list: ListKind) -> &ListFilters {
        match list {
            ListKind::Followers => &self.followers,
            ListKind::Following => &self.following,
        }
    }

    pub fn get_mut(&mut self, list: ListKind) -> &mut ListFilters {
        match list {
            ListKind::Followers => &mut self.followers,
            ListKind::Following => &mut self.following,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(toggles: &[&str]) -> Vec<String> {
        let mut filters = ListFilters::default();
        for tag in toggles {
            filters.toggle_tag(tag);
        }
        filters.tags().map(str::to_owned).collect()
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut filters = ListFilters::default();
        assert!(filters.toggle_tag("irl"));
        assert!(!filters.toggle_tag("irl"));
        assert_eq!(filters.tags().count(), 0);
    }

    #[test]
    fn toggle_order_does_not_matter() {
        let toggles = ["irl", "bff", "irl", "top8", "degen", "bff", "irl"];
        let expected = apply(&toggles);
        assert_eq!(expected, vec!["degen", "irl", "top8"]);

        let mut reversed = toggles;
        reversed.reverse();
        assert_eq!(apply(&reversed), expected);

        let mut rotated = toggles;
        rotated.rotate_left(3);
        assert_eq!(apply(&rotated), expected);
    }

    #[test]
    fn key_extra_reflects_every_field() {
        let mut filters = ListFilters::default();
        let initial = filters.key_extra();

        filters.set_search("al");
        assert_eq!(filters.key_extra(), initial);

        filters.set_search("ali");
        assert_ne!(filters.key_extra(), initial);
        assert_eq!(filters.effective_search(), Some("ali"));

        filters.set_search("");
        filters.set_sort(SortMode::EarliestFirst);
        assert_ne!(filters.key_extra(), initial);

        filters.set_sort(SortMode::FollowerCount);
        assert_eq!(filters.key_extra(), initial);
    }

    #[test]
    fn lists_are_independent() {
        let mut state = FilterState::default();
        state.get_mut(ListKind::Following).toggle_tag("top8");
        assert_eq!(state.get(ListKind::Followers).tags().count(), 0);
        assert_eq!(state.get(ListKind::Following).tags().collect::<Vec<_>>(), vec!["top8"]);
    }
}
