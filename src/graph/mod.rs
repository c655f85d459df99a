//! The social-graph query engine.
//!
//! [`SocialGraph`] owns every query's state. Commands (identity change,
//! filter edits, load more, force fresh) recompute cache keys and start
//! fetches on spawned tasks; results come back as [`EngineEvent`]s and are
//! applied by [`SocialGraph::handle_event`], so all state has one writer.

pub mod aggregates;
pub mod filters;
pub mod freshness;
pub mod identity;
pub mod key;
pub mod pagination;
pub mod query;
pub mod roles;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::api::GraphService;
use crate::api::types::{
    ListEntry, ListKind, Page, PageRequest, ProfileDetails, RoleTuple, SortMode, Stats, TagCounts,
};
use crate::cart::Cart;
use crate::event::{EngineEvent, EventHandler};
use aggregates::{RecentTags, TopEightEntry, TopEightSpec};
use filters::{FilterState, ListFilters};
use freshness::{FreshScope, Freshness};
use identity::{Identity, IdentityCoordinator, IdentityTransition};
use key::{CacheKey, EntityKind, KeyExtra, key};
use pagination::{ListView, PageState, PageTicket, PaginatedList};
use query::{Query, QueryView};
use roles::{RoleLookup, RoleResolver};

/// Tunables the engine needs from configuration.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub fetch_limit: u32,
    pub top_eight: TopEightSpec,
    pub default_chain_id: u64,
    pub list_records_contract: String,
    pub chains: Vec<u64>,
    pub recent_tags: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 12,
            top_eight: TopEightSpec {
                tag: "top8".to_owned(),
                limit: 100,
            },
            default_chain_id: 8453,
            list_records_contract: "0x41Aa48Ef3c0446b46a5b1cc6337FF3d3716E2A33".to_owned(),
            chains: vec![1, 10, 8453],
            recent_tags: ["irl", "bff", "based", "degen", "top8"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Collaborators handed to the engine at construction.
pub struct EngineContext {
    pub service: Arc<dyn GraphService>,
    pub config: GraphConfig,
}

pub struct SocialGraph {
    service: Arc<dyn GraphService>,
    config: GraphConfig,
    events: EventHandler,
    in_flight: usize,

    identity: Option<Identity>,
    coordinator: IdentityCoordinator,
    cart: Cart,

    freshness: Freshness,
    filters: FilterState,
    resolver: RoleResolver,
    recent_tags: RecentTags,

    profile: Query<Option<ProfileDetails>>,
    stats: Query<Option<Stats>>,
    follower_tags: Query<TagCounts>,
    following_tags: Query<TagCounts>,
    top_eight: Query<Vec<ListEntry>>,
    roles: Query<RoleTuple>,
    followers: PaginatedList,
    following: PaginatedList,
}

fn list_entity(list: ListKind) -> EntityKind {
    match list {
        ListKind::Followers => EntityKind::Followers,
        ListKind::Following => EntityKind::Following,
    }
}

fn tags_entity(list: ListKind) -> EntityKind {
    match list {
        ListKind::Followers => EntityKind::FollowerTags,
        ListKind::Following => EntityKind::FollowingTags,
    }
}

impl SocialGraph {
    /// Build an engine with no viewer. Queries for the empty identity
    /// resolve immediately to their defaults.
    pub fn new(context: EngineContext, cart: Cart) -> Self {
        let EngineContext { service, config } = context;
        let resolver = RoleResolver::new(
            config.default_chain_id,
            config.list_records_contract.clone(),
            config.chains.clone(),
        );
        let recent_tags = RecentTags::new(config.recent_tags.iter().cloned());

        let mut graph = Self {
            service,
            config,
            events: EventHandler::new(),
            in_flight: 0,
            identity: None,
            coordinator: IdentityCoordinator::new(None),
            cart,
            freshness: Freshness::default(),
            filters: FilterState::default(),
            resolver,
            recent_tags,
            profile: Query::new(EntityKind::Profile),
            stats: Query::new(EntityKind::Stats),
            follower_tags: Query::new(EntityKind::FollowerTags),
            following_tags: Query::new(EntityKind::FollowingTags),
            top_eight: Query::new(EntityKind::TopEight),
            roles: Query::new(EntityKind::Roles),
            followers: PaginatedList::new(ListKind::Followers),
            following: PaginatedList::new(ListKind::Following),
        };
        graph.sync();
        graph
    }

    // -- Commands -----------------------------------------------------------

    pub fn set_identity(&mut self, identity: Option<Identity>) {
        match self.coordinator.observe(identity.as_ref(), &mut self.cart) {
            IdentityTransition::Unchanged => return,
            IdentityTransition::Changed { cart_cleared } => {
                tracing::info!(
                    identity = identity.as_ref().map_or("-", Identity::as_str),
                    cart_cleared,
                    "viewer identity changed"
                );
            }
        }
        self.identity = identity;
        self.sync();
    }

    /// Follow an identity source; its current value is applied right away
    /// and later changes arrive through [`next_event`](Self::next_event).
    pub fn attach_identity_source(&mut self, source: watch::Receiver<Option<Identity>>) {
        let current = self.events.attach_identity(source);
        self.set_identity(current);
    }

    /// Returns whether `tag` is active afterwards.
    pub fn toggle_tag(&mut self, list: ListKind, tag: &str) -> bool {
        let active = self.filters.get_mut(list).toggle_tag(tag);
        self.sync();
        active
    }

    pub fn set_tags_filter<I, S>(&mut self, list: ListKind, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.get_mut(list).set_tags(tags);
        self.sync();
    }

    pub fn set_sort(&mut self, list: ListKind, sort: SortMode) {
        self.filters.get_mut(list).set_sort(sort);
        self.sync();
    }

    pub fn set_search(&mut self, list: ListKind, text: &str) {
        self.filters.get_mut(list).set_search(text);
        self.sync();
    }

    /// Request the next page. Returns false when the command was a no-op
    /// (first page still loading, a page already in flight, or end of list).
    pub fn load_more(&mut self, list: ListKind) -> bool {
        let Some(ticket) = self.list_mut(list).start_load_more() else {
            return false;
        };
        self.dispatch_page(list, ticket);
        true
    }

    pub fn force_fresh(&mut self, scope: FreshScope) {
        self.freshness.set_fresh(scope);
        self.sync();
    }

    pub fn clear_fresh(&mut self, scope: FreshScope) {
        self.freshness.clear_fresh(scope);
    }

    pub fn is_fresh(&self, scope: FreshScope) -> bool {
        self.freshness.is_fresh(scope)
    }

    /// Fetch the entity again under its current key. Lists start over at
    /// the first page; single values stay visible until replaced.
    pub fn refetch(&mut self, entity: EntityKind) {
        match entity {
            EntityKind::Profile => self.fetch_profile(),
            EntityKind::Stats => self.fetch_stats(),
            EntityKind::FollowerTags => self.fetch_tags(ListKind::Followers),
            EntityKind::FollowingTags => self.fetch_tags(ListKind::Following),
            EntityKind::TopEight => self.fetch_top_eight(),
            EntityKind::Roles => self.fetch_roles(),
            EntityKind::Followers => self.restart_list(ListKind::Followers),
            EntityKind::Following => self.restart_list(ListKind::Following),
        }
    }

    pub fn add_recent_tag(&mut self, tag: &str) {
        self.recent_tags.add(tag);
    }

    // -- Event loop ---------------------------------------------------------

    pub async fn next_event(&mut self) -> color_eyre::Result<EngineEvent> {
        self.events.next().await
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        if event.is_fetch_result() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        match event {
            EngineEvent::IdentityChanged(identity) => {
                self.set_identity(identity);
                return;
            }
            EngineEvent::ProfileLoaded { key, result } => self.profile.resolve(&key, result),
            EngineEvent::StatsLoaded { key, result } => self.stats.resolve(&key, result),
            EngineEvent::TagsLoaded { list, key, result } => {
                if list == ListKind::Following
                    && self.following_tags.is_active(&key)
                    && let Ok(counts) = &result
                {
                    self.recent_tags.merge_counts(counts);
                }
                self.tags_query_mut(list).resolve(&key, result);
            }
            EngineEvent::PageLoaded {
                list,
                ticket,
                result,
            } => {
                self.list_mut(list).apply_page(&ticket, result);
            }
            EngineEvent::TopEightLoaded { key, result } => self.top_eight.resolve(&key, result),
            EngineEvent::RolesLoaded { key, result } => self.roles.resolve(&key, result),
        }

        // A resolved profile can unblock the role lookup.
        self.sync();
    }

    /// Process events until no fetch is outstanding.
    pub async fn settle(&mut self) -> color_eyre::Result<()> {
        while self.in_flight > 0 {
            let event = self.next_event().await?;
            self.handle_event(event);
        }
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    // -- Reads --------------------------------------------------------------

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn profile(&self) -> QueryView<'_, Option<ProfileDetails>> {
        self.profile.view()
    }

    pub fn stats(&self) -> QueryView<'_, Option<Stats>> {
        self.stats.view()
    }

    pub fn tags(&self, list: ListKind) -> QueryView<'_, TagCounts> {
        match list {
            ListKind::Followers => self.follower_tags.view(),
            ListKind::Following => self.following_tags.view(),
        }
    }

    pub fn list(&self, list: ListKind) -> ListView<'_> {
        match list {
            ListKind::Followers => self.followers.view(),
            ListKind::Following => self.following.view(),
        }
    }

    pub fn top_eight(&self) -> QueryView<'_, Vec<ListEntry>> {
        self.top_eight.view()
    }

    pub fn top_eight_entries(&self) -> Vec<TopEightEntry> {
        self.top_eight
            .view()
            .data
            .map(|entries| entries.iter().map(TopEightEntry::from).collect())
            .unwrap_or_default()
    }

    pub fn roles(&self) -> QueryView<'_, RoleTuple> {
        self.roles.view()
    }

    pub fn recent_tags(&self) -> &[String] {
        self.recent_tags.as_slice()
    }

    pub fn filters(&self, list: ListKind) -> &ListFilters {
        self.filters.get(list)
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    // -- Key recomputation --------------------------------------------------

    fn key_for(&self, kind: EntityKind, extra: KeyExtra) -> CacheKey {
        let generation = self.freshness.generation(kind);
        key(kind, self.identity.as_ref(), extra.with_generation(generation))
    }

    /// Recompute every key and start fetches for keys with nothing cached.
    fn sync(&mut self) {
        let profile_key = self.key_for(EntityKind::Profile, KeyExtra::default());
        self.profile.set_key(profile_key);
        if self.profile.wants_fetch() {
            self.fetch_profile();
        }

        let stats_key = self.key_for(EntityKind::Stats, KeyExtra::default());
        self.stats.set_key(stats_key);
        if self.stats.wants_fetch() {
            self.fetch_stats();
        }

        for list in [ListKind::Followers, ListKind::Following] {
            let tags_key = self.key_for(tags_entity(list), KeyExtra::default());
            let query = self.tags_query_mut(list);
            query.set_key(tags_key);
            if query.wants_fetch() {
                self.fetch_tags(list);
            }
        }

        let top_key = self.key_for(EntityKind::TopEight, self.config.top_eight.key_extra());
        self.top_eight.set_key(top_key);
        if self.top_eight.wants_fetch() {
            self.fetch_top_eight();
        }

        for list in [ListKind::Followers, ListKind::Following] {
            let list_key = self.key_for(list_entity(list), self.filters.get(list).key_extra());
            let pages = self.list_mut(list);
            pages.set_key(list_key);
            if pages.state() == PageState::Idle {
                self.fetch_first_page(list);
            }
        }

        self.sync_roles();
    }

    /// Roles depend on the profile's primary list, so they wait until the
    /// profile for the current key has resolved.
    fn sync_roles(&mut self) {
        let profile = self.profile.view();
        let primary_list = match (&self.identity, profile.data) {
            (None, _) => None,
            (Some(_), Some(profile)) => profile.as_ref().and_then(|p| p.primary_list.clone()),
            (Some(identity), None) => {
                // Same viewer: keep the current roles until the profile lands.
                let same_viewer = self
                    .roles
                    .active_key()
                    .is_some_and(|key| key.identity() == Some(identity));
                if same_viewer {
                    return;
                }
                if profile.error.is_some() {
                    self.roles.detach();
                } else {
                    self.roles.wait();
                }
                return;
            }
        };
        let roles_key = self.key_for(
            EntityKind::Roles,
            KeyExtra::default().with_list(primary_list.as_deref()),
        );
        self.roles.set_key(roles_key);
        if self.roles.wants_fetch() {
            self.fetch_roles();
        }
    }

    // -- Fetch dispatch -----------------------------------------------------

    fn spawn<F>(&mut self, fetch: F)
    where
        F: Future<Output = EngineEvent> + Send + 'static,
    {
        self.in_flight += 1;
        let sender = self.events.sender();
        tokio::spawn(async move {
            let _ = sender.send(fetch.await);
        });
    }

    fn fetch_profile(&mut self) {
        let Some(key) = self.profile.begin() else {
            return;
        };
        let Some(identity) = key.identity().cloned() else {
            self.profile.resolve(&key, Ok(None));
            return;
        };
        let fresh = self.freshness.take(EntityKind::Profile);
        let service = Arc::clone(&self.service);
        tracing::debug!(%key, fresh, "fetching profile");
        self.spawn(async move {
            let result = service.fetch_profile(&identity, fresh).await.map_err(Arc::new);
            EngineEvent::ProfileLoaded { key, result }
        });
    }

    fn fetch_stats(&mut self) {
        let Some(key) = self.stats.begin() else {
            return;
        };
        let Some(identity) = key.identity().cloned() else {
            self.stats.resolve(&key, Ok(None));
            return;
        };
        let fresh = self.freshness.take(EntityKind::Stats);
        let service = Arc::clone(&self.service);
        tracing::debug!(%key, fresh, "fetching stats");
        self.spawn(async move {
            let result = service.fetch_stats(&identity, fresh).await.map_err(Arc::new);
            EngineEvent::StatsLoaded { key, result }
        });
    }

    fn fetch_tags(&mut self, list: ListKind) {
        let Some(key) = self.tags_query_mut(list).begin() else {
            return;
        };
        let Some(identity) = key.identity().cloned() else {
            self.tags_query_mut(list).resolve(&key, Ok(TagCounts::default()));
            return;
        };
        let fresh = self.freshness.take(tags_entity(list));
        let service = Arc::clone(&self.service);
        tracing::debug!(%key, fresh, "fetching tags");
        self.spawn(async move {
            let result = service
                .fetch_tags(list, &identity, fresh)
                .await
                .map_err(Arc::new);
            EngineEvent::TagsLoaded { list, key, result }
        });
    }

    fn fetch_top_eight(&mut self) {
        let Some(key) = self.top_eight.begin() else {
            return;
        };
        let Some(identity) = key.identity().cloned() else {
            self.top_eight.resolve(&key, Ok(Vec::new()));
            return;
        };
        let fresh = self.freshness.take(EntityKind::TopEight);
        let spec = self.config.top_eight.clone();
        let service = Arc::clone(&self.service);
        tracing::debug!(%key, fresh, "fetching top eight");
        self.spawn(async move {
            let result = service
                .fetch_page(&spec.request(identity, fresh))
                .await
                .map(|page| spec.cap(page.entries))
                .map_err(Arc::new);
            EngineEvent::TopEightLoaded { key, result }
        });
    }

    fn fetch_roles(&mut self) {
        let Some(key) = self.roles.begin() else {
            return;
        };
        match self.resolver.plan(key.identity(), key.extra().list()) {
            RoleLookup::Default(roles) => self.roles.resolve(&key, Ok(roles)),
            RoleLookup::Lookup { list, identity } => {
                let resolver = self.resolver.clone();
                let service = Arc::clone(&self.service);
                tracing::debug!(%key, "looking up list roles");
                self.spawn(async move {
                    let result = resolver.lookup(service, &list, &identity).await;
                    EngineEvent::RolesLoaded { key, result }
                });
            }
        }
    }

    fn fetch_first_page(&mut self, list: ListKind) {
        let has_identity = self
            .list_ref(list)
            .key()
            .and_then(CacheKey::identity)
            .is_some();
        let fresh = has_identity && self.freshness.take(list_entity(list));
        if let Some(ticket) = self.list_mut(list).start_first_page(fresh) {
            self.dispatch_page(list, ticket);
        }
    }

    fn restart_list(&mut self, list: ListKind) {
        if self.list_mut(list).restart() {
            self.fetch_first_page(list);
        }
    }

    fn dispatch_page(&mut self, list: ListKind, ticket: PageTicket) {
        let Some(identity) = ticket.key.identity().cloned() else {
            self.list_mut(list).apply_page(&ticket, Ok(Page::default()));
            return;
        };
        let extra = ticket.key.extra();
        let request = PageRequest {
            list,
            identity,
            limit: self.config.fetch_limit,
            sort: extra.sort().unwrap_or_default(),
            tags: extra.tags().to_vec(),
            search: extra.search().map(str::to_owned),
            cursor: ticket.cursor,
            fresh: ticket.fresh,
        };
        let service = Arc::clone(&self.service);
        tracing::debug!(list = list.as_str(), key = %ticket.key, cursor = ticket.cursor, "fetching page");
        self.spawn(async move {
            let result = service.fetch_page(&request).await.map_err(Arc::new);
            EngineEvent::PageLoaded {
                list,
                ticket,
                result,
            }
        });
    }

    // -- Helpers ------------------------------------------------------------

    fn tags_query_mut(&mut self, list: ListKind) -> &mut Query<TagCounts> {
        match list {
            ListKind::Followers => &mut self.follower_tags,
            ListKind::Following => &mut self.following_tags,
        }
    }

    fn list_ref(&self, list: ListKind) -> &PaginatedList {
        match list {
            ListKind::Followers => &self.followers,
            ListKind::Following => &self.following,
        }
    }

    fn list_mut(&mut self, list: ListKind) -> &mut PaginatedList {
        match list {
            ListKind::Followers => &mut self.followers,
            ListKind::Following => &mut self.following,
        }
    }
}
