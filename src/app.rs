use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ApiClientError;
use crate::api::types::{ListEntry, ListKind, ProfileDetails, RoleTuple, Stats, TagCounts};
use crate::cart::{Cart, CartItem};
use crate::command::{self, Command};
use crate::graph::SocialGraph;
use crate::graph::aggregates::TopEightEntry;
use crate::graph::identity::{Identity, IdentitySource};
use crate::graph::pagination::ListView;
use crate::graph::query::QueryView;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Status<'a, T: Serialize> {
    pub data: Option<&'a T>,
    pub is_loading: bool,
    pub is_refetching: bool,
    pub error: Option<String>,
}

impl<'a, T: Serialize> From<QueryView<'a, T>> for Status<'a, T> {
    fn from(view: QueryView<'a, T>) -> Self {
        Self {
            data: view.data,
            is_loading: view.is_loading,
            is_refetching: view.is_refetching,
            error: view.error.map(ApiClientError::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListStatus<'a> {
    pub tags: Vec<&'a str>,
    pub sort: &'static str,
    pub search: &'a str,
    pub entries: &'a [ListEntry],
    pub is_loading: bool,
    pub loading_more: bool,
    pub end_of_list: bool,
    pub error: Option<String>,
}

impl<'a> ListStatus<'a> {
    fn new(graph: &'a SocialGraph, list: ListKind) -> Self {
        let filters = graph.filters(list);
        let ListView {
            entries,
            is_loading,
            loading_more,
            end_of_list,
            error,
        } = graph.list(list);
        Self {
            tags: filters.tags().collect(),
            sort: filters.sort().query_value(),
            search: filters.search(),
            entries,
            is_loading,
            loading_more,
            end_of_list,
            error: error.map(ApiClientError::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartStatus<'a> {
    pub owner: Option<&'a str>,
    pub items: &'a [CartItem],
}

/// Everything a consumer can read from the engine, in one JSON document.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub identity: Option<&'a str>,
    pub profile: Status<'a, Option<ProfileDetails>>,
    pub stats: Status<'a, Option<Stats>>,
    pub follower_tags: Status<'a, TagCounts>,
    pub following_tags: Status<'a, TagCounts>,
    pub followers: ListStatus<'a>,
    pub following: ListStatus<'a>,
    pub top_eight: Vec<TopEightEntry>,
    pub roles: Status<'a, RoleTuple>,
    pub recent_tags: &'a [String],
    pub cart: CartStatus<'a>,
}

impl<'a> Snapshot<'a> {
    pub fn of(graph: &'a SocialGraph) -> Self {
        let cart: &Cart = graph.cart();
        Self {
            identity: graph.identity().map(Identity::as_str),
            profile: graph.profile().into(),
            stats: graph.stats().into(),
            follower_tags: graph.tags(ListKind::Followers).into(),
            following_tags: graph.tags(ListKind::Following).into(),
            followers: ListStatus::new(graph, ListKind::Followers),
            following: ListStatus::new(graph, ListKind::Following),
            top_eight: graph.top_eight_entries(),
            roles: graph.roles().into(),
            recent_tags: graph.recent_tags(),
            cart: CartStatus {
                owner: cart.owner(),
                items: cart.items(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Line-oriented session: one command per stdin line, one JSON snapshot
/// per command on stdout once the engine has settled.
pub struct App {
    pub running: bool,
    pub graph: SocialGraph,
    identity: IdentitySource,
}

impl App {
    pub fn new(mut graph: SocialGraph, initial: Option<Identity>) -> Self {
        let identity = IdentitySource::new(initial);
        graph.attach_identity_source(identity.subscribe());
        Self {
            running: true,
            graph,
            identity,
        }
    }

    // -- Main loop ----------------------------------------------------------

    pub async fn run(mut self) -> color_eyre::Result<()> {
        self.graph.settle().await?;
        self.print_snapshot()?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while self.running {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match command::parse_command(&line) {
                Some(cmd) => self.execute(cmd).await?,
                None => eprintln!("unknown command: {} (try `help`)", line.trim()),
            }
        }

        if let Err(e) = self.graph.cart().save() {
            tracing::warn!(error = %e, "failed to save cart");
        }
        Ok(())
    }

    pub async fn execute(&mut self, cmd: Command) -> color_eyre::Result<()> {
        match cmd {
            Command::Connect(name) => match Identity::parse(&name) {
                Ok(identity) => self.publish(Some(identity)).await?,
                Err(e) => {
                    eprintln!("{e}");
                    return Ok(());
                }
            },
            Command::Disconnect => self.publish(None).await?,
            Command::ToggleTag { list, tag } => {
                self.graph.toggle_tag(list, &tag);
            }
            Command::SetTags { list, tags } => self.graph.set_tags_filter(list, tags),
            Command::Sort { list, sort } => self.graph.set_sort(list, sort),
            Command::Search { list, text } => self.graph.set_search(list, &text),
            Command::More(list) => {
                if !self.graph.load_more(list) {
                    eprintln!("nothing more to load for {}", list.as_str());
                }
            }
            Command::Fresh(scope) => self.graph.force_fresh(scope),
            Command::ClearFresh(scope) => self.graph.clear_fresh(scope),
            Command::Refetch(entity) => self.graph.refetch(entity),
            Command::Recent(tag) => {
                if let Some(tag) = tag {
                    self.graph.add_recent_tag(&tag);
                }
                println!("{}", serde_json::to_string(self.graph.recent_tags())?);
                return Ok(());
            }
            Command::Stage(item) => {
                self.graph.cart_mut().add(item);
            }
            Command::Unstage(item) => {
                self.graph.cart_mut().remove(&item);
            }
            Command::Show => {}
            Command::Help => {
                println!("{}", command::HELP);
                return Ok(());
            }
            Command::Quit => {
                self.running = false;
                return Ok(());
            }
        }

        self.graph.settle().await?;
        self.print_snapshot()
    }

    /// Push an identity through the source and apply the resulting change.
    async fn publish(&mut self, next: Option<Identity>) -> color_eyre::Result<()> {
        if self.identity.current() == next {
            return Ok(());
        }
        match next {
            Some(identity) => self.identity.connect(identity),
            None => self.identity.disconnect(),
        }
        // Fetch results may be queued ahead of the identity change.
        while self.graph.identity() != self.identity.current().as_ref() {
            let event = self.graph.next_event().await?;
            self.graph.handle_event(event);
        }
        Ok(())
    }

    fn print_snapshot(&self) -> color_eyre::Result<()> {
        println!("{}", serde_json::to_string(&Snapshot::of(&self.graph))?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::mock::MockService;
    use crate::cart::ListOp;
    use crate::graph::{EngineContext, GraphConfig};

    const ALICE: &str = "0x983110309620d911731ac0932219af06091b6744";
    const BOB: &str = "0x225f137127d9067788314bc7fcc1f36746a3c3b5";

    fn app(service: &Arc<MockService>) -> App {
        let graph = SocialGraph::new(
            EngineContext {
                service: service.clone(),
                config: GraphConfig::default(),
            },
            Cart::in_memory(),
        );
        App::new(graph, None)
    }

    #[tokio::test]
    async fn connect_and_disconnect_go_through_the_identity_source() {
        let service = Arc::new(MockService::default());
        service.with_list_of(3);
        let mut app = app(&service);

        app.execute(Command::Connect(ALICE.into())).await.unwrap();
        assert_eq!(app.graph.identity().map(Identity::as_str), Some(ALICE));
        assert_eq!(app.graph.list(ListKind::Following).entries.len(), 3);

        // Reconnecting the same identity is a no-op.
        let calls = service.calls().len();
        app.execute(Command::Connect(ALICE.into())).await.unwrap();
        assert_eq!(service.calls().len(), calls);

        app.execute(Command::Disconnect).await.unwrap();
        assert_eq!(app.graph.identity(), None);
        assert!(app.graph.list(ListKind::Following).entries.is_empty());
    }

    #[tokio::test]
    async fn staged_items_are_dropped_when_identity_changes() {
        let service = Arc::new(MockService::default());
        let mut app = app(&service);
        app.execute(Command::Connect(ALICE.into())).await.unwrap();

        let item = CartItem::new(BOB, ListOp::Follow);
        app.execute(Command::Stage(item.clone())).await.unwrap();
        assert_eq!(app.graph.cart().items(), [item.clone()]);
        assert_eq!(app.graph.cart().owner(), Some(ALICE));

        app.execute(Command::Connect(BOB.into())).await.unwrap();
        assert!(app.graph.cart().items().is_empty());
        assert_eq!(app.graph.cart().owner(), Some(BOB));
    }

    #[tokio::test]
    async fn quit_stops_the_loop() {
        let service = Arc::new(MockService::default());
        let mut app = app(&service);
        app.execute(Command::Quit).await.unwrap();
        assert!(!app.running);
    }

    #[test]
    fn snapshot_serializes_defaults() {
        let service = Arc::new(MockService::default());
        let app = app(&service);
        let json = serde_json::to_value(Snapshot::of(&app.graph)).unwrap();

        assert!(json["identity"].is_null());
        assert_eq!(json["followers"]["end_of_list"], true);
        assert_eq!(json["following"]["sort"], "followers");
        assert_eq!(json["roles"]["data"]["isOwner"], true);
        assert_eq!(json["recent_tags"][0], "irl");
    }
}
