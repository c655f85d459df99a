use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, eyre};
use serde::Serialize;

use crate::api::EfpApiClient;
use crate::api::types::{ListKind, SortMode};
use crate::cart::Cart;
use crate::config::{AppConfig, load_config};
use crate::graph::identity::Identity;
use crate::graph::query::QueryView;
use crate::graph::{EngineContext, SocialGraph};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "followgraph", about = "Query the onchain social graph")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Interactive session reading commands from stdin (default)
    Session {
        /// Identity to connect at start
        #[arg(long)]
        address: Option<String>,
    },
    /// Profile details (JSONL)
    Profile { identity: String },
    /// Follower and following counts (JSONL)
    Stats { identity: String },
    /// Accounts following the identity (JSONL, one entry per line)
    Followers(ListArgs),
    /// Accounts the identity follows (JSONL, one entry per line)
    Following(ListArgs),
    /// The identity's top-N tagged accounts (JSONL)
    #[command(name = "top-eight")]
    TopEight { identity: String },
    /// Tag usage on one side of the graph (JSONL)
    Tags {
        identity: String,
        /// followers or following
        #[arg(long, default_value = "following", value_parser = parse_list)]
        list: ListKind,
    },
    /// The viewer's roles over a profile's primary list (JSONL)
    Roles { identity: String },
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    pub identity: String,
    /// Only entries carrying this tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// followers, latest or earliest
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortMode>,
    /// Name or address fragment, at least 3 characters
    #[arg(long)]
    pub search: Option<String>,
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pub pages: u32,
}

fn parse_sort(input: &str) -> Result<SortMode, String> {
    SortMode::parse(input).ok_or_else(|| {
        let modes: Vec<_> = SortMode::ALL.iter().map(|m| m.query_value()).collect();
        format!("unknown sort mode: {input} (expected one of {})", modes.join(", "))
    })
}

fn parse_list(input: &str) -> Result<ListKind, String> {
    ListKind::parse(input).ok_or_else(|| format!("unknown list: {input}"))
}

// ---------------------------------------------------------------------------
// Engine construction (shared with main.rs session path)
// ---------------------------------------------------------------------------

pub fn build_graph(config: &AppConfig, cart: Cart) -> SocialGraph {
    let client = EfpApiClient::new(config.api_url.clone());
    tracing::info!(api_url = %config.api_url, "backend client initialized");
    let context = EngineContext {
        service: Arc::new(client),
        config: config.graph_config(),
    };
    SocialGraph::new(context, cart)
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_line<T: Serialize + ?Sized>(value: &T) -> eyre::Result<()> {
    let line = serde_json::to_string(value)?;
    println!("{line}");
    Ok(())
}

/// Print the resolved value, or turn the entity's error into the command's.
fn print_view<T: Serialize>(view: QueryView<'_, T>) -> eyre::Result<()> {
    if let Some(e) = view.error {
        return Err(eyre!("{e}"));
    }
    print_line(&view.data)
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

async fn connect(graph: &mut SocialGraph, identity: &str) -> eyre::Result<()> {
    let identity = Identity::parse(crate::command::strip_at(identity))?;
    graph.set_identity(Some(identity));
    graph.settle().await
}

async fn run_list(graph: &mut SocialGraph, list: ListKind, args: ListArgs) -> eyre::Result<()> {
    if !args.tags.is_empty() {
        graph.set_tags_filter(list, args.tags.iter().map(|t| t.trim()));
    }
    if let Some(sort) = args.sort {
        graph.set_sort(list, sort);
    }
    if let Some(search) = &args.search {
        graph.set_search(list, search);
    }
    connect(graph, &args.identity).await?;

    for _ in 1..args.pages {
        if !graph.load_more(list) {
            break;
        }
        graph.settle().await?;
    }

    let view = graph.list(list);
    if let Some(e) = view.error {
        return Err(eyre!("{e}"));
    }
    for entry in view.entries {
        print_line(entry)?;
    }
    Ok(())
}

pub async fn run_command(cmd: CliCommand) -> eyre::Result<()> {
    let config = load_config();
    let mut graph = build_graph(&config, Cart::in_memory());

    match cmd {
        CliCommand::Session { .. } => unreachable!("session is handled in main"),

        CliCommand::Profile { identity } => {
            connect(&mut graph, &identity).await?;
            print_view(graph.profile())?;
        }

        CliCommand::Stats { identity } => {
            connect(&mut graph, &identity).await?;
            print_view(graph.stats())?;
        }

        CliCommand::Followers(args) => run_list(&mut graph, ListKind::Followers, args).await?,
        CliCommand::Following(args) => run_list(&mut graph, ListKind::Following, args).await?,

        CliCommand::TopEight { identity } => {
            connect(&mut graph, &identity).await?;
            if let Some(e) = graph.top_eight().error {
                return Err(eyre!("{e}"));
            }
            for entry in graph.top_eight_entries() {
                print_line(&entry)?;
            }
        }

        CliCommand::Tags { identity, list } => {
            connect(&mut graph, &identity).await?;
            print_view(graph.tags(list))?;
        }

        CliCommand::Roles { identity } => {
            connect(&mut graph, &identity).await?;
            print_view(graph.roles())?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sort_accepts_short_names() {
        assert_eq!(parse_sort("latest").unwrap(), SortMode::LatestFirst);
        assert_eq!(parse_sort("followers").unwrap(), SortMode::FollowerCount);
        let err = parse_sort("random").unwrap_err();
        assert_eq!(
            err,
            "unknown sort mode: random (expected one of followers, latest, earliest)"
        );
    }

    #[test]
    fn parse_list_rejects_unknown() {
        assert_eq!(parse_list("followers").unwrap(), ListKind::Followers);
        assert!(parse_list("friends").is_err());
    }

    #[test]
    fn following_flags() {
        let cli = Cli::try_parse_from([
            "followgraph",
            "following",
            "vitalik.eth",
            "--tag",
            "IRL",
            "--tag",
            "bff",
            "--sort",
            "earliest",
            "--pages",
            "3",
        ])
        .unwrap();
        let Some(CliCommand::Following(args)) = cli.command else {
            panic!("expected following subcommand");
        };
        assert_eq!(args.identity, "vitalik.eth");
        assert_eq!(args.tags, vec!["IRL", "bff"]);
        assert_eq!(args.sort, Some(SortMode::EarliestFirst));
        assert_eq!(args.pages, 3);
        assert!(args.search.is_none());
    }

    #[test]
    fn no_subcommand_means_session() {
        let cli = Cli::try_parse_from(["followgraph"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["followgraph", "tags", "alice.eth", "--list", "followers"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(CliCommand::Tags {
                list: ListKind::Followers,
                ..
            })
        ));
    }
}
