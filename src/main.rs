pub mod api;
pub mod app;
pub mod cart;
pub mod cli;
pub mod command;
pub mod config;
pub mod event;
pub mod graph;

use app::App;
use cart::Cart;
use clap::Parser;
use cli::{Cli, CliCommand};
use config::load_config;
use graph::identity::Identity;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so stdout stays clean JSONL.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => run_session(None).await,
        Some(CliCommand::Session { address }) => run_session(address).await,
        // All other subcommands → non-interactive JSONL output.
        Some(cmd) => cli::run_command(cmd).await,
    }
}

/// Run the interactive session with the persisted working set.
async fn run_session(address: Option<String>) -> color_eyre::Result<()> {
    let config = load_config();

    let initial = address
        .as_deref()
        .map(|a| Identity::parse(command::strip_at(a)))
        .transpose()?;

    let cart = match config.cart_path() {
        Some(path) => Cart::load(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "unreadable cart, starting empty");
            eprintln!("Warning: could not read {}: {e}", path.display());
            Cart::in_memory()
        }),
        None => Cart::in_memory(),
    };

    let graph = cli::build_graph(&config, cart);
    App::new(graph, initial).run().await
}
