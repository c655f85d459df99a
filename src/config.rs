use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::graph::GraphConfig;
use crate::graph::aggregates::TopEightSpec;

pub const API_URL_ENV: &str = "FOLLOWGRAPH_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    #[serde(default = "default_top_eight_limit")]
    pub top_eight_limit: u32,
    #[serde(default = "default_top_eight_tag")]
    pub top_eight_tag: String,
    #[serde(default = "default_chain_id")]
    pub default_chain_id: u64,
    #[serde(default = "default_list_records_contract")]
    pub list_records_contract: String,
    #[serde(default = "default_chains")]
    pub chains: Vec<u64>,
    #[serde(default = "default_recent_tags")]
    pub recent_tags: Vec<String>,
    #[serde(default)]
    pub cart_path: Option<PathBuf>,
}

fn default_api_url() -> String {
    "https://api.ethfollow.xyz/api/v1".to_owned()
}

fn default_fetch_limit() -> u32 {
    12
}

fn default_top_eight_limit() -> u32 {
    100
}

fn default_top_eight_tag() -> String {
    "top8".to_owned()
}

fn default_chain_id() -> u64 {
    8453
}

fn default_list_records_contract() -> String {
    "0x41Aa48Ef3c0446b46a5b1cc6337FF3d3716E2A33".to_owned()
}

fn default_chains() -> Vec<u64> {
    vec![1, 10, 8453]
}

fn default_recent_tags() -> Vec<String> {
    ["irl", "bff", "based", "degen", "top8"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            fetch_limit: default_fetch_limit(),
            top_eight_limit: default_top_eight_limit(),
            top_eight_tag: default_top_eight_tag(),
            default_chain_id: default_chain_id(),
            list_records_contract: default_list_records_contract(),
            chains: default_chains(),
            recent_tags: default_recent_tags(),
            cart_path: None,
        }
    }
}

impl AppConfig {
    /// The engine's view of the configuration.
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            fetch_limit: self.fetch_limit.max(1),
            top_eight: TopEightSpec {
                tag: self.top_eight_tag.clone(),
                limit: self.top_eight_limit.max(1),
            },
            default_chain_id: self.default_chain_id,
            list_records_contract: self.list_records_contract.clone(),
            chains: self.chains.clone(),
            recent_tags: self.recent_tags.clone(),
        }
    }

    /// Where the working set lives: the configured path, else
    /// `~/.config/followgraph/cart.json`.
    pub fn cart_path(&self) -> Option<PathBuf> {
        self.cart_path.clone().or_else(crate::cart::Cart::default_path)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.is_empty()
        {
            tracing::debug!(%url, "backend url overridden from environment");
            self.api_url = url;
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/followgraph"))
}

fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Return candidate .env paths in priority order.
fn env_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = config_dir() {
        paths.push(dir.join(".env"));
    }
    paths.push(PathBuf::from(".env"));
    paths
}

/// Load .env files. Earlier files win because dotenvy never overwrites
/// variables that are already set.
pub fn load_env_files() {
    for path in env_file_paths() {
        if path.exists()
            && let Err(e) = dotenvy::from_path(&path)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to load .env file");
        }
    }
}

fn parse_config(contents: &str) -> AppConfig {
    toml::from_str(contents).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid config file, using defaults");
        AppConfig::default()
    })
}

pub fn load_config() -> AppConfig {
    load_env_files();

    let mut config = config_path()
        .and_then(|path| fs::read_to_string(path).ok())
        .map(|contents| parse_config(&contents))
        .unwrap_or_default();
    config.apply_env();
    config
}
