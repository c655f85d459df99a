use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::identity::Identity;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub address: String,
    #[serde(default)]
    pub ens: EnsProfile,
    /// Token id of the list this address marked as primary.
    #[serde(default)]
    pub primary_list: Option<String>,
    #[serde(default)]
    pub ranks: Option<ProfileRanks>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub records: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRanks {
    #[serde(default)]
    pub mutuals_rank: Option<u64>,
    #[serde(default)]
    pub followers_rank: Option<u64>,
    #[serde(default)]
    pub following_rank: Option<u64>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(deserialize_with = "count_from_any")]
    pub followers_count: u64,
    #[serde(deserialize_with = "count_from_any")]
    pub following_count: u64,
}

/// The backend reports counts either as numbers or as decimal strings.
fn count_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Tag aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Tag usage for one side of the graph. The default value doubles as the
/// null object returned when there is no identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCounts {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tag_counts: Vec<TagCount>,
}

// ---------------------------------------------------------------------------
// Followers / following
// ---------------------------------------------------------------------------

/// One row of a followers or following list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    #[serde(alias = "data")]
    pub address: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_following: Option<bool>,
    #[serde(default)]
    pub is_blocked: Option<bool>,
    #[serde(default)]
    pub is_muted: Option<bool>,
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub version: Option<u8>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ens: Option<EnsProfile>,
}

impl ListEntry {
    pub fn new(address: &str, tags: &[&str]) -> Self {
        Self {
            address: address.to_owned(),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            is_following: None,
            is_blocked: None,
            is_muted: None,
            record_type: None,
            version: None,
            updated_at: None,
            ens: None,
        }
    }

    /// Address used for de-duplication inside a merged list.
    pub fn dedup_key(&self) -> String {
        self.address.to_ascii_lowercase()
    }
}

/// One page as returned by a paginated list fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entries: Vec<ListEntry>,
    /// Offset to request next. `None` means "cursor + entries.len()".
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FollowersResponse {
    #[serde(default)]
    pub followers: Vec<ListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FollowingResponse {
    #[serde(default)]
    pub following: Vec<ListEntry>,
}

/// Sort modes understood by the list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMode {
    #[default]
    #[serde(rename = "follower count")]
    FollowerCount,
    #[serde(rename = "latest first")]
    LatestFirst,
    #[serde(rename = "earliest first")]
    EarliestFirst,
}

impl SortMode {
    pub const ALL: [SortMode; 3] = [
        SortMode::FollowerCount,
        SortMode::LatestFirst,
        SortMode::EarliestFirst,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SortMode::FollowerCount => "follower count",
            SortMode::LatestFirst => "latest first",
            SortMode::EarliestFirst => "earliest first",
        }
    }

    /// Value of the `sort` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            SortMode::FollowerCount => "followers",
            SortMode::LatestFirst => "latest",
            SortMode::EarliestFirst => "earliest",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "follower count" | "followers" | "count" => Some(SortMode::FollowerCount),
            "latest first" | "latest" => Some(SortMode::LatestFirst),
            "earliest first" | "earliest" => Some(SortMode::EarliestFirst),
            _ => None,
        }
    }
}

/// Which side of the graph a paginated list or tag aggregate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Followers,
    Following,
}

impl ListKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::Followers => "followers",
            ListKind::Following => "following",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "followers" | "follower" => Some(ListKind::Followers),
            "following" => Some(ListKind::Following),
            _ => None,
        }
    }
}

/// Everything a paginated list fetch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub list: ListKind,
    pub identity: Identity,
    pub limit: u32,
    pub sort: SortMode,
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub cursor: u64,
    pub fresh: bool,
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Storage location and role holders of a list, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDetails {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    pub list_storage_location: StorageLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub chain_id: u64,
    pub contract_address: String,
    /// Slot values are 256-bit, kept in their textual form.
    pub slot: String,
}

/// Permissions of the viewer over the active profile's primary list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTuple {
    pub is_owner: bool,
    pub is_manager: bool,
    pub is_user: bool,
    pub list_chain_id: u64,
    pub list_records_contract: String,
    pub list_slot: String,
}
