pub mod follows;
pub mod lists;
pub mod types;
pub mod users;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Response;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::api::types::{ListKind, Page, PageRequest, ProfileDetails, RoleTuple, Stats, TagCounts};
use crate::graph::identity::Identity;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },
    #[error("API error (status {status}): {detail}")]
    ApiError { status: u16, detail: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("list is stored on chain {chain_id}, which is not configured")]
    UnsupportedChain { chain_id: u64 },
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

// ---------------------------------------------------------------------------
// Service contract
// ---------------------------------------------------------------------------

/// Backend operations the graph engine depends on.
///
/// The HTTP client below is the production implementation; tests plug in a
/// scripted one.
#[async_trait]
pub trait GraphService: Send + Sync {
    async fn fetch_profile(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<ProfileDetails>, ApiClientError>;

    async fn fetch_stats(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<Stats>, ApiClientError>;

    async fn fetch_tags(
        &self,
        list: ListKind,
        identity: &Identity,
        fresh: bool,
    ) -> Result<TagCounts, ApiClientError>;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ApiClientError>;

    async fn fetch_roles(
        &self,
        list: &str,
        chains: &[u64],
        identity: &Identity,
    ) -> Result<RoleTuple, ApiClientError>;
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

pub struct EfpApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl EfpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Build a full API URL from a path and query pairs.
    pub(crate) fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiClientError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Issue a GET request and deserialize the body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiClientError> {
        tracing::debug!(%url, "GET");
        let resp = self.http_client.get(url).send().await?;
        self.handle_response(resp).await
    }

    /// Like [`get`](Self::get), but a 404 yields `None`.
    pub(crate) async fn get_optional<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Option<T>, ApiClientError> {
        match self.get(url).await {
            Ok(value) => Ok(Some(value)),
            Err(ApiClientError::ApiError { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check status, map rate limiting, and deserialize the body.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: Response,
    ) -> Result<T, ApiClientError> {
        let reset_at = resp
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        let status = resp.status();

        if status.as_u16() == 429 {
            let reset = reset_at.unwrap_or_else(Utc::now);
            return Err(ApiClientError::RateLimited { reset_at: reset });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiClientError::ApiError {
                status: status.as_u16(),
                detail: body,
            });
        }

        let body = resp.text().await?;
        serde_json::from_str::<T>(&body)
            .map_err(|e| ApiClientError::Deserialize(format!("{e}: {body}")))
    }
}

/// `cache=fresh` asks the backend to skip its own cache.
pub(crate) fn fresh_param(fresh: bool) -> Vec<(&'static str, String)> {
    if fresh {
        vec![("cache", "fresh".to_owned())]
    } else {
        Vec::new()
    }
}

#[async_trait]
impl GraphService for EfpApiClient {
    async fn fetch_profile(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<ProfileDetails>, ApiClientError> {
        self.get_profile_details(identity, fresh).await
    }

    async fn fetch_stats(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<Stats>, ApiClientError> {
        self.get_stats(identity, fresh).await
    }

    async fn fetch_tags(
        &self,
        list: ListKind,
        identity: &Identity,
        fresh: bool,
    ) -> Result<TagCounts, ApiClientError> {
        self.get_tags(list, identity, fresh).await
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ApiClientError> {
        self.get_page(request).await
    }

    async fn fetch_roles(
        &self,
        list: &str,
        chains: &[u64],
        identity: &Identity,
    ) -> Result<RoleTuple, ApiClientError> {
        let details = self.get_list_details(list).await?;
        crate::graph::roles::roles_from_details(&details, chains, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_appends_query_pairs() {
        let client = EfpApiClient::new("https://api.example.xyz/api/v1/");
        let url = client
            .url(
                "/users/0xabc/following",
                &[("limit", "12".into()), ("tags", "irl,top8".into())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.xyz/api/v1/users/0xabc/following?limit=12&tags=irl%2Ctop8"
        );
    }

    #[test]
    fn url_without_query_has_no_question_mark() {
        let client = EfpApiClient::new("https://api.example.xyz/api/v1");
        let url = client.url("/users/0xabc/stats", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.xyz/api/v1/users/0xabc/stats");
    }

    #[test]
    fn fresh_param_only_when_requested() {
        assert!(fresh_param(false).is_empty());
        assert_eq!(fresh_param(true), vec![("cache", "fresh".to_owned())]);
    }
}
