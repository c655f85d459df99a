use crate::api::types::{ListKind, ProfileDetails, Stats, TagCounts};
use crate::api::{ApiClientError, EfpApiClient, fresh_param};
use crate::graph::identity::Identity;

impl EfpApiClient {
    /// Look up profile metadata (ENS records, primary list) for an identity.
    pub async fn get_profile_details(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<ProfileDetails>, ApiClientError> {
        let url = self.url(&format!("/users/{identity}/details"), &fresh_param(fresh))?;
        self.get_optional(url).await
    }

    /// Follower and following counts.
    pub async fn get_stats(
        &self,
        identity: &Identity,
        fresh: bool,
    ) -> Result<Option<Stats>, ApiClientError> {
        let url = self.url(&format!("/users/{identity}/stats"), &fresh_param(fresh))?;
        self.get_optional(url).await
    }

    /// Tag usage on one side of the graph.
    ///
    /// `following` is what the identity applied to others, `followers` is
    /// how others tagged the identity.
    pub async fn get_tags(
        &self,
        list: ListKind,
        identity: &Identity,
        fresh: bool,
    ) -> Result<TagCounts, ApiClientError> {
        let path = match list {
            ListKind::Following => format!("/users/{identity}/tags"),
            ListKind::Followers => format!("/users/{identity}/taggedAs"),
        };
        let url = self.url(&path, &fresh_param(fresh))?;
        Ok(self.get_optional(url).await?.unwrap_or_default())
    }
}
