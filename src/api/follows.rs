use crate::api::types::{FollowersResponse, FollowingResponse, ListKind, Page, PageRequest};
use crate::api::{ApiClientError, EfpApiClient, fresh_param};

impl EfpApiClient {
    /// Fetch one page of followers or following starting at `request.cursor`.
    pub async fn get_page(&self, request: &PageRequest) -> Result<Page, ApiClientError> {
        let limit = request.limit.clamp(1, 100);
        let identity = &request.identity;

        let mut query = vec![
            ("limit", limit.to_string()),
            ("offset", request.cursor.to_string()),
            ("sort", request.sort.query_value().to_owned()),
        ];
        if !request.tags.is_empty() {
            query.push(("tags", request.tags.join(",")));
        }
        if let Some(term) = &request.search {
            query.push(("term", term.clone()));
        }
        query.extend(fresh_param(request.fresh));

        let path = format!("/users/{identity}/{}", request.list.as_str());
        let url = self.url(&path, &query)?;

        let entries = match request.list {
            ListKind::Followers => self.get::<FollowersResponse>(url).await?.followers,
            ListKind::Following => self.get::<FollowingResponse>(url).await?.following,
        };

        let next_cursor = Some(request.cursor + entries.len() as u64);
        Ok(Page {
            entries,
            next_cursor,
        })
    }
}
