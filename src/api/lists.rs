use crate::api::types::ListDetails;
use crate::api::{ApiClientError, EfpApiClient};

impl EfpApiClient {
    /// Storage location and role holders of a list token.
    pub async fn get_list_details(&self, list: &str) -> Result<ListDetails, ApiClientError> {
        let url = self.url(&format!("/lists/{list}/details"), &[])?;
        self.get(url).await
    }
}
