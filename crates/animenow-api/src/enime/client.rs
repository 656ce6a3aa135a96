use reqwest::Client;

use animenow_core::models::UpdatedAnimeEpisode;

use super::error::EnimeError;
use super::types::RecentResponse;

pub const DEFAULT_BASE_URL: &str = "https://api.enime.moe";

/// Enime REST API client.
pub struct EnimeClient {
    base_url: String,
    http: Client,
}

impl EnimeClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, EnimeError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(operation, %url, "Enime request");

        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(operation, status = status_code, "Enime API error");
            return Err(EnimeError::Api {
                status: status_code,
                message: body,
            });
        }

        tracing::debug!(operation, status = %status, "Enime response received");
        resp.json::<T>()
            .await
            .map_err(|e| EnimeError::Parse(e.to_string()))
    }

    /// Fetch one page of recently aired episodes, normalized into domain values.
    pub async fn recent_episodes(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<UpdatedAnimeEpisode>, EnimeError> {
        let resp: RecentResponse = self
            .get(
                "RecentEpisodes",
                "recent",
                &[("page", page.to_string()), ("perPage", per_page.to_string())],
            )
            .await?;

        Ok(resp
            .data
            .into_iter()
            .map(|item| item.into_updated_episode())
            .collect())
    }
}

impl Default for EnimeClient {
    fn default() -> Self {
        Self::new()
    }
}
