use async_trait::async_trait;
use serde::Deserialize;

use super::{PollResult, StatusProvider, get_json};

/// Polls `https://customer-{code}.cloudflarestream.com/{input}/lifecycle`.
pub struct LifecycleProvider {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl LifecycleProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<&str>,
        customer_code: &str,
        input_id: &str,
        token: String,
    ) -> Self {
        let base = base_url.map_or_else(
            || format!("https://customer-{customer_code}.cloudflarestream.com"),
            |url| url.trim_end_matches('/').to_string(),
        );
        Self {
            http,
            url: format!("{base}/{input_id}/lifecycle"),
            token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct LifecycleResponse {
    #[serde(default)]
    live: Option<bool>,
}

#[async_trait]
impl StatusProvider for LifecycleProvider {
    async fn fetch_liveness(&self) -> PollResult {
        let payload: LifecycleResponse = get_json(&self.http, &self.url, &self.token).await?;
        // A missing flag means "not live", not an error.
        Ok(payload.live.unwrap_or(false))
    }
}
