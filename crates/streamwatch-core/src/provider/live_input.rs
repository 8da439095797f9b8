use async_trait::async_trait;
use serde::Deserialize;

use super::{PollResult, StatusProvider, get_json};

const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com";

/// Polls the Cloudflare Stream live input API for the input's connection state.
pub struct LiveInputProvider {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl LiveInputProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<&str>,
        account_id: &str,
        input_id: &str,
        token: String,
    ) -> Self {
        let base = base_url.unwrap_or(DEFAULT_API_BASE_URL).trim_end_matches('/');
        Self {
            http,
            url: format!("{base}/client/v4/accounts/{account_id}/stream/live_inputs/{input_id}"),
            token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct LiveInputResponse {
    #[serde(default)]
    result: Option<LiveInputResult>,
}

#[derive(Debug, Deserialize)]
struct LiveInputResult {
    #[serde(default)]
    status: Option<LiveInputStatus>,
}

/// `status` is either a bare state string or `{"current": {"state": ...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LiveInputStatus {
    State(String),
    Detailed {
        #[serde(default)]
        current: Option<StatusCurrent>,
    },
}

#[derive(Debug, Deserialize)]
struct StatusCurrent {
    #[serde(default)]
    state: Option<String>,
}

impl LiveInputStatus {
    fn state(&self) -> Option<&str> {
        match self {
            Self::State(state) => Some(state),
            Self::Detailed { current } => current.as_ref()?.state.as_deref(),
        }
    }
}

fn is_live_state(state: &str) -> bool {
    matches!(state.to_ascii_lowercase().as_str(), "connected" | "active")
}

#[async_trait]
impl StatusProvider for LiveInputProvider {
    async fn fetch_liveness(&self) -> PollResult {
        let payload: LiveInputResponse = get_json(&self.http, &self.url, &self.token).await?;
        let live = payload
            .result
            .and_then(|result| result.status)
            .as_ref()
            .and_then(LiveInputStatus::state)
            .is_some_and(is_live_state);
        Ok(live)
    }
}
