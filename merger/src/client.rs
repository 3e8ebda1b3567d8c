use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use suggest_core::Suggestion;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

/// Retries per request on top of the initial attempt.
const RETRY_MAX: u32 = 10;
const RETRY_WAIT_MIN: Duration = Duration::from_millis(10);
const RETRY_WAIT_MAX: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One shard's reply: the index version it serves and the parsed body.
#[derive(Debug)]
pub struct ShardAnswer {
    pub version: u64,
    pub payload: ShardPayload,
}

/// Body of a shard reply. Shards answer either the plain suggestions
/// wrapper or the paginated shape; the absent fields default to zero.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ShardPayload {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub page_number: usize,
    #[serde(default)]
    pub total_pages_count: usize,
    #[serde(default)]
    pub total_items_count: usize,
}

/// Http client for querying the suggest shards.
#[derive(Debug, Clone)]
pub struct SuggestClient {
    http: reqwest::Client,
}

impl SuggestClient {
    pub fn new() -> Result<SuggestClient> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("cannot build the http client")?;
        Ok(SuggestClient { http })
    }

    pub async fn get_suggest(&self, url: &Url) -> Result<ShardAnswer> {
        let response = self.get_with_retries(url).await?;
        let version = suggest_version(response.headers());
        let payload = response
            .json::<ShardPayload>()
            .await
            .with_context(|| format!("cannot parse the answer of {url}"))?;
        Ok(ShardAnswer { version, payload })
    }

    /// Sends the request, retrying transport errors and retryable
    /// statuses with an exponential backoff starting at 10 ms.
    async fn get_with_retries(&self, url: &Url) -> Result<reqwest::Response> {
        let mut wait = RETRY_WAIT_MIN;
        for attempt in 0..=RETRY_MAX {
            if attempt > 0 {
                sleep(wait).await;
                wait = (wait * 2).min(RETRY_WAIT_MAX);
            }
            match self.http.get(url.clone()).send().await {
                Ok(response) if retryable_status(response.status()) => {
                    debug!(%url, status = %response.status(), attempt, "retrying the shard request");
                }
                Ok(response) => return Ok(response),
                Err(error) => {
                    if attempt == RETRY_MAX {
                        return Err(error).with_context(|| format!("cannot reach {url}"));
                    }
                    debug!(%url, attempt, "retrying the shard request after a transport error");
                }
            }
        }
        bail!("{url} kept answering retryable errors after {} attempts", RETRY_MAX + 1)
    }
}

/// Too many requests and server errors are worth retrying, except 501
/// which no repeat attempt can fix.
fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

/// Reads the index version reported by a shard; missing or malformed
/// headers count as version 0.
fn suggest_version(headers: &HeaderMap) -> u64 {
    headers
        .get("Suggest-Version")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}
