use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, instrument, trace};
use url::Url;

use crate::retry::RetryPolicy;

use super::{
    ApiError, ErrorResponse, SearchListResponse, SearchQuery, VideoApi, VideoListResponse,
    VideoResource,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The longest error body excerpt kept in an error message.
const MAX_ERROR_EXCERPT: usize = 200;

pub struct YouTubeClient {
    http: reqwest::Client,
    search_url: Url,
    videos_url: Url,
    api_key: String,
    retry: RetryPolicy,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl YouTubeClient {
    pub fn new(
        base_url: Url,
        api_key: String,
        retry: RetryPolicy,
        request_delay: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .user_agent(concat!("shortsrank/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("could not create an HTTP client")?;

        let endpoint = |name: &str| {
            base_url
                .join(name)
                .with_context(|| anyhow!("could not build the `{name}` endpoint URL"))
        };

        Ok(Self {
            http,
            search_url: endpoint("search")?,
            videos_url: endpoint("videos")?,
            api_key,
            retry,
            request_delay,
            last_request: Mutex::new(None),
        })
    }

    /// Keeps at least `request_delay` between the starts of consecutive requests.
    async fn pace(&self) {
        let mut last_request = self.last_request.lock().await;

        if let Some(last) = *last_request {
            let next = last + self.request_delay;

            if next > Instant::now() {
                trace!("Pacing for {}ms", (next - Instant::now()).as_millis());
                time::sleep_until(next).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.pace().await;

        let response = self
            .http
            .get(url.clone())
            .query(params)
            .query(&[("key", &self.api_key)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(MAX_ERROR_EXCERPT).collect());

            return Err(ApiError::Status { status, message });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.retry
            .run(|| self.get_once(url, params), ApiError::is_transient)
            .await
    }
}

#[async_trait]
impl VideoApi for YouTubeClient {
    #[instrument(level = "DEBUG", skip_all, fields(q = ?query.q))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, ApiError> {
        let mut params = vec![
            ("part", "id".to_string()),
            ("type", "video".to_string()),
            ("order", "viewCount".to_string()),
            ("videoDuration", "short".to_string()),
            ("maxResults", query.max_results.to_string()),
            ("publishedAfter", query.published_after.clone()),
            ("regionCode", query.region.clone()),
        ];

        if let Some(q) = &query.q {
            params.push(("q", q.clone()));
        }

        let response: SearchListResponse = self.get(&self.search_url, &params).await?;
        let ids = response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect::<Vec<_>>();
        debug!("Search returned {} videos", ids.len());

        Ok(ids)
    }

    #[instrument(level = "DEBUG", skip_all, fields(batch_len = ids.len()))]
    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoResource>, ApiError> {
        let params = [
            ("part", "snippet,contentDetails,statistics".to_string()),
            ("id", ids.join(",")),
            ("maxResults", ids.len().to_string()),
        ];

        let response: VideoListResponse = self.get(&self.videos_url, &params).await?;

        Ok(response.items)
    }
}

/// Reads the API key from `var`, refusing blank values.
pub fn api_key_from_env(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("the API key is missing: set the `{var}` environment variable"))
}
