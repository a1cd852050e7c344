//! The video platform API as seen by the builder.
//!
//! [`VideoApi`] is the seam between the pipeline and the network: the real
//! implementation is [`YouTubeClient`], tests substitute an in-memory one.

mod youtube;

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

pub use self::youtube::{api_key_from_env, YouTubeClient};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("request failed: {0}")]
    Request(reqwest::Error),

    #[error("the API returned HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("could not decode the API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether the same request is worth repeating.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // the URL carries the API key
        Self::Request(e.without_url())
    }
}

/// One search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// `None` searches without keywords.
    pub q: Option<String>,
    /// RFC 3339 timestamp.
    pub published_after: String,
    pub max_results: u32,
    pub region: String,
}

#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Returns video IDs ordered by view count, most viewed first.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, ApiError>;

    /// Looks up at most one batch of IDs. Unknown IDs are absent from the result.
    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoResource>, ApiError>;
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<Snippet>,
    #[serde(default)]
    pub content_details: Option<ContentDetails>,
    #[serde(default)]
    pub statistics: Option<Statistics>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ContentDetails {
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// A decimal string on the wire.
    #[serde(default)]
    pub view_count: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SearchResult {
    pub id: SearchResultId,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResultId {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoResource>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Serves canned search pages and video resources.
    #[derive(Default)]
    pub struct FakeApi {
        pub pages: HashMap<Option<String>, Vec<String>>,
        pub videos: HashMap<String, VideoResource>,
        pub failing_query: Option<String>,
        pub searches: Mutex<Vec<SearchQuery>>,
        pub lookups: Mutex<Vec<Vec<String>>>,
    }

    impl FakeApi {
        pub fn with_page(mut self, q: Option<&str>, ids: &[&str]) -> Self {
            self.pages.insert(
                q.map(Into::into),
                ids.iter().map(|id| id.to_string()).collect(),
            );
            self
        }

        pub fn with_video(mut self, video: VideoResource) -> Self {
            self.videos.insert(video.id.clone(), video);
            self
        }

        pub fn searched(&self) -> Vec<Option<String>> {
            self.searches
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.q.clone())
                .collect()
        }
    }

    #[async_trait]
    impl VideoApi for FakeApi {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, ApiError> {
            self.searches.lock().unwrap().push(query.clone());

            if query.q.is_some() && query.q == self.failing_query {
                return Err(ApiError::Status {
                    status: StatusCode::FORBIDDEN,
                    message: "quota exceeded".into(),
                });
            }

            let mut ids = self.pages.get(&query.q).cloned().unwrap_or_default();
            ids.truncate(query.max_results as usize);

            Ok(ids)
        }

        async fn videos(&self, ids: &[String]) -> Result<Vec<VideoResource>, ApiError> {
            self.lookups.lock().unwrap().push(ids.to_vec());

            Ok(ids
                .iter()
                .filter_map(|id| self.videos.get(id).cloned())
                .collect())
        }
    }

    pub fn video(id: &str, title: &str, views: Option<u64>, duration: &str) -> VideoResource {
        VideoResource {
            id: id.into(),
            snippet: Some(Snippet {
                published_at: Some("2026-10-19T00:00:00Z".into()),
                title: Some(title.into()),
                channel_title: Some(format!("{title} channel")),
                thumbnails: [(
                    "high".to_string(),
                    Thumbnail {
                        url: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
                    },
                )]
                .into(),
            }),
            content_details: Some(ContentDetails {
                duration: Some(duration.into()),
            }),
            statistics: Some(Statistics {
                view_count: views.map(|v| v.to_string()),
            }),
        }
    }
}
