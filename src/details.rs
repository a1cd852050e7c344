use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::api::{Thumbnail, VideoApi, VideoResource};
use crate::iso_duration;

/// The platform's bulk-lookup limit.
pub const BATCH_SIZE: usize = 50;

/// Thumbnail variants, best first.
const THUMBNAIL_PREFERENCE: &[&str] = &["maxres", "standard", "high", "medium", "default"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub channel_title: String,
    pub views: Option<u64>,
    pub published_at: Option<OffsetDateTime>,
    /// `None` when the duration is missing or not in `PT#H#M#S` form.
    pub duration_secs: Option<u64>,
    pub thumbnail_url: Option<String>,
}

impl From<VideoResource> for VideoDetails {
    fn from(video: VideoResource) -> Self {
        let snippet = video.snippet.unwrap_or_default();

        let published_at = snippet.published_at.as_deref().and_then(|s| {
            OffsetDateTime::parse(s, &Rfc3339)
                .inspect_err(|e| {
                    warn!(video_id = %video.id, "Unparseable publish time `{s}`: {e}")
                })
                .ok()
        });
        let duration_secs = video
            .content_details
            .and_then(|details| details.duration)
            .and_then(|d| iso_duration::parse_seconds(&d));
        let views = video
            .statistics
            .and_then(|stats| stats.view_count)
            .and_then(|count| count.trim().parse().ok());

        Self {
            thumbnail_url: best_thumbnail(&snippet.thumbnails),
            id: video.id,
            title: snippet.title.unwrap_or_default(),
            channel_title: snippet.channel_title.unwrap_or_default(),
            views,
            published_at,
            duration_secs,
        }
    }
}

pub fn best_thumbnail(thumbnails: &HashMap<String, Thumbnail>) -> Option<String> {
    THUMBNAIL_PREFERENCE
        .iter()
        .filter_map(|variant| thumbnails.get(*variant))
        .map(|thumbnail| thumbnail.url.trim())
        .find(|url| !url.is_empty())
        .map(Into::into)
}

/// Looks up every ID in batches of [`BATCH_SIZE`]. Deleted or private videos are simply
/// missing from the result.
#[instrument(level = "INFO", skip_all, fields(id_count = ids.len()))]
pub async fn fetch_details(api: &dyn VideoApi, ids: &[String]) -> Result<Vec<VideoDetails>> {
    let mut details = Vec::with_capacity(ids.len());

    for (idx, batch) in ids.chunks(BATCH_SIZE).enumerate() {
        let videos = api
            .videos(batch)
            .await
            .with_context(|| anyhow!("could not look up video batch #{}", idx + 1))?;
        debug!(
            "Batch #{}: {} of {} videos found",
            idx + 1,
            videos.len(),
            batch.len()
        );

        details.extend(videos.into_iter().map(VideoDetails::from));
    }

    if details.len() < ids.len() {
        info!(
            "{} videos are no longer available",
            ids.len() - details.len()
        );
    }

    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{video, FakeApi};
    use crate::api::{ContentDetails, Snippet};

    fn thumbs(variants: &[&str]) -> HashMap<String, Thumbnail> {
        variants
            .iter()
            .map(|v| {
                (
                    v.to_string(),
                    Thumbnail {
                        url: format!("https://img/{v}.jpg"),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn picks_the_best_thumbnail() {
        assert_eq!(
            best_thumbnail(&thumbs(&["default", "high", "medium"])).as_deref(),
            Some("https://img/high.jpg")
        );
        assert_eq!(
            best_thumbnail(&thumbs(&["default", "maxres"])).as_deref(),
            Some("https://img/maxres.jpg")
        );
        assert_eq!(best_thumbnail(&thumbs(&["weird"])), None);
        assert_eq!(best_thumbnail(&HashMap::new()), None);
    }

    #[test]
    fn converts_resources() {
        let d = VideoDetails::from(video("v1", "Cat", Some(1200), "PT59S"));

        assert_eq!(d.id, "v1");
        assert_eq!(d.title, "Cat");
        assert_eq!(d.channel_title, "Cat channel");
        assert_eq!(d.views, Some(1200));
        assert_eq!(d.duration_secs, Some(59));
        assert!(d.published_at.is_some());
        assert_eq!(d.thumbnail_url.as_deref(), Some("https://i.ytimg.com/vi/v1/hqdefault.jpg"));
    }

    #[test]
    fn tolerates_sparse_resources() {
        let d = VideoDetails::from(VideoResource {
            id: "v2".into(),
            snippet: Some(Snippet {
                published_at: Some("yesterday".into()),
                ..Default::default()
            }),
            content_details: Some(ContentDetails {
                duration: Some("P1D".into()),
            }),
            statistics: None,
        });

        assert_eq!(d.title, "");
        assert_eq!(d.views, None);
        assert_eq!(d.published_at, None);
        assert_eq!(d.duration_secs, None);
        assert_eq!(d.thumbnail_url, None);
    }

    #[tokio::test]
    async fn fetches_in_batches_and_drops_missing_videos() {
        let ids: Vec<String> = (0..120).map(|i| format!("v{i}")).collect();
        let mut api = FakeApi::default();

        for id in ids.iter().filter(|id| id.as_str() != "v7") {
            api = api.with_video(video(id, "t", Some(1), "PT10S"));
        }

        let details = fetch_details(&api, &ids).await.unwrap();
        let lookups = api.lookups.lock().unwrap();

        assert_eq!(details.len(), 119);
        assert!(details.iter().all(|d| d.id != "v7"));
        assert_eq!(
            lookups.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![50, 50, 20]
        );
    }
}
