//! The batch job: collect candidates, look them up, classify, rank and publish.

use anyhow::{anyhow, bail, Context, Result};
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, info_span, Instrument};

use crate::api::{self, VideoApi, YouTubeClient};
use crate::classify::{Classifier, TopicTable};
use crate::collect::{collect_candidates, CollectParams};
use crate::config::{Config, DateTimeFormat};
use crate::details::{fetch_details, VideoDetails};
use crate::feed::{self, Feed, VideoItem};
use crate::rank::{apply_duration_cutoff, sort_by_views};
use crate::retry::RetryPolicy;

/// Candidates requested per feed slot, to make up for filtering losses.
const CANDIDATE_FACTOR: usize = 2;

const MAX_CANDIDATES: usize = 500;

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub collect: CollectParams,
    pub max_items: usize,
    pub max_duration_secs: Option<u64>,
    pub source: String,
    pub region: String,
    pub utc_offset: UtcOffset,
    pub timestamp_format: DateTimeFormat,
}

impl BuildSettings {
    pub fn new(cfg: &Config) -> Self {
        Self {
            collect: CollectParams {
                queries: cfg.queries.clone(),
                lookback: time::Duration::hours(cfg.lookback_hours.into()),
                per_query: cfg.per_query,
                target: (cfg.max_items * CANDIDATE_FACTOR).min(MAX_CANDIDATES),
                region: cfg.region.clone(),
            },
            max_items: cfg.max_items,
            max_duration_secs: cfg
                .max_duration
                .map(|d| d.as_secs())
                .filter(|&secs| secs > 0),
            source: cfg.source.clone(),
            region: cfg.region.clone(),
            utc_offset: cfg.utc_offset.into_inner(),
            timestamp_format: cfg.timestamp_format.clone(),
        }
    }
}

/// Turns looked-up videos into ranked feed items. Videos without a view count or a title
/// are skipped.
pub fn rank_items(
    videos: Vec<VideoDetails>,
    classifier: &Classifier,
    max_duration_secs: Option<u64>,
    max_items: usize,
    now: OffsetDateTime,
) -> Vec<VideoItem> {
    let looked_up = videos.len();
    let videos = apply_duration_cutoff(videos, max_duration_secs);
    debug!(
        "{} of {looked_up} videos passed the duration cutoff",
        videos.len()
    );

    let mut items = videos
        .into_iter()
        .filter_map(|video| {
            let title = video.title.trim();

            if title.is_empty() {
                debug!(video_id = %video.id, "Skipping a video without a title");
                return None;
            }

            let Some(views) = video.views else {
                debug!(video_id = %video.id, "Skipping a video without a view count");
                return None;
            };

            let published_ago_sec = video
                .published_at
                .map(|published_at| (now - published_at).whole_seconds().max(0) as u64);

            Some(VideoItem {
                url: feed::watch_url(&video.id),
                topic: classifier.classify(title, &video.channel_title).into(),
                title: title.into(),
                channel_title: video.channel_title.trim().into(),
                views: Some(views),
                published_ago_sec,
                thumbnail_url: video.thumbnail_url,
                video_id: video.id,
            })
        })
        .collect::<Vec<_>>();

    sort_by_views(&mut items, |item| item.views);
    items.truncate(max_items);

    items
}

pub async fn build_feed(
    api: &dyn VideoApi,
    settings: &BuildSettings,
    classifier: &Classifier,
    now: OffsetDateTime,
) -> Result<Feed> {
    let ids = collect_candidates(api, &settings.collect, now)
        .instrument(info_span!("collect"))
        .await?;
    let videos = fetch_details(api, &ids).await?;

    info!(
        "Classifying with topic rules version {}",
        classifier.version()
    );
    let items = rank_items(
        videos,
        classifier,
        settings.max_duration_secs,
        settings.max_items,
        now,
    );

    if items.is_empty() {
        bail!("none of the {} candidates qualified for the feed", ids.len());
    }

    let updated_at = now
        .to_offset(settings.utc_offset)
        .format(settings.timestamp_format.as_item())
        .context("could not format the build time")?;

    Ok(Feed {
        updated_at,
        source: settings.source.clone(),
        region: settings.region.clone(),
        items,
    })
}

pub async fn run(cfg: &Config, selftest: bool) -> Result<()> {
    let api_key = api::api_key_from_env(&cfg.api_key_env)?;
    let client = YouTubeClient::new(
        cfg.api_base_url.clone(),
        api_key,
        RetryPolicy::from(&cfg.retry),
        cfg.request_delay.into(),
        cfg.request_timeout.into(),
    )?;
    let classifier = Classifier::new(cfg.topics.clone().unwrap_or_else(TopicTable::builtin));
    let settings = BuildSettings::new(cfg);

    info!(
        max = settings.max_items,
        hours = cfg.lookback_hours,
        per_query = settings.collect.per_query,
        target = settings.collect.target,
        "Building the feed"
    );

    let feed = build_feed(&client, &settings, &classifier, OffsetDateTime::now_utc()).await?;
    feed::write(&feed, &cfg.output).await?;

    if selftest {
        self_test(cfg).await?;
    }

    Ok(())
}

/// Reads the published feed back and prints its top item.
async fn self_test(cfg: &Config) -> Result<()> {
    let feed = feed::load(&cfg.output).await.context("self-test failed")?;
    let Some(top) = feed.items.first() else {
        bail!("self-test failed: the written feed has no items");
    };

    let sample = serde_json::to_string_pretty(top)
        .with_context(|| anyhow!("could not print the sample item"))?;
    println!("self-test ok: {} items, updated {}", feed.items.len(), feed.updated_at);
    println!("{sample}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::api::fake::{video, FakeApi};

    fn settings(max_items: usize) -> BuildSettings {
        let mut cfg = Config::default();
        cfg.queries = vec!["cats".into(), "music".into()];
        cfg.max_items = max_items;

        BuildSettings::new(&cfg)
    }

    const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

    #[tokio::test]
    async fn builds_a_ranked_feed() {
        let api = FakeApi::default()
            .with_page(Some("cats"), &["c1", "c2", "long"])
            .with_page(Some("music"), &["c2", "m1", "noviews", "gone"])
            .with_video(video("c1", "Cat jumps", Some(100), "PT20S"))
            .with_video(video("c2", "Cat sleeps", Some(500), "PT59S"))
            .with_video(video("long", "Cat documentary", Some(9000), "PT10M"))
            .with_video(video("m1", "Piano cover", Some(300), "PT1M"))
            .with_video(video("noviews", "Hidden counts", None, "PT5S"));

        let feed = build_feed(&api, &settings(50), &Classifier::default(), NOW)
            .await
            .unwrap();
        let ids: Vec<_> = feed.items.iter().map(|i| i.video_id.as_str()).collect();

        assert_eq!(ids, vec!["c2", "m1", "c1"]);
        assert_eq!(feed.items[0].topic, "animals");
        assert_eq!(feed.items[1].topic, "music");
        assert_eq!(feed.items[0].url, "https://www.youtube.com/shorts/c2");
        assert_eq!(feed.items[0].published_ago_sec, Some(12 * 3600));
        assert_eq!(feed.updated_at, "2026-10-19 21:00:00 +09:00");
        assert_eq!(feed.source, "youtube");
        assert_eq!(feed.region, "JP");

        let doc = serde_json::to_value(&feed).unwrap();
        assert!(feed::validate(&doc).is_ok());
    }

    #[tokio::test]
    async fn truncates_to_the_maximum() {
        let mut api = FakeApi::default().with_page(Some("cats"), &["a", "b", "c", "d"]);

        for (id, views) in [("a", 1), ("b", 4), ("c", 3), ("d", 2)] {
            api = api.with_video(video(id, id, Some(views), "PT30S"));
        }

        let feed = build_feed(&api, &settings(2), &Classifier::default(), NOW)
            .await
            .unwrap();
        let ids: Vec<_> = feed.items.iter().map(|i| i.video_id.as_str()).collect();

        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn an_empty_result_is_fatal() {
        let api = FakeApi::default()
            .with_page(Some("cats"), &["long"])
            .with_video(video("long", "Cat documentary", Some(9000), "PT10M"));

        assert!(build_feed(&api, &settings(5), &Classifier::default(), NOW)
            .await
            .is_err());
    }

    #[test]
    fn future_publish_times_count_as_just_now() {
        let mut v = VideoDetails::from(video("x", "x", Some(1), "PT1S"));
        v.published_at = Some(NOW + time::Duration::minutes(5));

        let items = rank_items(vec![v], &Classifier::default(), None, 10, NOW);

        assert_eq!(items[0].published_ago_sec, Some(0));
    }

    #[test]
    fn candidate_target_has_headroom() {
        assert_eq!(settings(50).collect.target, 100);
        assert_eq!(settings(200).collect.target, 200 * CANDIDATE_FACTOR);
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let mut cfg = Config::default();
        cfg.api_key_env = "SHORTSRANK_TEST_NO_SUCH_KEY".into();
        cfg.api_base_url = url::Url::parse("http://127.0.0.1:9/").unwrap();

        let err = run(&cfg, false).await.unwrap_err();

        assert!(err.to_string().contains("SHORTSRANK_TEST_NO_SUCH_KEY"));
    }
}
