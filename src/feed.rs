//! The `latest.json` document shared by the builder and the renderer.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub updated_at: String,
    pub source: String,
    pub region: String,
    pub items: Vec<VideoItem>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VideoItem {
    pub video_id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub published_ago_sec: Option<u64>,
    #[serde(default)]
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/shorts/{video_id}")
}

/// Accepts a non-negative integer; anything else reads as unknown.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        _ => None,
    })
}

/// Checks the shape of a serialized feed before it replaces the published one.
pub fn validate(doc: &Value) -> Result<()> {
    let mut problems = vec![];

    let non_empty_str = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };

    for key in ["updated_at", "source", "region"] {
        if !non_empty_str(doc, key) {
            problems.push(format!("`{key}` is missing or empty"));
        }
    }

    match doc.get("items").and_then(Value::as_array) {
        None => problems.push("`items` is not an array".into()),

        Some(items) => {
            for (idx, item) in items.iter().enumerate() {
                for key in ["video_id", "url", "title"] {
                    if !non_empty_str(item, key) {
                        problems.push(format!("items[{idx}]: `{key}` is missing or empty"));
                    }
                }

                if !item.get("views").is_some_and(Value::is_u64) {
                    problems.push(format!("items[{idx}]: `views` is not a non-negative integer"));
                }
            }
        }
    }

    if !problems.is_empty() {
        bail!("the feed is invalid: {}", problems.join("; "));
    }

    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);

    path.with_file_name(name)
}

pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

pub fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

/// Validates `feed` and atomically replaces `path` with it. The previous file is kept as
/// `<path>.bak`. Nothing on disk changes if validation fails.
pub async fn write(feed: &Feed, path: &Path) -> Result<()> {
    let doc = serde_json::to_value(feed).context("could not serialize the feed")?;
    validate(&doc)?;
    let contents = serde_json::to_string_pretty(&doc).context("could not serialize the feed")?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| anyhow!("could not create the directory `{}`", dir.display()))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, contents)
        .await
        .with_context(|| anyhow!("could not write `{}`", tmp.display()))?;

    if fs::try_exists(path).await.unwrap_or(false) {
        let bak = backup_path(path);
        fs::copy(path, &bak)
            .await
            .with_context(|| anyhow!("could not back up `{}`", path.display()))?;
        debug!("Kept the previous feed as `{}`", bak.display());
    }

    fs::rename(&tmp, path)
        .await
        .with_context(|| anyhow!("could not move the new feed into `{}`", path.display()))?;
    info!(items = feed.items.len(), "Wrote `{}`", path.display());

    Ok(())
}

pub fn parse(contents: &str) -> Result<Feed> {
    serde_json::from_str(contents).context("the feed is not a valid document")
}

pub async fn load(path: &Path) -> Result<Feed> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| anyhow!("could not read the feed `{}`", path.display()))?;

    parse(&contents).with_context(|| anyhow!("could not load the feed `{}`", path.display()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn item(id: &str, title: &str, views: Option<u64>, ago: Option<u64>) -> VideoItem {
        VideoItem {
            video_id: id.into(),
            url: watch_url(id),
            title: title.into(),
            channel_title: format!("{title} ch"),
            views,
            published_ago_sec: ago,
            topic: "unclassified".into(),
            thumbnail_url: None,
        }
    }

    pub fn feed(items: Vec<VideoItem>) -> Feed {
        Feed {
            updated_at: "2026-10-19 21:00:00 +09:00".into(),
            source: "youtube".into(),
            region: "JP".into(),
            items,
        }
    }
}
