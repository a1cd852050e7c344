//! The page model: filtering, ordering and formatting of a feed snapshot.

use serde::Serialize;

use crate::feed::{Feed, VideoItem};
use crate::rank::{sort_ascending_known_first, sort_by_views};

pub const LIMIT_CHOICES: &[usize] = &[10, 20, 50, 100];
pub const DEFAULT_LIMIT: usize = 50;

const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most viewed first.
    #[default]
    Views,
    /// Most recently published first.
    Recent,
}

impl SortOrder {
    pub const ALL: [SortOrder; 2] = [SortOrder::Views, SortOrder::Recent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Recent => "recent",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Views => "Most viewed",
            Self::Recent => "Newest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|order| order.as_str() == s)
    }
}

/// User-chosen filter, order and count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub text: String,
    pub sort: SortOrder,
    pub limit: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            sort: SortOrder::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ViewQuery {
    /// Builds a query from raw page parameters, falling back to defaults for anything
    /// unparseable or not offered by the page.
    pub fn from_params(q: Option<&str>, sort: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            text: q.unwrap_or_default().trim().to_string(),
            sort: sort.and_then(SortOrder::parse).unwrap_or_default(),
            limit: limit
                .and_then(|limit| limit.trim().parse().ok())
                .filter(|limit| LIMIT_CHOICES.contains(limit))
                .unwrap_or(DEFAULT_LIMIT),
        }
    }

    fn matches(&self, item: &VideoItem, needle: &str) -> bool {
        needle.is_empty()
            || [&item.title, &item.channel_title, &item.topic]
                .iter()
                .any(|field| field.to_lowercase().contains(needle))
    }
}

/// What a page view works from.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Loaded(Feed),
    Failed(String),
}

/// Everything a page render depends on. Re-created for every page view.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub snapshot: Snapshot,
    pub query: ViewQuery,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub rank: usize,
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub channel_title: String,
    pub topic: String,
    /// Same view, filtered down to this card's topic.
    pub topic_href: String,
    pub thumbnail_url: Option<String>,
    pub published: String,
    pub views: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct Page {
    pub status: String,
    pub error: Option<String>,
    pub q: String,
    pub limits: Vec<Choice>,
    pub sorts: Vec<Choice>,
    pub cards: Vec<Card>,
}

/// Filters, orders and cuts the feed's items.
pub fn select<'f>(feed: &'f Feed, query: &ViewQuery) -> Vec<&'f VideoItem> {
    let needle = query.text.to_lowercase();
    let mut items = feed
        .items
        .iter()
        .filter(|item| query.matches(item, &needle))
        .collect::<Vec<_>>();

    match query.sort {
        SortOrder::Views => sort_by_views(&mut items, |item| item.views),
        SortOrder::Recent => sort_ascending_known_first(&mut items, |item| item.published_ago_sec),
    }

    items.truncate(query.limit);

    items
}

fn card(rank: usize, item: &VideoItem, query: &ViewQuery) -> Card {
    Card {
        rank,
        video_id: item.video_id.clone(),
        url: safe_link(&item.url),
        title: item.title.clone(),
        channel_title: item.channel_title.clone(),
        topic: item.topic.clone(),
        topic_href: format!(
            "/?q={}&sort={}&limit={}",
            urlencoding::encode(&item.topic),
            query.sort.as_str(),
            query.limit,
        ),
        thumbnail_url: item
            .thumbnail_url
            .as_deref()
            .map(safe_link)
            .filter(|url| url != "#"),
        published: format_relative(item.published_ago_sec),
        views: format_count(item.views),
    }
}

impl ViewState {
    pub fn page(&self) -> Page {
        let limits = LIMIT_CHOICES
            .iter()
            .map(|limit| Choice {
                value: limit.to_string(),
                label: limit.to_string(),
                selected: *limit == self.query.limit,
            })
            .collect();
        let sorts = SortOrder::ALL
            .iter()
            .map(|order| Choice {
                value: order.as_str().into(),
                label: order.label().into(),
                selected: *order == self.query.sort,
            })
            .collect();

        let (status, error, cards) = match &self.snapshot {
            Snapshot::Failed(e) => (
                "Could not load the feed".to_string(),
                Some(e.clone()),
                vec![],
            ),

            Snapshot::Loaded(feed) => {
                let cards = select(feed, &self.query)
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| card(idx + 1, item, &self.query))
                    .collect::<Vec<_>>();
                let status = format!(
                    "Updated {} · showing {} of {}",
                    feed.updated_at,
                    cards.len(),
                    feed.items.len()
                );

                (status, None, cards)
            }
        };

        Page {
            status,
            error,
            q: self.query.text.clone(),
            limits,
            sorts,
            cards,
        }
    }
}

/// `45` -> `1 minute ago`, `3700` -> `1 hour ago`, `90000` -> `1 day ago`.
pub fn format_relative(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds else {
        return PLACEHOLDER.into();
    };

    let (n, unit) = if seconds < 3600 {
        ((seconds / 60).max(1), "minute")
    } else if seconds < 86400 {
        (seconds / 3600, "hour")
    } else {
        (seconds / 86400, "day")
    };

    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// `1234567` -> `1,234,567`.
pub fn format_count(count: Option<u64>) -> String {
    let Some(count) = count else {
        return PLACEHOLDER.into();
    };

    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }

        out.push(ch);
    }

    out
}

/// Only `http(s)` links make it into the page.
fn safe_link(url: &str) -> String {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();

    if lower.starts_with("https://") || lower.starts_with("http://") {
        url.into()
    } else {
        "#".into()
    }
}
