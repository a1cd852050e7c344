//! Keyword-based topic classification.
//!
//! A [`TopicTable`] is an ordered list of rules; the first rule with a keyword that occurs
//! in the lowercased `title + " " + channel` text decides the label. The table carries a
//! version so that a feed can be traced back to the rules that labelled it.

use serde::Deserialize;

pub const UNCLASSIFIED: &str = "unclassified";

pub const BUILTIN_VERSION: &str = "2026.1";

const BUILTIN_RULES: &[(&str, &[&str])] = &[
    (
        "music",
        &["music", "song", "cover", "歌ってみた", "弾いてみた", "歌", "lyrics", "remix", "piano", "guitar"],
    ),
    ("dance", &["dance", "ダンス", "踊ってみた", "choreo"]),
    (
        "gaming",
        &["game", "gaming", "ゲーム", "minecraft", "マイクラ", "fortnite", "pokemon", "ポケモン", "apex", "実況"],
    ),
    ("anime", &["anime", "アニメ", "manga", "漫画", "cosplay", "コスプレ"]),
    (
        "sports",
        &["sports", "soccer", "football", "baseball", "野球", "サッカー", "basketball", "nba", "workout", "筋トレ"],
    ),
    (
        "food",
        &["food", "recipe", "cooking", "料理", "レシピ", "グルメ", "mukbang", "ramen", "ラーメン", "sushi"],
    ),
    (
        "animals",
        &["cat", "dog", "猫", "ねこ", "犬", "いぬ", "pet", "ペット", "animal", "動物"],
    ),
    (
        "comedy",
        &["funny", "comedy", "prank", "お笑い", "爆笑", "ネタ", "meme", "ドッキリ"],
    ),
    (
        "beauty",
        &["makeup", "メイク", "beauty", "コスメ", "fashion", "ファッション", "hair", "ヘア"],
    ),
    ("news", &["news", "ニュース", "速報"]),
];

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TopicTable {
    pub version: String,
    pub rules: Vec<TopicRule>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TopicRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl TopicTable {
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_VERSION.into(),
            rules: BUILTIN_RULES
                .iter()
                .map(|(label, keywords)| TopicRule {
                    label: label.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    version: String,
    rules: Vec<TopicRule>,
}

impl Classifier {
    pub fn new(table: TopicTable) -> Self {
        let rules = table
            .rules
            .into_iter()
            .map(|rule| TopicRule {
                label: rule.label,
                // an empty keyword would match everything
                keywords: rule
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();

        Self {
            version: table.version,
            rules,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classify(&self, title: &str, channel_title: &str) -> &str {
        let text = format!("{title} {channel_title}").to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|rule| rule.label.as_str())
            .unwrap_or(UNCLASSIFIED)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(TopicTable::builtin())
    }
}
