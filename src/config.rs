mod types;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use take_mut::take;
use tracing::{debug, info};
use url::Url;

use crate::classify::TopicTable;
use crate::cli::{BuildArgs, ServeArgs};

pub use self::types::*;

/// Hard ceiling on `--max`.
pub const MAX_ITEMS_CAP: usize = 200;

/// The platform's maximum search page size.
pub const PER_QUERY_CAP: u32 = 50;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Config {
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub api_base_url: Url,
    pub output: PathBuf,
    pub source: String,
    pub region: String,
    pub utc_offset: UtcOffset,
    pub timestamp_format: DateTimeFormat,

    /// Search queries in priority order.
    pub queries: Vec<String>,
    pub max_items: usize,
    pub lookback_hours: u32,
    pub per_query: u32,
    pub request_delay: Duration,
    pub request_timeout: Duration,

    /// Videos longer than this are left out of the feed. `0s` disables the cutoff.
    pub max_duration: Option<Duration>,
    pub retry: RetryConfig,

    pub bind_addr: String,
    pub topics: Option<TopicTable>,
}

impl Config {
    pub fn update_build(&mut self, args: &BuildArgs) {
        if let Some(max) = args.max {
            self.max_items = max;
        }

        if let Some(hours) = args.hours {
            self.lookback_hours = hours;
        }

        if let Some(per_query) = args.per_query {
            self.per_query = per_query;
        }

        if let Some(delay_ms) = args.delay_ms {
            self.request_delay = Duration::from_millis(delay_ms);
        }

        if let Some(output) = &args.output {
            self.output = output.clone();
        }

        self.clamp();
    }

    pub fn update_serve(&mut self, args: &ServeArgs) {
        if let Some(bind_addr) = &args.bind_addr {
            self.bind_addr = bind_addr.clone();
        }

        if let Some(feed) = &args.feed {
            self.output = feed.clone();
        }
    }

    /// Keeps the numeric knobs within what the platform accepts.
    pub fn clamp(&mut self) {
        self.max_items = self.max_items.clamp(1, MAX_ITEMS_CAP);
        self.per_query = self.per_query.clamp(1, PER_QUERY_CAP);
        self.lookback_hours = self.lookback_hours.max(1);
        self.retry.attempts = self.retry.attempts.max(1);
    }

    pub fn resolve_relative_paths(&mut self, config_dir: impl AsRef<Path>) {
        let config_dir = config_dir.as_ref();

        take(self, |this| Self {
            output: config_dir.join(this.output),
            ..this
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key_env: "YOUTUBE_API_KEY".into(),
            api_base_url: Url::parse("https://www.googleapis.com/youtube/v3/")
                .expect("the default API URL is valid"),
            output: "./public/latest.json".into(),
            source: "youtube".into(),
            region: "JP".into(),
            utc_offset: Default::default(),
            timestamp_format: Default::default(),
            queries: ["#shorts", "shorts", "ショート", "funny", "music", "cat"]
                .into_iter()
                .map(Into::into)
                .collect(),
            max_items: 50,
            lookback_hours: 48,
            per_query: 50,
            request_delay: Duration::from_millis(200),
            request_timeout: Duration::from_secs(30),
            max_duration: Some(Duration::from_secs(60)),
            retry: Default::default(),
            bind_addr: "127.0.0.1:20655".into(),
            topics: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_secs(2),
        }
    }
}

pub fn load(search_paths: &[PathBuf]) -> Result<Config> {
    for path in search_paths {
        debug!("Trying to load {}", path.display());
        let mut contents = String::new();

        {
            let mut f = match File::open(path) {
                Ok(f) => f,

                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(file = %path.display(), "File not found, skipping");
                    continue;
                }

                Err(e) => {
                    return Err(e)
                        .context(anyhow!("could not load a config file `{}`", path.display()));
                }
            };

            f.read_to_string(&mut contents).with_context(|| {
                anyhow!(
                    "could not read the contents of a config file `{}`",
                    path.display()
                )
            })?;
        }

        let mut cfg = parse(&contents)
            .with_context(|| anyhow!("could not load the config file `{}`", path.display()))?;

        if let Some(parent) = path.parent() {
            cfg.resolve_relative_paths(parent);
        }

        info!("Loaded a config file `{}`", path.display());

        return Ok(cfg);
    }

    info!("Using the default config");

    Ok(Default::default())
}

fn parse(contents: &str) -> Result<Config> {
    let mut cfg: Config = toml::from_str(contents)?;
    cfg.clamp();

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").unwrap();

        assert_eq!(cfg.api_key_env, "YOUTUBE_API_KEY");
        assert_eq!(cfg.max_items, 50);
        assert_eq!(cfg.max_duration, Some(Duration::from_secs(60)));
        assert_eq!(cfg.retry.attempts, 4);
    }

    #[test]
    fn reads_kebab_case_keys() {
        let cfg = parse(
            r#"
            region = "US"
            queries = ["a", "b"]
            per-query = 500
            request-delay = "1s"
            max-items = 0

            [retry]
            base-delay = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.region, "US");
        assert_eq!(cfg.queries, vec!["a", "b"]);
        assert_eq!(cfg.per_query, PER_QUERY_CAP);
        assert_eq!(cfg.max_items, 1);
        assert_eq!(cfg.request_delay, Duration::from_secs(1));
        assert_eq!(cfg.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse("colour = \"red\"").is_err());
    }

    #[test]
    fn cli_overrides_are_clamped() {
        let mut cfg = Config::default();
        cfg.update_build(&BuildArgs {
            max: Some(10_000),
            hours: Some(0),
            per_query: Some(75),
            delay_ms: Some(5),
            selftest: false,
            output: Some("out.json".into()),
        });

        assert_eq!(cfg.max_items, MAX_ITEMS_CAP);
        assert_eq!(cfg.lookback_hours, 1);
        assert_eq!(cfg.per_query, PER_QUERY_CAP);
        assert_eq!(cfg.request_delay, Duration::from_millis(5));
        assert_eq!(cfg.output, PathBuf::from("out.json"));
    }

    #[test]
    fn output_is_relative_to_the_config_file() {
        let mut cfg = Config::default();
        cfg.output = "feed/latest.json".into();
        cfg.resolve_relative_paths("/srv/shorts");

        assert_eq!(cfg.output, PathBuf::from("/srv/shorts/feed/latest.json"));
    }
}
