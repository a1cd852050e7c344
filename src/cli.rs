use clap::ValueHint;

use std::path::PathBuf;

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file.
    ///
    /// By default, shortsrank looks for a file named `shortsrank.toml` in the following
    /// directories (in order):
    ///
    /// - `./` (the current directory)
    /// - `/etc`
    #[arg(
        short,
        long,
        global = true,
        env = "SHORTSRANK_CONFIG",
        value_hint(ValueHint::FilePath)
    )]
    pub config_path: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Query the video platform and write a fresh feed.
    Build(BuildArgs),

    /// Serve the feed as a browsable page.
    Serve(ServeArgs),

    /// Compose a top-3 ranking clip from the feed with ffmpeg.
    RankVideo(RankVideoArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Maximum number of items in the feed.
    #[arg(long)]
    pub max: Option<usize>,

    /// Lookback window in hours.
    #[arg(long)]
    pub hours: Option<u32>,

    /// Results requested per search query.
    #[arg(long = "per-query", alias = "perQuery")]
    pub per_query: Option<u32>,

    /// Pause between API requests, in milliseconds.
    #[arg(long = "delay-ms", alias = "delayMs")]
    pub delay_ms: Option<u64>,

    /// Re-read the written feed and print a sample item.
    #[arg(long)]
    pub selftest: bool,

    /// Where to write the feed.
    #[arg(long, value_hint(ValueHint::FilePath))]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind the page server to.
    #[arg(long, env = "SHORTSRANK_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Feed file to serve.
    #[arg(long, value_hint(ValueHint::FilePath))]
    pub feed: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RankVideoArgs {
    /// Feed file to read (defaults to the configured output).
    #[arg(long, value_hint(ValueHint::FilePath))]
    pub feed: Option<PathBuf>,

    /// Background video, looped.
    #[arg(long, value_hint(ValueHint::FilePath))]
    pub bg: PathBuf,

    /// Background music, looped.
    #[arg(long, value_hint(ValueHint::FilePath))]
    pub bgm: PathBuf,

    #[arg(long, value_hint(ValueHint::FilePath))]
    pub out: PathBuf,

    #[arg(long, default_value_t = 15)]
    pub seconds: u32,

    #[arg(long, default_value_t = 720)]
    pub width: u32,

    #[arg(long, default_value_t = 1280)]
    pub height: u32,

    #[arg(long, default_value_t = 0.22)]
    pub bgm_volume: f64,

    /// Date shown in the header; today in the configured offset when omitted.
    #[arg(long)]
    pub date: Option<String>,

    /// Font file for the overlay text; detected when omitted.
    #[arg(long, value_hint(ValueHint::FilePath))]
    pub font: Option<PathBuf>,

    /// Maximum characters per title line.
    #[arg(long, default_value_t = 20)]
    pub title_width: usize,

    #[arg(long, default_value_t = 2)]
    pub title_lines: usize,

    #[arg(long, default_value_t = 18)]
    pub channel_width: usize,

    /// Small caption near the bottom edge, e.g. the site address.
    #[arg(long)]
    pub footer: Option<String>,
}

impl Args {
    pub fn parse() -> Self {
        clap::Parser::parse()
    }
}
