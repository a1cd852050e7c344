//! Composes a short vertical clip announcing the top three items of the feed.

mod text;

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::cli::RankVideoArgs;
use crate::config::Config;
use crate::feed::{self, Feed, VideoItem};
use crate::render::format_count;

const READ_ATTEMPTS: usize = 6;
const READ_INTERVAL: Duration = Duration::from_millis(250);
const SIGNATURE_PREFIX: usize = 64;

const RANKED: usize = 3;
const FRAME_RATE: &str = "30";
const CTA_SECONDS: u32 = 3;

const CTA: &str = "Full ranking in the description!";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/opentype/noto/NotoSerifCJK-Bold.ttc",
    "/usr/share/fonts/opentype/noto/NotoSerifCJK-Regular.ttc",
];
const WINDOWS_FONTS: &[&str] = &[
    "meiryob.ttc",
    "meiryo.ttc",
    "msgothic.ttc",
    "YuGothB.ttc",
    "YuGothM.ttc",
];

/// Reads `path` until two consecutive reads agree on size and prefix, so a file that is
/// being rewritten is not picked up half-written. Falls back to the last non-empty read.
async fn read_stable(path: &Path, attempts: usize, interval: Duration) -> Result<String> {
    let mut last: Option<((usize, String), String)> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }

        let contents = match fs::read_to_string(path).await {
            Ok(contents) if !contents.trim().is_empty() => contents,

            Ok(_) => {
                debug!("`{}` is empty (attempt {})", path.display(), attempt + 1);
                continue;
            }

            Err(e) => {
                debug!("could not read `{}`: {e}", path.display());
                continue;
            }
        };

        let signature = (
            contents.len(),
            contents.chars().take(SIGNATURE_PREFIX).collect::<String>(),
        );

        if last.as_ref().is_some_and(|(prev, _)| *prev == signature) {
            return Ok(contents);
        }

        last = Some((signature, contents));
    }

    last.map(|(_, contents)| contents)
        .ok_or_else(|| anyhow!("`{}` stayed empty or unreadable", path.display()))
}

/// Loads the feed, falling back to the backup and the in-progress copy the builder
/// leaves next to it.
async fn load_resilient(path: &Path, attempts: usize, interval: Duration) -> Result<Feed> {
    let candidates = [
        path.to_path_buf(),
        feed::backup_path(path),
        feed::temp_path(path),
    ];
    let mut problems = vec![];

    for candidate in &candidates {
        if !fs::try_exists(candidate).await.unwrap_or(false) {
            continue;
        }

        let loaded = read_stable(candidate, attempts, interval)
            .await
            .and_then(|contents| feed::parse(&contents));

        match loaded {
            Ok(feed) => {
                if candidate != path {
                    warn!("Fell back to `{}`", candidate.display());
                }

                return Ok(feed);
            }

            Err(e) => problems.push(format!("{}: {e:#}", candidate.display())),
        }
    }

    if problems.is_empty() {
        bail!("the feed `{}` does not exist", path.display());
    }

    bail!("could not load the feed: {}", problems.join("; "))
}

fn top_items(feed: &Feed) -> Result<&[VideoItem]> {
    if feed.items.len() < RANKED {
        bail!(
            "the feed has {} items, at least {RANKED} are needed",
            feed.items.len()
        );
    }

    let top = &feed.items[..RANKED];

    for (idx, item) in top.iter().enumerate() {
        if item.title.is_empty() {
            bail!("items[{idx}] has no title");
        }

        if item.views.is_none() {
            bail!("items[{idx}] has no view count");
        }
    }

    Ok(top)
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    rank: String,
    title: String,
    meta: String,
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    width: u32,
    height: u32,
    seconds: u32,
}

#[derive(Debug, Clone)]
struct Overlay {
    header: String,
    blocks: Vec<Block>,
    footer: Option<String>,
    cta: String,
}

#[derive(Debug, Clone, Copy)]
struct Style {
    size: u32,
    color: &'static str,
    border: u32,
    border_alpha: f32,
    shadow_alpha: f32,
    shadow_offset: u32,
}

impl Style {
    const fn new(size: u32, border: u32, border_alpha: f32, shadow_alpha: f32) -> Self {
        Style {
            size,
            color: "FFFFFF",
            border,
            border_alpha,
            shadow_alpha,
            shadow_offset: 2,
        }
    }
}

const HEADER_Y: u32 = 105;
const CTA_Y: u32 = 600;
const FOOTER_MARGIN: u32 = 120;

/// Vertical positions of the rank, title and meta lines of each block.
const BLOCK_Y: [(u32, u32, u32); RANKED] = [(240, 300, 360), (500, 560, 620), (800, 860, 920)];
const RANK_COLORS: [&str; RANKED] = ["FFD54A", "D7D7D7", "FFFFFF"];

const HEADER_STYLE: Style = Style::new(30, 5, 0.92, 0.50);
const META_STYLE: Style = Style::new(30, 4, 0.88, 0.40);
const FOOTER_STYLE: Style = Style {
    shadow_offset: 1,
    ..Style::new(26, 3, 0.70, 0.30)
};
const CTA_STYLE: Style = Style {
    shadow_offset: 3,
    ..Style::new(44, 6, 0.92, 0.55)
};

fn rank_style(idx: usize) -> Style {
    let top = idx == 0;

    Style {
        color: RANK_COLORS[idx],
        shadow_offset: if top { 3 } else { 2 },
        ..Style::new(42, if top { 6 } else { 5 }, 0.92, if top { 0.55 } else { 0.45 })
    }
}

fn title_style(idx: usize) -> Style {
    Style::new(36, if idx == 0 { 5 } else { 4 }, 0.90, 0.45)
}

fn drawtext(font: Option<&str>, content: &str, y: u32, style: Style, enable: &str) -> String {
    let mut out = String::from("drawtext=");

    if let Some(font) = font {
        out.push_str(&format!("fontfile={}:", text::quote_fontfile(font)));
    }

    out.push_str(&format!(
        "text='{}':x=(w-text_w)/2:y={y}:fontsize={}:fontcolor={}:\
         borderw={}:bordercolor=black@{:.2}:\
         shadowcolor=black@{:.2}:shadowx={}:shadowy={}:enable='{enable}'",
        text::drawtext_text(content),
        style.size,
        style.color,
        style.border,
        style.border_alpha,
        style.shadow_alpha,
        style.shadow_offset,
        style.shadow_offset,
    ));

    out
}

/// The `-vf` chain: background fit, colour grade, then every text layer. The ranking is
/// shown until the call-to-action takes over for the final seconds.
fn build_filter(layout: Layout, font: Option<&Path>, overlay: &Overlay) -> String {
    let Layout {
        width: w,
        height: h,
        seconds,
    } = layout;
    let font = font.map(|font| font.to_string_lossy().into_owned());
    let font = font.as_deref();

    let cta_start = seconds.saturating_sub(CTA_SECONDS).max(1);
    let main_enable = format!("between(t,0,{:.2})", f64::from(cta_start) - 0.05);
    let cta_enable = format!("between(t,{cta_start},{seconds})");

    let mut filters = vec![
        format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"),
        "eq=brightness=-0.02:contrast=1.10:saturation=1.02".to_string(),
        drawtext(font, &overlay.header, HEADER_Y, HEADER_STYLE, &main_enable),
    ];

    for (idx, (block, (rank_y, title_y, meta_y))) in
        overlay.blocks.iter().zip(BLOCK_Y).enumerate()
    {
        filters.push(drawtext(font, &block.rank, rank_y, rank_style(idx), &main_enable));
        filters.push(drawtext(font, &block.title, title_y, title_style(idx), &main_enable));
        filters.push(drawtext(font, &block.meta, meta_y, META_STYLE, &main_enable));
    }

    if let Some(footer) = &overlay.footer {
        let y = h.saturating_sub(FOOTER_MARGIN);
        filters.push(drawtext(font, footer, y, FOOTER_STYLE, &main_enable));
    }

    filters.push(drawtext(font, &overlay.cta, CTA_Y, CTA_STYLE, &cta_enable));

    filters.join(",")
}

fn blocks(items: &[VideoItem], args: &RankVideoArgs) -> Vec<Block> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| Block {
            rank: format!("TOP{}", idx + 1),
            title: text::smart_wrap(&item.title, args.title_width, args.title_lines).join("\n"),
            meta: format!(
                "{}  /  {} views",
                text::truncate(&item.channel_title, args.channel_width),
                format_count(item.views),
            ),
        })
        .collect()
}

fn ffmpeg_args(args: &RankVideoArgs, filter: String) -> Vec<OsString> {
    let looped = |input: &Path| -> [OsString; 4] {
        ["-stream_loop".into(), "-1".into(), "-i".into(), input.into()]
    };
    let encode = [
        "-t".to_string(),
        args.seconds.to_string(),
        "-vf".to_string(),
        filter,
        "-r".to_string(),
        FRAME_RATE.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-profile:v".to_string(),
        "high".to_string(),
        "-level".to_string(),
        "4.0".to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-af".to_string(),
        format!("volume={}", args.bgm_volume),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
    ];

    let mut out = vec![OsString::from("-y")];
    out.extend(looped(&args.bg));
    out.extend(looped(&args.bgm));
    out.extend(encode.into_iter().map(OsString::from));
    out.push(args.out.clone().into_os_string());

    out
}

fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    let names = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };

    std::env::split_paths(search_path)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn detect_font() -> Option<PathBuf> {
    let windows = std::env::var_os("WINDIR")
        .map(|dir| {
            let fonts = Path::new(&dir).join("Fonts");

            WINDOWS_FONTS
                .iter()
                .map(|name| fonts.join(name))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    windows
        .into_iter()
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
        .find(|candidate| candidate.is_file())
}

fn today(cfg: &Config) -> Result<String> {
    OffsetDateTime::now_utc()
        .to_offset(cfg.utc_offset.into_inner())
        .format(format_description!("[year]/[month]/[day]"))
        .context("could not format today's date")
}

pub async fn run(cfg: &Config, args: &RankVideoArgs) -> Result<()> {
    let ffmpeg = std::env::var_os("PATH")
        .and_then(|path| find_executable("ffmpeg", &path))
        .ok_or_else(|| anyhow!("ffmpeg was not found on PATH"))?;

    for input in [&args.bg, &args.bgm] {
        if !fs::try_exists(input).await.unwrap_or(false) {
            bail!("`{}` does not exist", input.display());
        }
    }

    let feed_path = args.feed.as_ref().unwrap_or(&cfg.output);
    let feed = load_resilient(feed_path, READ_ATTEMPTS, READ_INTERVAL).await?;
    let top = top_items(&feed)?;

    let date = match args.date.as_deref().map(str::trim) {
        Some(date) if !date.is_empty() => date.to_string(),
        _ => today(cfg)?,
    };
    let font = args.font.clone().or_else(detect_font);

    if font.is_none() {
        warn!("No font was found, ffmpeg will use its default");
    }

    let overlay = Overlay {
        header: format!("{date} Shorts views ranking"),
        blocks: blocks(top, args),
        footer: args.footer.clone(),
        cta: CTA.to_string(),
    };
    let layout = Layout {
        width: args.width,
        height: args.height,
        seconds: args.seconds,
    };

    info!("Feed updated at {}", feed.updated_at);

    for block in &overlay.blocks {
        info!("{}  {}  |  {}", block.rank, block.title.replace('\n', " / "), block.meta);
    }

    if let Some(dir) = args.out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| anyhow!("could not create the directory `{}`", dir.display()))?;
    }

    let filter = build_filter(layout, font.as_deref(), &overlay);
    debug!(filter = %filter, "Running `{}`", ffmpeg.display());

    let output = Command::new(&ffmpeg)
        .args(ffmpeg_args(args, filter))
        .output()
        .await
        .with_context(|| anyhow!("could not run `{}`", ffmpeg.display()))?;

    if !output.status.success() {
        error!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        bail!("ffmpeg failed ({})", output.status);
    }

    info!("Wrote `{}`", args.out.display());

    Ok(())
}
