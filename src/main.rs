mod api;
mod builder;
mod classify;
mod cli;
mod collect;
mod config;
mod details;
mod feed;
mod iso_duration;
mod rank;
mod render;
mod retry;
mod server;
mod state;
mod template;
mod video;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use cli::{Args, Command};
use server::Server;
use state::State;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing::{error, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn set_up_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_regex(false)
                .with_default_directive(level.into())
                .with_env_var("SHORTSRANK_LOG")
                .from_env_lossy(),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    set_up_logging(args.debug);

    match start(args).await {
        Ok(()) => ExitCode::SUCCESS,

        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn start(mut args: Args) -> Result<()> {
    let config_paths = args
        .config_path
        .take()
        .into_iter()
        .chain([
            PathBuf::from("./shortsrank.toml"),
            PathBuf::from("/etc/shortsrank.toml"),
        ])
        .collect::<Vec<_>>();
    let mut config = config::load(&config_paths)?;

    match args.command {
        Command::Build(build_args) => {
            config.update_build(&build_args);

            builder::run(&config, build_args.selftest).await
        }

        Command::Serve(serve_args) => {
            config.update_serve(&serve_args);
            let server = Server::new(State::new(config)?).await?;
            let cancel = CancellationToken::new();

            tokio::spawn({
                let cancel = cancel.clone();

                async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => cancel.cancel(),
                        Err(e) => warn!("could not listen for Ctrl-C: {e}"),
                    }
                }
            });

            server.serve(cancel).await
        }

        Command::RankVideo(video_args) => video::run(&config, &video_args).await,
    }
}
