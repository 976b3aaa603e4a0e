mod api;
mod cli;
mod commands;
mod config;
mod error;
mod output;
mod policy;
mod progress;

use std::io::IsTerminal;
use std::process;

use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
    output::OutputManager,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let json = args.json;
    let result = run(args).await;

    if let Err(e) = result {
        if json {
            let error_json = serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            });
            println!("{error_json}");
        } else {
            error!("Application error: {}", e);
            #[cfg(feature = "colored-output")]
            {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
            #[cfg(not(feature = "colored-output"))]
            {
                eprintln!("Error: {}", e);
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.output_dir, args.concurrency, args.timeout);

    let stdout_is_terminal = std::io::stdout().is_terminal();
    let output = OutputManager::new(stdout_is_terminal, args.json);
    let interactive = !args.json && std::io::stdin().is_terminal();
    let executor = CommandExecutor::new(config, args.config, output, interactive, args.quiet);

    match args.command {
        Commands::Vod {
            streamer,
            video_id,
            timestamp,
            url,
            quality,
            no_process,
        } => {
            executor
                .vod(streamer, video_id, timestamp, url, quality, no_process)
                .await?
        }
        Commands::VodBulk { csv, streamer } => {
            executor.vod_bulk(&csv, streamer.as_deref()).await?
        }
        Commands::Clips {
            streamer,
            video_id,
            duration,
            url,
            formats,
            download,
        } => {
            executor
                .clips(streamer, video_id, duration, url, &formats.formats, download)
                .await?
        }
        Commands::ClipsRandom {
            video_id,
            duration,
            formats,
            limit,
        } => {
            executor
                .clips_random(&video_id, duration, &formats.formats, limit)
                .await?
        }
        Commands::ClipsBulk {
            csv,
            merge_dir,
            streamer,
            formats,
            download,
        } => {
            executor
                .clips_bulk(
                    csv.as_deref(),
                    merge_dir.as_deref(),
                    streamer.as_deref(),
                    &formats.formats,
                    download,
                )
                .await?
        }
        Commands::Unmute { url } => executor.unmute(&url).await?,
        Commands::Verify { url } => executor.verify(&url).await?,
        Commands::Mark { url } => executor.mark(&url).await?,
        Commands::Download {
            url,
            file,
            output,
            start,
            end,
            ffmpeg,
        } => {
            executor
                .download(url, file, output, start, end, &ffmpeg)
                .await?
        }
        Commands::Serve { bind, port } => executor.serve(bind, port).await?,
        Commands::Config { show, reset } => executor.config(show, reset)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable in `--json` mode.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}
