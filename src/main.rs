//! Main entry point for the ryt-resolve CLI

use anyhow::{Context, Result};
use clap::Parser;
use ryt_resolve::cli::{Args, OutputFormatter, VerbosityLevel};
use ryt_resolve::core::{Resolver, ResolverConfig};
use ryt_resolve::platform::PlayerResponse;
use ryt_resolve::utils::url::extract_video_id;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let formatter = OutputFormatter::new(args.verbosity_level());

    if let Err(e) = init_logging(args.verbosity_level()) {
        formatter.warning(&format!("Logging disabled: {}", e));
    }

    if let Err(e) = run(&args, &formatter).await {
        formatter.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(args: &Args, formatter: &OutputFormatter) -> Result<()> {
    let start_time = Instant::now();

    let mut responses = Vec::with_capacity(args.responses.len());
    for path in &args.responses {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let response = PlayerResponse::from_json(&body)
            .with_context(|| format!("Invalid player response in {}", path.display()))?;
        responses.push(response);
    }

    let video_id = match &args.video_id {
        Some(input) => extract_video_id(input)?,
        None => responses
            .first()
            .and_then(PlayerResponse::video_id)
            .map(str::to_string)
            .context("No --video-id given and the first response has no videoDetails.videoId")?,
    };
    debug!("Resolving {} with {} client responses", video_id, responses.len());

    let config = args.apply_to(ResolverConfig::from_env()?)?;
    let resolver = Resolver::new(config).await?;
    if !args.json {
        formatter.info(&format!("JS runtime: {}", resolver.runtime().describe()));
    }

    let script = match &args.player_js {
        Some(location) => {
            let script = resolver
                .fetch_player_script(location)
                .await
                .with_context(|| format!("Failed to load player script {}", location))?;
            if !args.json {
                formatter.debug(&format!("Player script: {} bytes", script.len()));
            }
            Some(script)
        }
        None => {
            formatter.warning("No --player-js given; ciphered formats will not be decoded");
            None
        }
    };

    let spinner = formatter.spinner("Resolving links...");
    let result = resolver
        .resolve_clients(
            &responses,
            &video_id,
            script.as_deref(),
            &args.effective_player_url(),
        )
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let links = result?;

    if args.json {
        formatter.print_json(&links)?;
    } else {
        formatter.print_links(&links);
    }

    let warned = links.warned_count();
    if warned > 0 {
        formatter.warning(&format!("{} formats carry decode warnings", warned));
    }
    if !args.json {
        formatter.success(&format!(
            "{} formats resolved in {}",
            links.formats.len(),
            humantime::format_duration(Duration::from_millis(start_time.elapsed().as_millis() as u64))
        ));
    }
    info!("Resolution finished");

    Ok(())
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) -> Result<()> {
    let default_level = match verbosity {
        VerbosityLevel::Verbose => "debug",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Quiet => "error",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
