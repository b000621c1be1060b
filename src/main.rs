use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use yt_queue::commands::{self, AppState, SettingsUpdate};
use yt_queue::metadata::providers::MockYoutubeProvider;
use yt_queue::{AppConfig, QueueEvent};

#[derive(Parser)]
#[command(name = "yt-queue")]
#[command(version)]
#[command(about = "Queue YouTube videos and playlists for download through yt-dlp")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the items and download them one after another
    Run(Job),
    /// Fetch the items and print the yt-dlp command for each one
    Commands(Job),
}

#[derive(Args)]
struct Job {
    /// Video or playlist URL
    #[arg(required_unless_present = "batch", conflicts_with = "batch")]
    url: Option<String>,

    /// Text file with one URL per line
    #[arg(short, long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Output format for every item (mp4, mp3)
    #[arg(short, long)]
    format: Option<String>,

    /// Output quality for every item (480p, 720p, 1080p, 128k, 192k, 256k, 320k)
    #[arg(short, long)]
    quality: Option<String>,

    /// Download directory
    #[arg(short, long)]
    dir: Option<String>,

    /// Browser to read cookies from
    #[arg(long)]
    browser: Option<String>,

    /// Cookie file exported from a browser
    #[arg(long, value_name = "FILE", conflicts_with = "cookies_from_browser")]
    cookies: Option<PathBuf>,

    /// Use the cookies of the current browser session
    #[arg(long)]
    cookies_from_browser: bool,

    /// Subtitle languages, comma separated
    #[arg(long, value_delimiter = ',')]
    sub_langs: Option<Vec<String>>,

    /// Seed for the simulated transfer speeds
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(Some(path.as_path()))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load().context("Failed to load configuration")?,
    };
    info!("Configuration loaded successfully");

    let (job, simulate) = match cli.command {
        Command::Run(job) => (job, true),
        Command::Commands(job) => (job, false),
    };

    if let Some(seed) = job.seed {
        config.queue.seed = Some(seed);
    }

    let provider = Arc::new(MockYoutubeProvider::from_config(&config.metadata));
    let state = AppState::new(config, provider);

    prepare(&state, &job).await?;

    if job.save_config {
        let config = state.config.lock().await.clone();
        match &cli.config {
            Some(path) => config.save_to(path),
            None => config.save(),
        }
        .context("Failed to save configuration")?;
    }

    if simulate {
        run_queue(&state).await
    } else {
        print_commands(&state).await
    }
}

/// Applies settings, fetches the items and applies the per-item edits.
async fn prepare(state: &AppState, job: &Job) -> Result<()> {
    commands::update_settings(
        state,
        SettingsUpdate {
            download_dir: job.dir.clone(),
            browser: job.browser.clone(),
            subtitle_langs: job.sub_langs.clone(),
        },
    )
    .await
    .context("Invalid settings")?;

    if let Some(file) = &job.cookies {
        commands::load_cookies_from_file(state, file.display().to_string()).await?;
    } else if job.cookies_from_browser {
        commands::load_cookies_from_browser(state).await?;
    }

    let fetched = match (&job.url, &job.batch) {
        (_, Some(path)) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read batch file {}", path.display()))?;
            commands::fetch_batch(state, &contents).await
        }
        (Some(url), None) => commands::fetch_videos(state, url.clone()).await,
        (None, None) => anyhow::bail!("Either a URL or --batch is required"),
    }
    .context("Failed to fetch video metadata")?;
    info!("Fetched {} items", fetched["fetched_count"]);

    let ids: Vec<String> = commands::get_download_queue(state)
        .await?
        .items
        .into_iter()
        .map(|item| item.id)
        .collect();

    for id in ids {
        if let Some(format) = &job.format {
            commands::update_format(state, id.clone(), format.clone()).await?;
        }
        if let Some(quality) = &job.quality {
            let result = commands::update_quality(state, id.clone(), quality.clone()).await?;
            if result["success"] != true {
                log::warn!("Quality {} does not fit the format of {}, keeping the default", quality, id);
            }
        }
    }

    Ok(())
}

async fn print_commands(state: &AppState) -> Result<()> {
    for item in commands::get_download_queue(state).await?.items {
        println!("{}", commands::get_command(state, item.id).await?);
    }
    Ok(())
}

fn make_progress_bar(title: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {prefix:>10} - {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━╌"),
    );
    bar.set_message(title.to_string());
    bar
}

/// Starts everything and renders queue events until the queue goes idle.
/// Ctrl-C stops the queue; the active download still runs to completion.
async fn run_queue(state: &AppState) -> Result<()> {
    let manager = state.download_manager.clone();
    let mut events = manager.subscribe();

    let outcome = commands::download_all_pending(state).await?;
    if outcome["started"].is_null() && outcome["queued_count"] == 0 {
        info!("Nothing to download");
        return Ok(());
    }

    let progress = MultiProgress::new();
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();
    let mut stopping = false;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                let result = commands::stop_queue(state).await?;
                progress.println(format!(
                    "Stopping: {} queued items dropped, waiting for the active download",
                    result["cleared_count"]
                ))?;
                continue;
            }
        };

        match event {
            Ok(QueueEvent::Started { id, command }) => {
                let title = manager.get_item(&id).await.map(|item| item.title).unwrap_or_else(|| id.clone());
                progress.println(command)?;
                let bar = progress.add(make_progress_bar(&title));
                bars.insert(id, bar);
            }
            Ok(QueueEvent::Progress { id, progress: percent, speed }) => {
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(percent as u64);
                    bar.set_prefix(speed);
                }
            }
            Ok(QueueEvent::Finished { id }) => {
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(100);
                    bar.finish_with_message("done");
                }
            }
            Ok(QueueEvent::Failed { id, reason }) => {
                if let Some(bar) = bars.get(&id) {
                    bar.abandon_with_message(format!("failed: {}", reason));
                }
            }
            Ok(QueueEvent::Idle) | Err(RecvError::Closed) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => log::debug!("Renderer skipped {} events", skipped),
        }
    }

    let snapshot = commands::get_download_queue(state).await?;
    let finished = snapshot
        .items
        .iter()
        .filter(|item| item.status == yt_queue::DownloadStatus::Finished)
        .count();
    info!("Queue idle: {}/{} items finished", finished, snapshot.items.len());
    Ok(())
}
