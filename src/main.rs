//! Vidio - Frame Sampling and Video Analysis
//!
//! Command line entry point: samples frames from videos, asks Gemini for a
//! growth package and generates thumbnail backgrounds.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidio::analysis::AnalysisReport;
use vidio::cli::{Args, Commands};
use vidio::config::Config;
use vidio::error::VidioError;
use vidio::media::{MediaFactory, VideoSource};
use vidio::progress::{CancellationToken, ProgressBarObserver};
use vidio::state::{AppState, Language, DAILY_UPLOAD_GOAL};
use vidio::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    let state_path = config.app.state_path.clone();
    let mut state = AppState::load(&state_path)?;

    // Ctrl-C aborts in-flight sampling and requests
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling...");
            on_interrupt.cancel();
        }
    });

    let outcome = run(args.command, config, &mut state, &cancel).await;

    // State is persisted whether or not the command succeeded
    state.save(&state_path)?;

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match failure_message(&e, state.language) {
            Some(message) => {
                debug!("Command failed: {:#}", e);
                eprintln!("{}", message);
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

/// Localized message for errors raised by the library; other errors are
/// left for anyhow to report
fn failure_message(error: &anyhow::Error, language: Language) -> Option<String> {
    error
        .downcast_ref::<VidioError>()
        .map(|err| err.user_message(language))
}

async fn run(
    command: Commands,
    config: Config,
    state: &mut AppState,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Sample { input, output_dir, count } => {
            MediaFactory::check_availability(&config.media).await?;
            let mut workflow = Workflow::new(config)?;

            let progress = ProgressBarObserver::new("Sampling");
            let result = workflow
                .sample_to_dir(&VideoSource::file(&input), &output_dir, count, &progress, cancel)
                .await;
            progress.finish();

            for path in result? {
                println!("{}", path.display());
            }
        }
        Commands::Analyze { input, language, json } => {
            if let Some(language) = language {
                state.set_language(language.parse::<Language>()?);
            }

            MediaFactory::check_availability(&config.media).await?;
            let mut workflow = Workflow::new(config)?;

            let progress = ProgressBarObserver::new("Extracting frames");
            let result = workflow
                .analyze_video(state, &VideoSource::file(&input), &progress, cancel)
                .await;
            progress.finish();
            let report = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Thumbnail { prompts, custom, output_dir } => {
            let output_dir = output_dir.unwrap_or_else(|| config.app.thumbnails_dir.clone());
            let workflow = Workflow::new(config)?;

            let saved: Vec<PathBuf> = match custom {
                Some(prompt) => {
                    let thumbnail = workflow.generate_thumbnail(&prompt, cancel).await?;
                    vec![thumbnail.image.save_to_dir(&output_dir, &thumbnail.id).await?]
                }
                None => {
                    let project = state.latest_project().ok_or_else(|| {
                        VidioError::InvalidArgument("No analysis yet. Run `vidio analyze` first".to_string())
                    })?;
                    let indices = if prompts.is_empty() {
                        (0..project.result.thumbnail_prompts.len()).collect()
                    } else {
                        prompts
                            .iter()
                            .map(|&n| {
                                n.checked_sub(1).ok_or_else(|| {
                                    VidioError::InvalidArgument("Prompt numbers start at 1".to_string())
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?
                    };

                    workflow
                        .generate_thumbnails(&project.result, &indices, &output_dir, cancel)
                        .await?
                        .into_iter()
                        .map(|(_, path)| path)
                        .collect()
                }
            };

            for path in saved {
                println!("{}", path.display());
            }
        }
        Commands::Login { identity } => {
            let user = state.register(&identity)?;
            println!("Welcome, {}!", user.username);
        }
        Commands::Logout => {
            state.logout();
            println!("Logged out");
        }
        Commands::Language { language } => {
            if let Some(language) = language {
                state.set_language(language.parse::<Language>()?);
            }
            println!("Language: {}", state.language.display_name());
        }
        Commands::History { limit } => {
            if state.history.is_empty() {
                println!("No analyses yet.");
            } else {
                println!("{:<38} {:<20} {:<5} {:<30}", "ID", "Date", "Lang", "Video");
                println!("{}", "-".repeat(95));
                for entry in state.history.iter().rev().take(limit) {
                    println!(
                        "{:<38} {:<20} {:<5} {:<30}",
                        entry.id,
                        entry.date.format("%Y-%m-%d %H:%M"),
                        entry.language,
                        entry.video_name
                    );
                }
            }
        }
        Commands::Status => {
            match &state.user {
                Some(user) => {
                    println!("User: {} ({})", user.username, user.id);
                    println!("Subscribers: {}", user.subscribers);
                    println!("Monetized: {}", if user.is_monetized { "yes" } else { "no" });
                    println!(
                        "Uploads today: {} / {} ({}%), {} left",
                        user.videos_uploaded_today,
                        DAILY_UPLOAD_GOAL,
                        state.upload_progress_percent(),
                        state.remaining_uploads()
                    );
                }
                None => println!("Not logged in. Run `vidio login <email-or-phone>`"),
            }
            println!("Language: {}", state.language.display_name());
            println!("Analyses: {}", state.history.len());
            if let Some(error) = &state.last_error {
                println!("Last error: {}", error);
            }
        }
        Commands::Check => {
            MediaFactory::check_availability(&config.media).await?;
            println!("ffmpeg and ffprobe are available");
            config.analysis.resolve_api_key()?;
            println!("API key configured");
        }
    }

    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("\nTitles:");
    for (i, title) in report.titles.iter().enumerate() {
        println!("  {}. {}", i + 1, title);
    }
    println!("\nDescription:\n  {}", report.description);
    println!("\nTags:\n  {}", report.tags.join(", "));
    println!("\nEngagement strategy:\n  {}", report.engagement_strategy);
    println!("\nThumbnail prompts:");
    for (i, prompt) in report.thumbnail_prompts.iter().enumerate() {
        println!("  {}. {}", i + 1, prompt);
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".vidio").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "vidio.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("vidio.log").display());

    Ok(())
}
