//! photos-sync: keep Google Photos albums in line with a local photo collection
//!
//! Album membership is computed from local file paths and IPTC keywords using
//! the rules of an album mapping file, then applied to the remote library.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Duration as TimeWindow;
use clap::{Args, Parser, Subcommand};
use core_runtime::config::{parse_utc_offset, CoreConfig};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LogScope, LoggingConfig};
use core_service::{CoreDependencies, PhotoSyncService, RunReport};
use tracing::{error, info, warn};

const ACCESS_TOKEN_ENV: &str = "GOOGLE_PHOTOS_ACCESS_TOKEN";

#[derive(Parser)]
#[command(name = "photos-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// `root` logs only this tool's crates at the level, `all` every crate
    #[arg(long, global = true, default_value = "root")]
    log_scope: LogScope,

    /// Log output (compact, pretty, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload missing photos and add photos to their albums
    AddToAlbums(RunArgs),

    /// Remove photos that no longer match from their albums
    RemoveFromAlbums(RunArgs),

    /// Upload, add and remove in one pass (not implemented)
    SyncToAlbums(RunArgs),

    /// Create the configured albums that are missing remotely
    CreateMissingAlbums(CommonArgs),

    /// Check the album mapping file and report every problem
    ValidateAlbumsMapping(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Album mapping file
    #[arg(long, default_value = "albums.yaml")]
    config: PathBuf,

    /// Only process these albums (repeatable)
    #[arg(long = "album", value_name = "NAME")]
    albums: Vec<String>,

    /// Log mutations instead of performing them
    #[arg(long)]
    pretend: bool,

    /// Regular expression removed from full paths to form short paths
    #[arg(long)]
    path_shortening_pattern: Option<String>,

    /// UTC offset assumed when a photo carries none, e.g. +02:00
    #[arg(long, value_name = "OFFSET")]
    fallback_utc_offset: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Local root to scan for photos
    #[arg(long)]
    path: PathBuf,

    /// Hours the removal window reaches below the oldest desired photo
    #[arg(long, value_name = "HOURS", default_value_t = 0)]
    remove_window_padding: u32,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_level(cli.log_level)
        .with_scope(cli.log_scope)
        .with_format(cli.log_format);
    if let Err(e) = init_logging(logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(report) => {
            if report.as_ref().is_some_and(RunReport::has_failures) {
                warn!("Run finished with recoverable failures; see the log above");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<Option<RunReport>> {
    match command {
        Commands::AddToAlbums(args) => {
            let service = service(&args.common, args.padding(), true)?;
            Ok(Some(service.add_to_albums(&args.path).await?))
        }
        Commands::RemoveFromAlbums(args) => {
            let service = service(&args.common, args.padding(), true)?;
            Ok(Some(service.remove_from_albums(&args.path).await?))
        }
        Commands::SyncToAlbums(args) => {
            let service = service(&args.common, args.padding(), false)?;
            Ok(Some(service.sync_to_albums(&args.path).await?))
        }
        Commands::CreateMissingAlbums(args) => {
            let service = service(&args, TimeWindow::zero(), true)?;
            service.validate_albums_mapping()?;
            Ok(Some(service.create_missing_albums().await?))
        }
        Commands::ValidateAlbumsMapping(args) => {
            let service = service(&args, TimeWindow::zero(), false)?;
            service
                .validate_albums_mapping()
                .context("Edit the album mapping file and try again")?;
            Ok(None)
        }
    }
}

impl RunArgs {
    fn padding(&self) -> TimeWindow {
        TimeWindow::hours(i64::from(self.remove_window_padding))
    }
}

fn core_config(args: &CommonArgs, remove_window_padding: TimeWindow) -> Result<CoreConfig> {
    let mut builder = CoreConfig::builder()
        .album_config_path(&args.config)
        .remove_window_padding(remove_window_padding)
        .pretend(args.pretend);
    if let Some(pattern) = &args.path_shortening_pattern {
        builder = builder.path_shortening_pattern(pattern);
    }
    if let Some(offset) = &args.fallback_utc_offset {
        builder = builder.fallback_utc_offset(parse_utc_offset(offset)?);
    }
    Ok(builder.build()?)
}

/// Build the service; commands without remote access may run without a token.
fn service(
    args: &CommonArgs,
    remove_window_padding: TimeWindow,
    token_required: bool,
) -> Result<PhotoSyncService> {
    let config = core_config(args, remove_window_padding)?;
    let token = match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) => token,
        Err(_) if !token_required => String::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("{ACCESS_TOKEN_ENV} must hold a Google Photos access token"))
        }
    };

    let deps = CoreDependencies::desktop(token)?;
    let mut service = PhotoSyncService::load(config, deps)?;
    service.restrict_albums(&args.albums)?;
    if args.pretend {
        info!("Pretend mode: remote changes are logged, not performed");
    }
    Ok(service)
}
