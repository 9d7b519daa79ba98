mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use holocron_api::{MetadataError, MetadataService, ProxyClient};
use holocron_core::catalog::{Catalog, CatalogEntry, MediaKind};
use holocron_core::config::{AppConfig, LoggingConfig};
use holocron_core::format::{self, RatingTier};
use holocron_core::keys::EpisodeRef;
use holocron_core::models::CanonicalState;
use holocron_core::progress;
use holocron_core::store::Store;
use holocron_runtime::{BatchReport, Resolution, Tracker, TrackerError, TrackerSettings};

use cli::{Cli, Commands};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to reset without --yes")]
    NotConfirmed,
}

impl CliError {
    /// What to print for the person at the terminal.
    fn user_message(&self) -> String {
        match self {
            Self::Tracker(TrackerError::Metadata(e)) | Self::Metadata(e) => {
                let mut msg = e.user_message();
                if e.is_retryable() {
                    msg.push_str(RETRY_HINT);
                }
                msg
            }
            other => other.to_string(),
        }
    }
}

const RETRY_HINT: &str = " This looks temporary; run the same command again later.";

fn is_retryable(err: &TrackerError) -> bool {
    matches!(err, TrackerError::Metadata(e) if e.is_retryable())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::load();
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let _guard = init_tracing(&logging, cli.verbose);

    let config = config.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr, or to a daily file when `logging.file` is set. The
/// returned guard flushes the file writer on drop.
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    let default = if verbose { "holocron=debug" } else { "holocron=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    match &logging.file {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "holocron.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn open_store(db: Option<PathBuf>) -> Store {
    let path = match db {
        Some(path) => Ok(path),
        None => AppConfig::ensure_db_path(),
    };
    match path.map_err(|e| e.to_string()).and_then(|p| {
        Store::open(&p).map_err(|e| format!("{}: {e}", p.display()))
    }) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "Database unavailable, progress will not be saved");
            Store::in_memory()
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), CliError> {
    let client = ProxyClient::new(
        &config.metadata.base_url,
        Duration::from_secs(config.metadata.timeout_secs),
    )?;
    let tracker = Tracker::new(
        Catalog::builtin(),
        open_store(cli.db),
        client,
        TrackerSettings::from(&config.tracking),
    );

    match cli.command {
        Commands::Status => print_status(&tracker).await,
        Commands::List { query, remaining } => {
            let state = tracker.state().await;
            let entries = progress::filter(
                &state,
                tracker.catalog(),
                query.as_deref().unwrap_or(""),
                remaining,
            );
            if entries.is_empty() {
                println!("Nothing to show.");
            }
            for entry in entries {
                println!("{}", render_entry(&state, entry));
            }
        }
        Commands::Next => {
            let state = tracker.state().await;
            match progress::next_up(&state, tracker.catalog()) {
                Some(entry) => println!("{}", render_entry(&state, entry)),
                None => println!("All caught up. Nothing remaining!"),
            }
        }
        Commands::Check { slug } => {
            let kind = tracker
                .catalog()
                .get(&slug)
                .map(|e| e.kind)
                .ok_or_else(|| TrackerError::UnknownTitle(slug.clone()))?;
            let done = match kind {
                MediaKind::Movie => tracker.toggle_movie(&slug).await?,
                MediaKind::Series => tracker.toggle_series(&slug).await?,
            };
            println!("{slug}: {}", if done { "watched" } else { "not watched" });
        }
        Commands::Episode {
            slug,
            season,
            episode,
        } => {
            let watched = tracker.toggle_episode(&slug, season, episode).await?;
            let state = tracker.state().await;
            let pct = progress::series_percent(&state, &slug).unwrap_or(0);
            println!(
                "{slug} S{season}E{episode}: {} ({pct}% of series)",
                if watched { "watched" } else { "not watched" }
            );
        }
        Commands::Episodes { slug } => {
            let guide = tracker.episode_guide(&slug).await?;
            let state = tracker.state().await;
            for season in &guide.seasons {
                let runtime = format::format_runtime(
                    season.runtime_minutes().map(i64::from).unwrap_or(0),
                );
                println!("Season {} {runtime}", season.number);
                for ep in &season.episodes {
                    let key = EpisodeRef::new(guide.external_id, season.number, ep.number).key();
                    let mark = if state.watched.contains(&key) { "x" } else { " " };
                    println!("  [{mark}] E{:<3} {}", ep.number, ep.name);
                }
            }
            let watched = i64::from(guide.watched_runtime_minutes(&state.watched));
            let total = i64::from(guide.total_runtime_minutes());
            println!("{}", format::progress_runtime_text(watched, total));
        }
        Commands::MarkAll { slug, unwatch } => {
            let count = tracker.mark_all(&slug, !unwatch).await?;
            let verb = if unwatch { "unwatched" } else { "watched" };
            println!("{slug}: {count} episodes marked {verb}");
        }
        Commands::Resolve { slug: Some(slug), .. } => match tracker.resolve(&slug).await? {
            Resolution::Movie(meta) => println!(
                "{slug}: movie #{} {} {}",
                meta.external_id,
                format::format_runtime(meta.runtime_minutes),
                format::format_rating(meta.rating)
            ),
            Resolution::Series(meta) => println!(
                "{slug}: series #{} {} episodes {}",
                meta.external_id,
                meta.total_episodes,
                format::format_runtime(meta.total_runtime_minutes)
            ),
        },
        Commands::Resolve { slug: None, all } => {
            if !all {
                println!("Pass a title id, or --all to resolve every unresolved title.");
                return Ok(());
            }
            print_report(tracker.prefetch().await);
        }
        Commands::Refresh => print_report(tracker.refresh_stale().await),
        Commands::Export { output } => {
            let json = tracker.export().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { path } => {
            let text = std::fs::read_to_string(&path)?;
            let state = tracker.import(&text).await?;
            println!("Imported {} watched keys.", state.watched.len());
        }
        Commands::Reset { yes } => {
            if !yes {
                return Err(CliError::NotConfirmed);
            }
            tracker.reset().await;
            println!("Progress reset.");
        }
    }
    Ok(())
}

async fn print_status<S: MetadataService>(tracker: &Tracker<S>) {
    let summary = tracker.summary().await;
    println!(
        "Progress: {:.2}% of {} titles ({} remaining)",
        summary.title_percent, summary.total_items, summary.remaining
    );
    let runtime = format::progress_runtime_text(
        summary.runtime.watched_minutes,
        summary.runtime.total_minutes,
    );
    if !runtime.is_empty() {
        println!("Runtime:  {runtime} ({}%)", summary.time_percent);
    }
    println!("Checked:  {} items", summary.watched_count);
    if let Some(next) = summary.next_up.and_then(|id| tracker.catalog().get(&id)) {
        println!("Next up:  {} ({})", next.title, next.year);
    }
}

fn print_report(report: BatchReport) {
    for line in report_lines(&report) {
        println!("{line}");
    }
}

fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!("Resolved {} titles.", report.resolved.len())];
    for (slug, err) in &report.failed {
        let reason = match err {
            TrackerError::Metadata(e) => e.user_message(),
            other => other.to_string(),
        };
        let marker = if is_retryable(err) { " (retryable)" } else { "" };
        lines.push(format!("  {slug}: {reason}{marker}"));
    }
    let retryable = report.failed.iter().filter(|(_, e)| is_retryable(e)).count();
    if retryable > 0 {
        lines.push(format!(
            "{retryable} lookups failed temporarily; run the command again to retry them."
        ));
    }
    lines
}

/// `[x] Title (Year)  Series  **  2h 15m  8.1 ★★★★☆ excellent`
fn render_entry(state: &CanonicalState, entry: &CatalogEntry) -> String {
    let mark = if progress::is_complete(state, entry) {
        "[x]".to_string()
    } else {
        match progress::series_percent(state, &entry.id) {
            Some(pct) if pct > 0 => format!("[{pct}%]"),
            _ => "[ ]".to_string(),
        }
    };

    let (runtime, rating) = match entry.kind {
        MediaKind::Movie => {
            let meta = state.movie_meta.get(&entry.id);
            (
                meta.and_then(|m| m.valid_runtime()),
                meta.map(|m| m.rating).unwrap_or(0.0),
            )
        }
        MediaKind::Series => (
            state
                .series_meta
                .get(&entry.id)
                .and_then(|m| m.valid_runtime()),
            0.0,
        ),
    };
    let runtime = runtime
        .or(entry.runtime_estimate.map(i64::from))
        .map(format::format_runtime)
        .unwrap_or_default();

    let mut line = format!("{mark:<6} {} ({})  {}", entry.title, entry.year, entry.kind);
    if let Some(tier) = entry.tier {
        line.push_str(&format!("  {}", tier.badge()));
    }
    if !runtime.is_empty() {
        line.push_str(&format!("  {runtime}"));
    }
    if rating > 0.0 {
        line.push_str(&format!(
            "  {} {} {}",
            format::format_rating(rating),
            format::stars(rating),
            RatingTier::of(rating).as_str()
        ));
    }
    line.push_str(&format!("  [{}]", entry.id));
    line
}
