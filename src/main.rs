use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use hs_autocomplete::backend::{GuardedBackend, StaticBackend};
use hs_autocomplete::config::CompletionSettings;
use hs_autocomplete::coordinator::CompletionCoordinator;
use hs_autocomplete::editor::{EditorView, TextView};
use hs_autocomplete::logging::{LogFile, init_logger};
use hs_autocomplete::worker::TokioTaskRunner;

/// Print the completions offered at the end of a line of Haskell source
#[derive(Parser, Debug)]
#[command(name = "hs-complete", version, about)]
struct Args {
    /// JSON snapshot of the analysis backend's database
    #[arg(long)]
    index: PathBuf,

    /// Source file the line belongs to (omit for an unsaved buffer)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Text of the current line up to the cursor
    #[arg(long, default_value = "")]
    line: String,

    /// Complete against every known symbol, not just those visible in the file
    #[arg(long)]
    wide: bool,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter (defaults to RUST_LOG, then "info")
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    no_color: bool,

    /// Also log at debug level to this file
    #[arg(long, conflicts_with = "session_log")]
    log_file: Option<PathBuf>,

    /// Also log at debug level to a session file in the user cache directory
    #[arg(long)]
    session_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = match (&args.log_file, args.session_log) {
        (Some(path), _) => LogFile::Path(path.clone()),
        (None, true) => LogFile::Session,
        (None, false) => LogFile::Disabled,
    };
    let _guard = init_logger(args.no_color, args.log_level.as_deref(), log_file).context("failed to initialize logging")?;

    let settings = CompletionSettings::from_env_or_default(args.config.as_deref())?;
    let backend = StaticBackend::from_path(&args.index)
        .with_context(|| format!("failed to load backend index {}", args.index.display()))?;
    info!("loaded backend index {}", args.index.display());

    let runner = Arc::new(TokioTaskRunner::current());
    let coordinator = Arc::new(CompletionCoordinator::new(
        GuardedBackend::new(Arc::new(backend), settings.backend_timeout()),
        runner.clone(),
        settings,
    ));

    let view = TextView::new(1, args.file.clone(), args.line.clone());
    coordinator.ensure_file_completions_async(view.file_name());
    runner.drain().await;

    if args.wide {
        coordinator.mark_wide_completion(view.id());
    }

    let cursor = [view.end()];
    let items = if view.is_haskell_source() {
        let response = coordinator.query_completions(&view, &cursor).await;
        if response.inhibit {
            info!("editor word completions would be inhibited");
        }
        response.items
    } else {
        coordinator.get_completions(&view, &cursor).await
    };

    for item in &items {
        println!("{}\t{}", item.display, item.insert);
    }
    info!("{} completions", items.len());

    Ok(())
}
