mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{remembered_config, Cli, ConflictArg};
use file_gather::app::events::SessionEvent;
use file_gather::app::state::{lock, Session};
use file_gather::app::tasks;
use file_gather::config::{settings, AppConfig};
use file_gather::core::ScanSummary;
use file_gather::utils::format::format_size;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = settings::load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Could not load config: {:#}. Using defaults.", e);
        AppConfig::default()
    });
    let stored = config.clone();
    cli.apply_to(&mut config);
    let query = cli.query_config(&config)?;

    let mut session = Session::new(config);
    session.search_folders.clear();
    for root in &cli.roots {
        if let Err(e) = session.add_search_folder(root) {
            tracing::warn!("Skipping search folder: {}", e);
        }
    }
    let state = Arc::new(Mutex::new(session));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let cancel_state = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let mut session = lock(&cancel_state);
            session.cancel_current_scan();
            session.cancel_current_operation();
        }
    });

    tasks::start_scan(tx.clone(), state.clone(), query)?;
    let summary = collect_scan(&mut rx).await?;
    print_summary(&summary);

    if let Some(target) = &cli.copy_to {
        copy_matches(&cli, target, tx.clone(), state.clone()).await?;
    }

    if cli.delete {
        delete_matches(&cli, tx.clone(), state.clone()).await?;
    }

    let session = lock(&state);
    if cli.show_log {
        for line in session.operation_log.render_lines(None) {
            println!("{line}");
        }
    }
    if let Some(path) = &cli.log_json {
        session.operation_log.export_json(path)?;
    }
    if let Some(updated) = remembered_config(&stored, &session.config) {
        if let Err(e) = settings::save_config(&updated, cli.config.as_deref()) {
            tracing::warn!("Could not save config: {:#}", e);
        }
    }
    Ok(())
}

/// Prints matches as they arrive until the scan reports its summary.
async fn collect_scan(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Result<ScanSummary> {
    loop {
        match rx.recv().await {
            Some(SessionEvent::MatchFound(record)) => println!(
                "{:>12}  {}  {}",
                format_size(record.size),
                record.modified.format("%Y-%m-%d %H:%M"),
                record.path.display()
            ),
            Some(SessionEvent::ScanProgress(progress)) => tracing::debug!(
                "Examined {} files, {} matches, in {:?}",
                progress.files_examined,
                progress.matches_found,
                progress.current_directory
            ),
            Some(SessionEvent::ScanFinished(summary)) => return Ok(summary),
            Some(SessionEvent::Error(e)) => bail!(e),
            Some(_) => {}
            None => bail!("Scan task ended without a result"),
        }
    }
}

fn print_summary(summary: &ScanSummary) {
    if summary.was_cancelled() {
        println!("Search cancelled, {} files found so far", summary.matches_found);
    } else {
        println!(
            "Search complete, found {} files ({} examined, {} skipped)",
            summary.matches_found, summary.files_examined, summary.skipped
        );
    }
    for root in &summary.missing_roots {
        println!("Folder not found: {}", root.display());
    }
}

async fn copy_matches(
    cli: &Cli,
    target: &std::path::Path,
    tx: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<Mutex<Session>>,
) -> Result<()> {
    lock(&state).set_target_folder(target)?;
    let mut resolver = tasks::prepare_copy(&state)?;

    if resolver.has_conflicts() {
        println!(
            "{} of {} files already exist in {}",
            resolver.conflict_count(),
            resolver.entries().len(),
            target.display()
        );
        match cli.on_conflict {
            ConflictArg::Overwrite => resolver.overwrite_all(),
            ConflictArg::Rename => resolver.auto_rename_all(),
            ConflictArg::Skip => {
                let colliding: Vec<usize> = resolver
                    .entries()
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.collides)
                    .map(|(index, _)| index)
                    .collect();
                for index in colliding {
                    resolver.skip(index);
                }
            }
        }
    }

    let report = tasks::copy_to_target(tx, state, resolver).await?;
    println!(
        "Copied {} files, {} failed",
        report.success_count(),
        report.failure_count()
    );
    for line in report.failure_lines() {
        println!("  {line}");
    }
    if report.not_attempted > 0 {
        println!("Cancelled, {} files were not copied", report.not_attempted);
    }
    Ok(())
}

async fn delete_matches(
    cli: &Cli,
    tx: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<Mutex<Session>>,
) -> Result<()> {
    let count = lock(&state).search_results.len();
    if count == 0 {
        println!("No files to delete");
        return Ok(());
    }
    if !cli.yes && !confirm(&format!("Permanently delete {count} files?"))? {
        println!("Delete aborted");
        return Ok(());
    }

    let outcome = tasks::delete_matches(tx, state).await?;
    println!(
        "Deleted {} files, {} failed",
        outcome.deleted.len(),
        outcome.report.failure_count()
    );
    for line in outcome.report.failure_lines() {
        println!("  {line}");
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
