//! Background tasks that drive the engine on behalf of a session.
//!
//! The blocking engine work runs on `spawn_blocking`; these async wrappers
//! move its results into the shared [`Session`] and report them through an
//! [`EventProxy`].

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::events::SessionEvent;
use super::proxy::EventProxy;
use super::state::{lock, Session};

use crate::core::{
    BatchOperator, BatchReport, ConflictResolver, ContentExtractor, CoreError, DeleteReport,
    OperationLog, QueryConfig, ScanEvent, ScanOutcome, Scanner,
};

/// Starts a scan of the session's search folders.
///
/// Configuration errors are returned before anything is spawned. Otherwise
/// results stream in as `MatchFound` events and the scan ends with exactly
/// one `ScanFinished` or `Error` event.
pub fn start_scan<P: EventProxy>(
    proxy: P,
    state: Arc<Mutex<Session>>,
    query: QueryConfig,
) -> Result<(), CoreError> {
    let mut state_guard = lock(&state);
    if state_guard.search_folders.is_empty() {
        return Err(CoreError::NoRoots);
    }
    query.validate()?;
    if state_guard.is_operating {
        return Err(CoreError::Busy);
    }

    state_guard.cancel_current_scan();
    let (cancel_flag, generation) = state_guard.reset_for_scan();
    let started = format!(
        "Started search, keyword: {}, file types: {:?}",
        query.expression, state_guard.config.file_type_class
    );
    state_guard.record(started, None);

    let roots = state_guard.search_folders.clone();
    let recursive = state_guard.include_subfolders;
    let extractor = state_guard.config.content_extractor();

    tracing::info!("Spawning scan task #{} over {} root(s)", generation, roots.len());
    let handle = tokio::spawn(scan_task(
        proxy,
        state.clone(),
        ScanJob {
            roots,
            recursive,
            query,
            extractor,
            cancel_flag,
            generation,
        },
    ));
    state_guard.scan_task = Some(handle);
    Ok(())
}

/// Requests cancellation of the running scan, if any.
pub fn cancel_scan(state: &Mutex<Session>) {
    lock(state).cancel_current_scan();
}

struct ScanJob {
    roots: Vec<PathBuf>,
    recursive: bool,
    query: QueryConfig,
    extractor: ContentExtractor,
    cancel_flag: Arc<AtomicBool>,
    generation: u64,
}

/// Runs the scanner off the runtime and relays its events into the session.
async fn scan_task<P: EventProxy>(proxy: P, state: Arc<Mutex<Session>>, job: ScanJob) {
    let ScanJob {
        roots,
        recursive,
        query,
        extractor,
        cancel_flag,
        generation,
    } = job;

    let (tx, mut rx) = mpsc::unbounded_channel::<ScanEvent>();
    let worker = tokio::task::spawn_blocking(move || {
        let mut sink = tx;
        Scanner::new(extractor).scan(&roots, recursive, &query, &cancel_flag, &mut sink)
    });

    // The channel closes once the worker drops its sender.
    while let Some(event) = rx.recv().await {
        let forwarded = {
            let mut state_lock = lock(&state);
            if state_lock.scan_generation != generation {
                None
            } else {
                match event {
                    ScanEvent::Match(record) => {
                        state_lock.search_results.push(record.clone());
                        let found = state_lock.search_results.len();
                        state_lock.found_files_count = found;
                        Some(SessionEvent::MatchFound(record))
                    }
                    ScanEvent::Progress(progress) => {
                        state_lock.scan_progress = progress.clone();
                        Some(SessionEvent::ScanProgress(progress))
                    }
                }
            }
        };
        match forwarded {
            Some(event) => proxy.send_event(event),
            None => {
                tracing::warn!("Scan #{} was superseded. Discarding its results.", generation);
                return;
            }
        }
    }

    let result = worker.await;

    let mut state_lock = lock(&state);
    if state_lock.scan_generation != generation {
        return;
    }
    state_lock.is_scanning = false;
    state_lock.scan_task = None;

    match result {
        Ok(Ok(summary)) => {
            match summary.outcome {
                ScanOutcome::Cancelled => state_lock.record("Search cancelled", None),
                ScanOutcome::Completed => state_lock.record(
                    format!("Search completed, found {} files", summary.matches_found),
                    None,
                ),
            }
            state_lock.last_scan = Some(summary.clone());
            drop(state_lock);
            proxy.send_event(SessionEvent::ScanFinished(summary));
        }
        Ok(Err(e)) => {
            drop(state_lock);
            tracing::error!("Scan #{} failed: {}", generation, e);
            proxy.send_event(SessionEvent::Error(e.to_string()));
        }
        Err(join_error) => {
            drop(state_lock);
            let e = CoreError::from(join_error);
            tracing::error!("Scan #{} failed: {}", generation, e);
            proxy.send_event(SessionEvent::Error(e.to_string()));
        }
    }
}

/// Checks the current results against the target folder. The caller decides
/// each conflict on the returned resolver and hands it to [`copy_to_target`].
pub fn prepare_copy(state: &Mutex<Session>) -> Result<ConflictResolver, CoreError> {
    let state_guard = lock(state);
    let target = state_guard
        .target_folder
        .clone()
        .ok_or(CoreError::NoTargetFolder)?;
    ConflictResolver::new(&target, &state_guard.search_results)
}

/// Copies the resolved batch into the resolver's target folder.
pub async fn copy_to_target<P: EventProxy>(
    proxy: P,
    state: Arc<Mutex<Session>>,
    resolver: ConflictResolver,
) -> Result<BatchReport, CoreError> {
    let target_dir = resolver.target_dir().to_path_buf();
    let resolved = resolver.finish();

    let cancel_flag = {
        let mut state_guard = lock(&state);
        let flag = state_guard.begin_operation()?;
        for skipped in &resolved.skipped {
            state_guard.record("Skipped file with conflicting name", Some(&skipped.path));
        }
        flag
    };

    let progress_proxy = proxy.clone();
    let jobs = resolved.jobs;
    let joined = tokio::task::spawn_blocking(move || {
        let mut log = OperationLog::new();
        let report = BatchOperator::new(&mut log)
            .with_cancel(&cancel_flag)
            .copy(&jobs, &target_dir, |progress| {
                progress_proxy.send_event(SessionEvent::BatchProgress(progress))
            });
        (report, log)
    })
    .await;

    let mut state_guard = lock(&state);
    state_guard.is_operating = false;
    let (report, log) = joined?;
    merge_log(&mut state_guard, log);
    let report = report?;
    drop(state_guard);

    proxy.send_event(SessionEvent::CopyFinished(report.clone()));
    Ok(report)
}

/// Deletes every file in the current results. Deleted records leave the
/// result list; failed and unattempted ones stay.
pub async fn delete_matches<P: EventProxy>(
    proxy: P,
    state: Arc<Mutex<Session>>,
) -> Result<DeleteReport, CoreError> {
    let (records, cancel_flag) = {
        let mut state_guard = lock(&state);
        if state_guard.search_results.is_empty() {
            return Err(CoreError::EmptySelection("delete"));
        }
        let flag = state_guard.begin_operation()?;
        (state_guard.search_results.clone(), flag)
    };

    let progress_proxy = proxy.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let mut log = OperationLog::new();
        let report = BatchOperator::new(&mut log)
            .with_cancel(&cancel_flag)
            .delete(records, |progress| {
                progress_proxy.send_event(SessionEvent::BatchProgress(progress))
            });
        (report, log)
    })
    .await;

    let mut state_guard = lock(&state);
    state_guard.is_operating = false;
    let (report, log) = joined?;
    merge_log(&mut state_guard, log);
    let report = report?;
    state_guard.search_results = report.retained.clone();
    drop(state_guard);

    proxy.send_event(SessionEvent::DeleteFinished(report.report.clone()));
    Ok(report)
}

fn merge_log(session: &mut Session, log: OperationLog) {
    session
        .operated_files
        .extend(log.entries().iter().filter_map(|entry| entry.path.clone()));
    session.operation_log.append(log);
}
