use super::error::CoreError;
use super::extract::ContentExtractor;
use super::filter::{FileFilter, FileMeta};
use super::{MatchRecord, QueryConfig, ScanOutcome, ScanProgress, ScanSummary};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use walkdir::WalkDir;

const PROGRESS_UPDATE_INTERVAL: usize = 25; // files between progress updates

/// Messages streamed out of a running scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Match(MatchRecord),
    Progress(ScanProgress),
}

/// Receives scan events as they happen. Implementations must not block for
/// long: the scan waits on every `emit`.
pub trait ScanSink {
    fn emit(&mut self, event: ScanEvent);
}

impl ScanSink for mpsc::UnboundedSender<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) {
        // A dropped receiver means nobody is listening any more; the scan
        // itself still runs to completion or cancellation.
        if self.send(event).is_err() {
            tracing::trace!("Scan event receiver dropped");
        }
    }
}

impl ScanSink for Vec<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) {
        self.push(event);
    }
}

/// Walks root folders once and streams every file the filter accepts.
#[derive(Debug, Default)]
pub struct Scanner {
    extractor: ContentExtractor,
}

#[derive(Default)]
struct Counters {
    files_examined: usize,
    matches_found: usize,
    skipped: usize,
    missing_roots: Vec<PathBuf>,
}

impl Counters {
    fn progress(&self, current_directory: &Path) -> ScanEvent {
        ScanEvent::Progress(ScanProgress {
            files_examined: self.files_examined,
            matches_found: self.matches_found,
            current_directory: current_directory.to_path_buf(),
        })
    }
}

impl Scanner {
    pub fn new(extractor: ContentExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &ContentExtractor {
        &self.extractor
    }

    /// Scans `roots` in order. With `recursive == false` only the immediate
    /// files of each root are considered.
    ///
    /// `cancel` is polled before every directory entry; a cancelled scan
    /// returns the partial counts with [`ScanOutcome::Cancelled`]. Unreadable
    /// files and directories are skipped and counted, never fatal.
    pub fn scan<S: ScanSink>(
        &self,
        roots: &[PathBuf],
        recursive: bool,
        config: &QueryConfig,
        cancel: &AtomicBool,
        sink: &mut S,
    ) -> Result<ScanSummary, CoreError> {
        if roots.is_empty() {
            return Err(CoreError::NoRoots);
        }
        config.validate()?;

        let filter = FileFilter::new(config, &self.extractor);
        let mut counters = Counters::default();
        let mut outcome = ScanOutcome::Completed;

        tracing::info!(
            "Starting scan of {} root(s), recursive: {}, keyword: '{}'",
            roots.len(),
            recursive,
            config.expression
        );

        'roots: for root in roots {
            if cancel.load(Ordering::Relaxed) {
                outcome = ScanOutcome::Cancelled;
                break;
            }
            if !root.is_dir() {
                tracing::warn!("Search folder {} does not exist, skipping", root.display());
                counters.missing_roots.push(root.clone());
                continue;
            }

            sink.emit(counters.progress(root));
            let max_depth = if recursive { usize::MAX } else { 1 };
            let walker = WalkDir::new(root)
                .min_depth(1)
                .max_depth(max_depth)
                .follow_links(false)
                .sort_by_file_name();

            for entry in walker {
                if cancel.load(Ordering::Relaxed) {
                    outcome = ScanOutcome::Cancelled;
                    break 'roots;
                }

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!("Skipping unreadable entry: {}", e);
                        counters.skipped += 1;
                        continue;
                    }
                };

                if entry.file_type().is_dir() {
                    // Without recursion a subfolder is listed but never entered.
                    if recursive {
                        sink.emit(counters.progress(entry.path()));
                    }
                    continue;
                }

                let examined_before = counters.files_examined;
                self.visit_file(entry.path(), &filter, &mut counters, sink);

                if counters.files_examined != examined_before
                    && counters.files_examined % PROGRESS_UPDATE_INTERVAL == 0
                {
                    let directory = entry.path().parent().unwrap_or(root);
                    sink.emit(counters.progress(directory));
                }
            }
        }

        let summary = ScanSummary {
            outcome,
            files_examined: counters.files_examined,
            matches_found: counters.matches_found,
            skipped: counters.skipped,
            missing_roots: counters.missing_roots,
        };

        match summary.outcome {
            ScanOutcome::Completed => tracing::info!(
                "Scan completed: {} files examined, {} matches, {} skipped",
                summary.files_examined,
                summary.matches_found,
                summary.skipped
            ),
            ScanOutcome::Cancelled => tracing::info!(
                "🛑 Scan cancelled after {} files, {} matches so far",
                summary.files_examined,
                summary.matches_found
            ),
        }

        Ok(summary)
    }

    fn visit_file<S: ScanSink>(
        &self,
        path: &Path,
        filter: &FileFilter<'_>,
        counters: &mut Counters,
        sink: &mut S,
    ) {
        // Symlinks are followed for files only; the walk never descends through them.
        let metadata = match fs::metadata(path) {
            Ok(md) if md.is_file() => md,
            Ok(_) => return,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                counters.skipped += 1;
                return;
            }
        };
        counters.files_examined += 1;

        let meta = match FileMeta::from_metadata(path, &metadata) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                counters.skipped += 1;
                return;
            }
        };

        if let Err(reason) = filter.evaluate(&meta) {
            tracing::trace!("Rejected {} ({:?})", path.display(), reason);
            return;
        }

        counters.matches_found += 1;
        sink.emit(ScanEvent::Match(MatchRecord {
            path: meta.path,
            name: meta.name,
            size: meta.size,
            modified: meta.modified,
        }));
    }
}
