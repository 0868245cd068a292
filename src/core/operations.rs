//! Bulk copy and delete over a resolved file list.
//!
//! Neither operation is atomic. Every file is attempted on its own, failures
//! are collected in the report and the batch moves on.

use super::conflict::CopyJob;
use super::error::CoreError;
use super::oplog::OperationLog;
use super::MatchRecord;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const NOT_FOUND_REASON: &str = "not found";
pub const SAME_FILE_REASON: &str = "source and destination are the same file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub source: PathBuf,
    /// Destination of a copy; `None` for deletes.
    pub target: Option<PathBuf>,
    pub status: OperationStatus,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// One entry per attempted file, in batch order.
    pub results: Vec<OperationResult>,
    /// Files never attempted because the batch was cancelled.
    pub not_attempted: usize,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// `path (reason)` lines for showing to the user.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures()
            .map(|result| match &result.status {
                OperationStatus::Failed(reason) => {
                    format!("{} ({})", result.source.display(), reason)
                }
                OperationStatus::Succeeded => result.source.display().to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub report: BatchReport,
    pub deleted: Vec<MatchRecord>,
    /// Records whose file still exists or could not be confirmed gone,
    /// including everything not attempted after a cancel.
    pub retained: Vec<MatchRecord>,
}

/// Fails unless `dir` is an existing directory we can create files in.
pub fn ensure_writable_dir(dir: &Path) -> Result<(), CoreError> {
    if !dir.is_dir() {
        return Err(CoreError::NotADirectory(dir.to_path_buf()));
    }
    let marker = dir.join(format!(".file_gather_write_check_{}", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(_) => {
            if let Err(e) = fs::remove_file(&marker) {
                tracing::warn!("Could not remove write marker {:?}: {}", marker, e);
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => {
            tracing::debug!("Write marker in {:?} failed: {}", dir, e);
            Err(CoreError::TargetNotWritable(dir.to_path_buf()))
        }
    }
}

pub struct BatchOperator<'a> {
    log: &'a mut OperationLog,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> BatchOperator<'a> {
    pub fn new(log: &'a mut OperationLog) -> Self {
        Self { log, cancel: None }
    }

    /// Polls `cancel` before every file.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Copies each job into `target_dir`, keeping timestamps where the
    /// platform allows it.
    pub fn copy<F: FnMut(BatchProgress)>(
        &mut self,
        jobs: &[CopyJob],
        target_dir: &Path,
        mut progress: F,
    ) -> Result<BatchReport, CoreError> {
        if jobs.is_empty() {
            return Err(CoreError::EmptySelection("copy"));
        }
        ensure_writable_dir(target_dir)?;

        let total = jobs.len();
        let mut results = Vec::with_capacity(total);
        let mut outcome = BatchOutcome::Completed;

        for (i, job) in jobs.iter().enumerate() {
            if self.cancelled() {
                outcome = BatchOutcome::Cancelled;
                break;
            }

            let destination = target_dir.join(&job.target_name);
            let status = if is_same_file(&job.source, &destination) {
                tracing::error!("Refusing to copy {:?} onto itself", job.source);
                OperationStatus::Failed(SAME_FILE_REASON.to_string())
            } else {
                self.copy_one(job, &destination)
            };
            results.push(OperationResult {
                source: job.source.clone(),
                target: Some(destination),
                status,
            });
            progress(BatchProgress { processed: i + 1, total });
        }

        let report = BatchReport {
            outcome,
            not_attempted: total - results.len(),
            results,
        };
        tracing::info!(
            "Copy finished: {} succeeded, {} failed, {} not attempted",
            report.success_count(),
            report.failure_count(),
            report.not_attempted
        );
        Ok(report)
    }

    fn copy_one(&mut self, job: &CopyJob, destination: &Path) -> OperationStatus {
        match copy_preserving_times(&job.source, destination) {
            Ok(()) => {
                self.log.record(
                    format!("Copied file to target folder: {}", destination.display()),
                    Some(&job.source),
                );
                OperationStatus::Succeeded
            }
            Err(e) => {
                tracing::error!("Failed to copy {:?} to {:?}: {}", job.source, destination, e);
                OperationStatus::Failed(e.to_string())
            }
        }
    }

    /// Deletes the file behind each record. A file that is already gone is
    /// reported as "not found" and its record is retained.
    pub fn delete<F: FnMut(BatchProgress)>(
        &mut self,
        records: Vec<MatchRecord>,
        mut progress: F,
    ) -> Result<DeleteReport, CoreError> {
        if records.is_empty() {
            return Err(CoreError::EmptySelection("delete"));
        }

        let total = records.len();
        let mut results = Vec::with_capacity(total);
        let mut deleted = Vec::new();
        let mut retained = Vec::new();
        let mut outcome = BatchOutcome::Completed;

        let mut pending = records.into_iter();
        for (i, record) in pending.by_ref().enumerate() {
            if self.cancelled() {
                outcome = BatchOutcome::Cancelled;
                retained.push(record);
                break;
            }

            let status = if !record.path.exists() {
                OperationStatus::Failed(NOT_FOUND_REASON.to_string())
            } else {
                match fs::remove_file(&record.path) {
                    Ok(()) => {
                        self.log.record(
                            format!("Deleted file: {}", record.path.display()),
                            Some(&record.path),
                        );
                        OperationStatus::Succeeded
                    }
                    Err(e) => {
                        tracing::error!("Failed to delete {:?}: {}", record.path, e);
                        OperationStatus::Failed(e.to_string())
                    }
                }
            };

            results.push(OperationResult {
                source: record.path.clone(),
                target: None,
                status: status.clone(),
            });
            if status == OperationStatus::Succeeded {
                deleted.push(record);
            } else {
                retained.push(record);
            }
            progress(BatchProgress { processed: i + 1, total });
        }
        retained.extend(pending);

        let report = BatchReport {
            outcome,
            not_attempted: total - results.len(),
            results,
        };
        tracing::info!(
            "Delete finished: {} deleted, {} failed, {} not attempted",
            deleted.len(),
            report.failure_count(),
            report.not_attempted
        );
        Ok(DeleteReport {
            report,
            deleted,
            retained,
        })
    }
}

/// Both paths resolve to the same existing file. `fs::copy` would truncate it.
fn is_same_file(source: &Path, destination: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(destination)) {
        (Ok(source), Ok(destination)) => source == destination,
        _ => false,
    }
}

fn copy_preserving_times(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::copy(source, destination)?;
    let metadata = fs::metadata(source)?;
    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_times(destination, accessed, modified) {
        tracing::warn!("Copied {:?} but could not keep its timestamps: {}", destination, e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use tempfile::tempdir;

    fn record_for(path: PathBuf) -> MatchRecord {
        MatchRecord {
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            size: 0,
            modified: Local::now(),
            path,
        }
    }

    #[test]
    fn test_copy_counts_successes_and_failures() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let mut jobs = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = source.path().join(name);
            fs::write(&path, name).unwrap();
            jobs.push(CopyJob { source: path, target_name: name.to_string() });
        }
        // Vanished between scan and copy.
        jobs.push(CopyJob {
            source: source.path().join("gone.txt"),
            target_name: "gone.txt".to_string(),
        });

        let mut log = OperationLog::new();
        let mut updates = Vec::new();
        let report = BatchOperator::new(&mut log)
            .copy(&jobs, target.path(), |p| updates.push(p))
            .unwrap();

        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.results.len(), 4);
        assert_eq!(report.success_count(), 3);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failure_lines().len(), 1);
        assert!(report.failure_lines()[0].contains("gone.txt"));
        assert_eq!(log.len(), 3);
        assert_eq!(updates.last(), Some(&BatchProgress { processed: 4, total: 4 }));
        assert_eq!(fs::read_to_string(target.path().join("b.txt")).unwrap(), "b.txt");
    }

    #[test]
    fn test_copy_uses_resolved_name_and_keeps_mtime() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let path = source.path().join("report.txt");
        fs::write(&path, "final version").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&path, old).unwrap();

        let jobs = vec![CopyJob { source: path, target_name: "report_1.txt".to_string() }];
        let mut log = OperationLog::new();
        BatchOperator::new(&mut log).copy(&jobs, target.path(), |_| {}).unwrap();

        let copied = target.path().join("report_1.txt");
        let metadata = fs::metadata(&copied).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), old);
    }

    #[test]
    fn test_copy_onto_itself_fails_and_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, "final version").unwrap();
        let other = dir.path().join("notes.txt");
        fs::write(&other, "notes").unwrap();

        let jobs = vec![
            CopyJob { source: path.clone(), target_name: "report.txt".to_string() },
            CopyJob { source: other, target_name: "notes_1.txt".to_string() },
        ];
        let mut log = OperationLog::new();
        let report = BatchOperator::new(&mut log).copy(&jobs, dir.path(), |_| {}).unwrap();

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.source, path);
        assert_eq!(failure.status, OperationStatus::Failed(SAME_FILE_REASON.to_string()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "final version");
        assert_eq!(fs::read_to_string(dir.path().join("notes_1.txt")).unwrap(), "notes");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_copy_rejects_missing_target_before_work() {
        let source = tempdir().unwrap();
        let path = source.path().join("a.txt");
        fs::write(&path, "a").unwrap();
        let jobs = vec![CopyJob { source: path, target_name: "a.txt".to_string() }];

        let mut log = OperationLog::new();
        let result = BatchOperator::new(&mut log).copy(&jobs, &source.path().join("nope"), |_| {});
        assert!(matches!(result, Err(CoreError::NotADirectory(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn test_cancelled_copy_stops_early() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let path = source.path().join("a.txt");
        fs::write(&path, "a").unwrap();
        let jobs = vec![
            CopyJob { source: path.clone(), target_name: "a.txt".to_string() },
            CopyJob { source: path, target_name: "b.txt".to_string() },
        ];

        let cancel = AtomicBool::new(false);
        let mut log = OperationLog::new();
        let report = BatchOperator::new(&mut log)
            .with_cancel(&cancel)
            .copy(&jobs, target.path(), |_| cancel.store(true, Ordering::Relaxed))
            .unwrap();

        assert_eq!(report.outcome, BatchOutcome::Cancelled);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.not_attempted, 1);
        assert!(!target.path().join("b.txt").exists());
    }

    #[test]
    fn test_delete_retains_missing_files() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.txt");
        fs::write(&present, "x").unwrap();
        let records = vec![
            record_for(present.clone()),
            record_for(dir.path().join("already_gone.txt")),
        ];

        let mut log = OperationLog::new();
        let outcome = BatchOperator::new(&mut log).delete(records, |_| {}).unwrap();

        assert!(!present.exists());
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.retained[0].name, "already_gone.txt");
        let failure = outcome.report.failures().next().unwrap();
        assert_eq!(failure.status, OperationStatus::Failed(NOT_FOUND_REASON.to_string()));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_cancelled_delete_retains_unprocessed_records() {
        let dir = tempdir().unwrap();
        let mut records = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            records.push(record_for(path));
        }

        let cancel = AtomicBool::new(false);
        let mut log = OperationLog::new();
        let outcome = BatchOperator::new(&mut log)
            .with_cancel(&cancel)
            .delete(records, |_| cancel.store(true, Ordering::Relaxed))
            .unwrap();

        assert_eq!(outcome.report.outcome, BatchOutcome::Cancelled);
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(outcome.retained.len(), 2);
        assert_eq!(outcome.report.not_attempted, 2);
        assert!(dir.path().join("b.txt").exists());
    }

    #[test]
    fn test_empty_batches_are_configuration_errors() {
        let dir = tempdir().unwrap();
        let mut log = OperationLog::new();
        let mut operator = BatchOperator::new(&mut log);
        assert!(matches!(
            operator.copy(&[], dir.path(), |_| {}),
            Err(CoreError::EmptySelection("copy"))
        ));
        assert!(matches!(
            operator.delete(Vec::new(), |_| {}),
            Err(CoreError::EmptySelection("delete"))
        ));
    }
}
