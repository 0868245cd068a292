//! Defines the central, mutable state of a search session.

use crate::config::AppConfig;
use crate::core::{CoreError, MatchRecord, OperationLog, ScanProgress, ScanSummary};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Number of characters shown in a file info preview.
pub const INFO_PREVIEW_CHARS: usize = 300;

/// Holds the complete, mutable state of a session.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` so the front end and the
/// background tasks can share it. Only the scan relay task appends matches.
pub struct Session {
    /// The application's configuration settings.
    pub config: AppConfig,
    /// Root folders of the next scan, in the order they were added.
    pub search_folders: Vec<PathBuf>,
    pub include_subfolders: bool,
    /// Matches of the most recent scan, in discovery order.
    pub search_results: Vec<MatchRecord>,
    /// Number of matches the most recent scan reported.
    pub found_files_count: usize,
    /// Where copies go. Has to be chosen before a copy can start.
    pub target_folder: Option<PathBuf>,
    pub operation_log: OperationLog,
    /// Every path that an entry of the operation log referred to.
    pub operated_files: HashSet<PathBuf>,
    /// `true` if a scan is currently in progress.
    pub is_scanning: bool,
    /// `true` if a copy or delete batch is running.
    pub is_operating: bool,
    /// The current progress of the scan.
    pub scan_progress: ScanProgress,
    pub last_scan: Option<ScanSummary>,
    /// Incremented for every scan so a superseded relay task can tell
    /// its results no longer belong in this session.
    pub scan_generation: u64,
    /// A handle to the currently running scan relay task.
    pub scan_task: Option<JoinHandle<()>>,
    /// A flag used to signal cancellation to the scan.
    pub scan_cancellation_flag: Arc<AtomicBool>,
    /// A flag used to signal cancellation to a copy or delete batch.
    pub batch_cancellation_flag: Arc<AtomicBool>,
}

/// Locks the session, recovering the guard if a task panicked while holding it.
pub fn lock(state: &Mutex<Session>) -> MutexGuard<'_, Session> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Creates a session seeded with the folders and target remembered in `config`.
    pub fn new(config: AppConfig) -> Self {
        let mut operation_log = OperationLog::new();
        operation_log.record("Application started", None);

        Self {
            search_folders: config.search_folders.clone(),
            include_subfolders: config.include_subfolders,
            target_folder: config.last_target_folder.clone().filter(|dir| dir.is_dir()),
            config,
            search_results: Vec::new(),
            found_files_count: 0,
            operation_log,
            operated_files: HashSet::new(),
            is_scanning: false,
            is_operating: false,
            scan_progress: ScanProgress::default(),
            last_scan: None,
            scan_generation: 0,
            scan_task: None,
            scan_cancellation_flag: Arc::new(AtomicBool::new(false)),
            batch_cancellation_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Appends to the operation log and remembers the path it refers to.
    pub fn record(&mut self, action: impl Into<String>, path: Option<&Path>) {
        self.operation_log.record(action, path);
        if let Some(path) = path {
            self.operated_files.insert(path.to_path_buf());
        }
    }

    /// Adds a root folder. Returns `false` if it was already in the list.
    pub fn add_search_folder(&mut self, folder: &Path) -> Result<bool, CoreError> {
        self.add_root(folder, "Added search folder")
    }

    /// Adds a whole drive as a root. Returns `false` if it was already in the list.
    pub fn add_drive(&mut self, drive: &Path) -> Result<bool, CoreError> {
        self.add_root(drive, "Added drive")
    }

    fn add_root(&mut self, root: &Path, label: &str) -> Result<bool, CoreError> {
        if !root.is_dir() {
            return Err(CoreError::NotADirectory(root.to_path_buf()));
        }
        if self.search_folders.iter().any(|f| f == root) {
            return Ok(false);
        }
        self.search_folders.push(root.to_path_buf());
        self.record(format!("{}: {}", label, root.display()), Some(root));
        Ok(true)
    }

    /// Removes the given roots. Returns how many were actually in the list.
    pub fn remove_search_folders(&mut self, folders: &[PathBuf]) -> usize {
        let mut removed = 0;
        for folder in folders {
            if let Some(index) = self.search_folders.iter().position(|f| f == folder) {
                self.search_folders.remove(index);
                self.record("Removed search folder", Some(folder));
                removed += 1;
            }
        }
        removed
    }

    pub fn clear_search_folders(&mut self) {
        self.search_folders.clear();
        self.record("Cleared search folder list", None);
    }

    pub fn set_target_folder(&mut self, folder: &Path) -> Result<(), CoreError> {
        if !folder.is_dir() {
            return Err(CoreError::NotADirectory(folder.to_path_buf()));
        }
        self.target_folder = Some(folder.to_path_buf());
        self.config.last_target_folder = Some(folder.to_path_buf());
        self.record(format!("Set target folder: {}", folder.display()), Some(folder));
        Ok(())
    }

    /// Clears the previous results and arms a fresh cancellation flag.
    /// Returns the flag and the generation number of the new scan.
    pub fn reset_for_scan(&mut self) -> (Arc<AtomicBool>, u64) {
        self.search_results.clear();
        self.found_files_count = 0;
        self.last_scan = None;
        self.scan_progress = ScanProgress::default();
        self.is_scanning = true;
        self.scan_generation += 1;

        let flag = Arc::new(AtomicBool::new(false));
        self.scan_cancellation_flag = flag.clone();
        (flag, self.scan_generation)
    }

    /// Asks the running scan to stop. The scan still reports a summary,
    /// so the session keeps whatever matches were found so far.
    pub fn cancel_current_scan(&mut self) {
        if !self.is_scanning {
            tracing::debug!("cancel_current_scan called, but no scan is running.");
            return;
        }
        tracing::info!("🛑 Cancellation requested for the running scan");
        self.scan_cancellation_flag.store(true, Ordering::SeqCst);
        self.record("Cancelled search", None);
    }

    /// Asks the running copy or delete batch to stop before its next file.
    pub fn cancel_current_operation(&mut self) {
        if self.is_operating {
            self.batch_cancellation_flag.store(true, Ordering::SeqCst);
        }
    }

    /// Arms a fresh batch cancellation flag for a new copy or delete.
    pub fn begin_operation(&mut self) -> Result<Arc<AtomicBool>, CoreError> {
        if self.is_scanning || self.is_operating {
            return Err(CoreError::Busy);
        }
        self.is_operating = true;
        let flag = Arc::new(AtomicBool::new(false));
        self.batch_cancellation_flag = flag.clone();
        Ok(flag)
    }

    /// Collects details about one file and logs that it was inspected.
    pub fn file_info(&mut self, path: &Path) -> Result<FileInfo, CoreError> {
        let info = FileInfo::read(path, &self.config)?;
        self.record(format!("Viewed file info: {}", path.display()), Some(path));
        Ok(info)
    }
}

/// Details shown for a single result.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
    /// Not every platform or file system records a creation time.
    pub created: Option<DateTime<Local>>,
    /// The first characters of the file decoded as text.
    pub preview: String,
    /// `true` when the file cannot be opened for writing, usually because
    /// another program holds it.
    pub locked: bool,
}

impl FileInfo {
    pub fn read(path: &Path, config: &AppConfig) -> Result<Self, CoreError> {
        let metadata = fs::metadata(path).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
        let modified = metadata
            .modified()
            .map_err(|e| CoreError::Io(e, path.to_path_buf()))?;

        let preview = config
            .content_extractor()
            .with_budget(INFO_PREVIEW_CHARS)
            .read_text_prefix(path)
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            modified: modified.into(),
            created: metadata.created().ok().map(DateTime::<Local>::from),
            preview,
            locked: is_file_locked(path),
        })
    }
}

/// A file is considered locked when it cannot be opened for appending.
pub fn is_file_locked(path: &Path) -> bool {
    OpenOptions::new().append(true).open(path).is_err()
}

/// Drives that can be added as search roots.
#[cfg(windows)]
pub fn available_drives() -> Vec<PathBuf> {
    ('A'..='Z')
        .map(|letter| PathBuf::from(format!("{letter}:\\")))
        .filter(|drive| drive.exists())
        .collect()
}

/// Drives that can be added as search roots.
#[cfg(not(windows))]
pub fn available_drives() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}
