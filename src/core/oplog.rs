//! Append-only record of what the user and the engine did during a session.

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub action: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationLog {
    entries: Vec<LogEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry stamped with the current local time.
    pub fn record(&mut self, action: impl Into<String>, path: Option<&Path>) -> &LogEntry {
        let entry = LogEntry {
            timestamp: Local::now(),
            action: action.into(),
            path: path.map(Path::to_path_buf),
        };
        match &entry.path {
            Some(path) => tracing::info!(target: "file_gather::oplog", "{} ({})", entry.action, path.display()),
            None => tracing::info!(target: "file_gather::oplog", "{}", entry.action),
        }
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Moves the entries of `other` to the end of this log.
    pub fn append(&mut self, other: OperationLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per entry, oldest first. `limit` keeps only the first N entries,
    /// matching the "first 20 / first 50 / all" choices of the report export.
    pub fn render_lines(&self, limit: Option<usize>) -> Vec<String> {
        let count = limit.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries[..count]
            .iter()
            .map(|entry| {
                format!(
                    "{}  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action
                )
            })
            .collect()
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        tracing::info!("Exported {} log entries to {:?}", self.entries.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[test]
    fn test_entries_are_kept_in_order() {
        let mut log = OperationLog::new();
        log.record("Application started", None);
        log.record("Added search folder", Some(Path::new("/data")));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].action, "Application started");
        assert_eq!(log.entries()[1].path.as_deref(), Some(Path::new("/data")));
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);
    }

    #[test]
    fn test_render_lines_limit() {
        let mut log = OperationLog::new();
        for i in 0..30 {
            log.record(format!("action {i}"), None);
        }
        let first = log.render_lines(Some(20));
        assert_eq!(first.len(), 20);
        assert!(first[0].ends_with("  action 0"));
        assert_eq!(log.render_lines(None).len(), 30);
        assert_eq!(log.render_lines(Some(50)).len(), 30);
    }

    #[test]
    fn test_export_json_round_trip() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("log.json");
        let mut log = OperationLog::new();
        log.record("Deleted file", Some(Path::new("/tmp/a.txt")));
        log.export_json(&out).unwrap();

        let parsed: Vec<LogEntry> = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(parsed, log.entries());
    }

    #[traced_test]
    #[test]
    fn test_record_emits_trace_line() {
        let mut log = OperationLog::new();
        log.record("Search cancelled", None);
        assert!(logs_contain("Search cancelled"));
    }
}
