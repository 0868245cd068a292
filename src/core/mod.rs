pub mod conflict;
pub mod error;
pub mod extract;
pub mod filter;
pub mod operations;
pub mod oplog;
pub mod query;
pub mod scanner;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One file accepted by the filter during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl MatchRecord {
    pub fn modified_date(&self) -> NaiveDate {
        self.modified.date_naive()
    }
}

/// Which part of a file the keyword expression is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    #[default]
    NameOnly,
    ContentOnly,
    Both,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileTypeFilter {
    #[default]
    Any,
    /// Lower-case extensions including the leading dot, e.g. `.txt`.
    Extensions(BTreeSet<String>),
}

impl FileTypeFilter {
    pub fn from_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = extensions
            .into_iter()
            .filter_map(|ext| crate::utils::file_types::normalize_extension(ext.as_ref()))
            .collect();
        if set.is_empty() {
            FileTypeFilter::Any
        } else {
            FileTypeFilter::Extensions(set)
        }
    }

    pub fn allows(&self, extension: &str) -> bool {
        match self {
            FileTypeFilter::Any => true,
            FileTypeFilter::Extensions(set) => set.contains(extension),
        }
    }
}

/// Inclusive byte-size bounds. `max == None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: u64,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn contains(&self, size: u64) -> bool {
        size >= self.min && self.max.map_or(true, |max| size <= max)
    }
}

/// Inclusive modification-date bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

/// Immutable per-scan configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub expression: String,
    pub target: SearchTarget,
    pub file_types: FileTypeFilter,
    pub size: SizeRange,
    pub modified: DateRange,
}

impl QueryConfig {
    /// Rejects inverted ranges before any work begins.
    pub fn validate(&self) -> Result<(), error::CoreError> {
        if let Some(max) = self.size.max {
            if self.size.min > max {
                return Err(error::CoreError::InvalidQuery(format!(
                    "minimum size {} exceeds maximum size {}",
                    self.size.min, max
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.modified.start, self.modified.end) {
            if start > end {
                return Err(error::CoreError::InvalidQuery(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    pub fn has_keyword(&self) -> bool {
        !self.expression.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub files_examined: usize,
    pub matches_found: usize,
    pub current_directory: PathBuf,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ScanSummary {
    pub outcome: ScanOutcome,
    pub files_examined: usize,
    pub matches_found: usize,
    /// Files or directories that could not be read.
    pub skipped: usize,
    /// Roots that did not exist when the scan reached them.
    pub missing_roots: Vec<PathBuf>,
}

impl ScanSummary {
    pub fn was_cancelled(&self) -> bool {
        self.outcome == ScanOutcome::Cancelled
    }
}

pub use conflict::{ConflictEntry, ConflictResolver, CopyJob, Disposition};
pub use error::CoreError;
pub use extract::{ContentExtractor, DocumentReader};
pub use filter::{FileFilter, FileMeta};
pub use operations::{BatchOperator, BatchOutcome, BatchReport, DeleteReport, OperationResult};
pub use oplog::{LogEntry, OperationLog};
pub use query::Query;
pub use scanner::{ScanEvent, ScanSink, Scanner};
