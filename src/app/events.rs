//! Defines the events a running session reports to whatever front end drives it.

use crate::core::operations::BatchProgress;
use crate::core::{BatchReport, MatchRecord, ScanProgress, ScanSummary};

/// Events sent from background tasks to the front end.
///
/// Scan events arrive in the order the scanner produced them, and every scan
/// ends with exactly one `ScanFinished` or `Error`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A progress update during a scan.
    ScanProgress(ScanProgress),
    /// A file accepted by the filter. It has already been added to the session.
    MatchFound(MatchRecord),
    /// The scan completed or was cancelled.
    ScanFinished(ScanSummary),
    /// One more file of a copy or delete batch has been handled.
    BatchProgress(BatchProgress),
    CopyFinished(BatchReport),
    DeleteFinished(BatchReport),
    /// An error message to be displayed to the user.
    Error(String),
}
