//! Scan observability
//!
//! Components never log through global state directly; they report through
//! an injected [`ScanObserver`]. `LogObserver` routes diagnostics to the
//! `log` crate, `ProgressReporter` emits machine-readable JSON messages on
//! stderr for external callers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::ScanError;
use crate::models::{FolderEntry, Library, ScanSummary};

/// Sink for scan diagnostics and lifecycle events.
///
/// All hooks default to no-ops; implementors pick what they care about.
/// Warnings are always non-fatal: by the time an observer sees one, the
/// scanner has already confined the fault and moved on.
pub trait ScanObserver: Send + Sync {
    /// A scan run is starting
    fn scan_started(&self, _libraries: &[Library], _full_rescan: bool) {}

    /// A folder was emitted as needing re-indexing
    fn folder_found(&self, _folder: &FolderEntry) {}

    /// A fault was confined to its scope (entry, subtree, or library)
    fn warning(&self, _error: &ScanError) {}

    /// One library's walk completed
    fn library_scanned(&self, _library: &Library, _folders_visited: u64) {}

    /// The whole run completed
    fn scan_finished(&self, _summary: &ScanSummary) {}
}

/// Observer that routes everything to the `log` crate
#[derive(Debug, Default)]
pub struct LogObserver;

impl ScanObserver for LogObserver {
    fn scan_started(&self, libraries: &[Library], full_rescan: bool) {
        log::info!(
            "Scanner: starting scan of {} libraries (full_rescan={})",
            libraries.len(),
            full_rescan
        );
    }

    fn folder_found(&self, folder: &FolderEntry) {
        log::debug!(
            "Scanner: found directory {:?} (audio={}, images={}, playlists={})",
            folder.path,
            folder.audio_files.len(),
            folder.image_files.len(),
            folder.playlists.len()
        );
    }

    fn warning(&self, error: &ScanError) {
        log::warn!("Scanner: {}", error);
    }

    fn library_scanned(&self, library: &Library, folders_visited: u64) {
        log::debug!(
            "Scanner: finished reading folders for {} ({} visited)",
            library.name,
            folders_visited
        );
    }

    fn scan_finished(&self, summary: &ScanSummary) {
        log::info!(
            "Scanner: finished loading all folders (visited={}, emitted={}, ms={})",
            summary.folders_visited,
            summary.folders_emitted,
            summary.duration_ms
        );
    }
}

/// Start message sent when the scan begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Library root paths
    pub libraries: Vec<String>,
    /// Whether a forced full rescan is running
    pub full_rescan: bool,
}

/// Progress message sent while folders are being emitted
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Folders emitted so far
    #[serde(rename = "f")]
    pub folders: u64,
    /// Path of the folder just emitted
    pub dir: String,
}

/// Error message sent when a confined fault is reported
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error kind
    pub error_type: String,
    /// Scope the fault was confined to
    pub severity: String,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Done message sent when the run completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Total folders visited
    #[serde(rename = "fv")]
    pub folders_visited: u64,
    /// Folders emitted as needing re-indexing
    #[serde(rename = "fe")]
    pub folders_emitted: u64,
    /// Libraries whose walk completed
    #[serde(rename = "ls")]
    pub libraries_scanned: u64,
    /// Libraries skipped
    #[serde(rename = "lk")]
    pub libraries_skipped: u64,
    /// Total run duration in milliseconds
    pub ms: u64,
}

/// JSON progress reporter writing `_t`-tagged messages to stderr.
///
/// Start, error, and done messages are emitted immediately; per-folder
/// progress is throttled to at most one message per interval.
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Milliseconds-since-start of the last progress message
    last_report_ms: AtomicU64,
    /// Folders emitted so far
    folders: AtomicU64,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new reporter
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        Self {
            enabled,
            interval_ms,
            last_report_ms: AtomicU64::new(0),
            folders: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Check whether the throttle interval has elapsed
    fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let now = self.current_timestamp();
        now.saturating_sub(self.last_report_ms.load(Ordering::Relaxed)) >= self.interval_ms
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
        }
    }
}

impl ScanObserver for ProgressReporter {
    fn scan_started(&self, libraries: &[Library], full_rescan: bool) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            libraries: libraries
                .iter()
                .map(|l| l.path.to_string_lossy().to_string())
                .collect(),
            full_rescan,
        };
        self.output_to_stderr(&msg);
    }

    fn folder_found(&self, folder: &FolderEntry) {
        let folders = self.folders.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.should_report() {
            return;
        }
        let msg = ProgressMessage {
            msg_type: "p",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            folders,
            dir: folder.path.to_string_lossy().to_string(),
        };
        self.output_to_stderr(&msg);
        self.last_report_ms
            .store(self.current_timestamp(), Ordering::Relaxed);
    }

    fn warning(&self, error: &ScanError) {
        if !self.enabled {
            return;
        }
        let msg = ErrorProgressMessage {
            msg_type: "err",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            error_type: format!("{:?}", error.kind),
            severity: format!("{:?}", error.severity),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        };
        self.output_to_stderr(&msg);
    }

    fn scan_finished(&self, summary: &ScanSummary) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            folders_visited: summary.folders_visited,
            folders_emitted: summary.folders_emitted,
            libraries_scanned: summary.libraries_scanned,
            libraries_skipped: summary.libraries_skipped,
            ms: summary.duration_ms,
        };
        self.output_to_stderr(&msg);
    }
}
