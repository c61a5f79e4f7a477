//! Error types for the folder scanner

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Symlink whose target could not be resolved
    BrokenSymlink,
    /// Directory listing kept failing with the same error
    StuckRead,
    /// I/O error during filesystem operations
    IoError,
    /// Folder store query or update failed
    StoreError,
    /// Scan was cancelled
    Cancelled,
    /// Unknown error
    Unknown,
}

/// How much of the scan a failure takes down.
///
/// Nothing short of cancellation aborts the run; every other fault is
/// confined to the smallest enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Skip one directory entry, keep listing the rest
    SkipEntry,
    /// Abandon this directory and everything below it
    SkipSubtree,
    /// Skip this library, continue with the others
    SkipLibrary,
    /// Unwind the whole run (cancellation only)
    AbortRun,
}

/// Represents an error that occurred during scanning
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The scope of the scan this error invalidates
    pub severity: Severity,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(
        kind: ScanErrorKind,
        severity: Severity,
        path: Option<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            path,
            message: message.into(),
        }
    }

    /// A single unreadable directory entry; listing continues
    pub fn entry(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, Severity::SkipEntry, Some(path), message)
    }

    /// A symlink that could not be resolved; the entry is skipped
    pub fn broken_symlink(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(
            ScanErrorKind::BrokenSymlink,
            Severity::SkipEntry,
            Some(path),
            message,
        )
    }

    /// A directory listing stuck on a repeating failure
    pub fn stuck_read(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::StuckRead, Severity::SkipEntry, Some(path), message)
    }

    /// A subdirectory that failed the readability probe; it is excluded
    /// from recursion entirely
    pub fn unreadable_dir(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::PermissionDenied,
            Severity::SkipSubtree,
            Some(path),
            "directory is not readable",
        )
    }

    /// A directory that could not be stat'ed or opened; its subtree is dropped
    pub fn subtree(path: PathBuf, err: std::io::Error) -> Self {
        Self::new(
            kind_of(&err),
            Severity::SkipSubtree,
            Some(path),
            err.to_string(),
        )
    }

    /// A library whose scan context could not be built
    pub fn library(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ScanErrorKind::StoreError,
            Severity::SkipLibrary,
            None,
            format!("{}: {}", name.into(), message.into()),
        )
    }

    /// Cooperative cancellation; unwinds without partial emission
    pub fn cancelled() -> Self {
        Self::new(
            ScanErrorKind::Cancelled,
            Severity::AbortRun,
            None,
            "scan cancelled",
        )
    }

    /// True if this error is the cancellation signal
    pub fn is_cancellation(&self) -> bool {
        self.kind == ScanErrorKind::Cancelled
    }
}

fn kind_of(err: &std::io::Error) -> ScanErrorKind {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
        std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
        _ => ScanErrorKind::IoError,
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::new(kind_of(&err), Severity::SkipEntry, None, err.to_string())
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        Self::new(
            ScanErrorKind::StoreError,
            Severity::SkipLibrary,
            None,
            err.to_string(),
        )
    }
}
