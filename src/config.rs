//! Configuration for the folder scanner

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::classify::FileClassifier;
use crate::models::Library;

/// Default marker file name; its presence excludes a directory and its
/// subtree from scanning
pub const DEFAULT_SKIP_SCAN_FILE: &str = ".scanignore";

/// Default database file for the folder store
pub const DEFAULT_DB_FILE: &str = "library_scanner.db";

/// Configuration for one scan run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Libraries to scan, in configured order
    pub libraries: Vec<Library>,

    /// Re-emit every visited folder regardless of recorded update times
    pub full_rescan: bool,

    /// Marker file name that excludes a directory subtree
    pub skip_scan_file: String,

    /// File-kind classification by extension
    pub classifier: FileClassifier,

    /// Database path for the folder store
    pub db_path: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            full_rescan: false,
            skip_scan_file: DEFAULT_SKIP_SCAN_FILE.to_string(),
            classifier: FileClassifier::default(),
            db_path: None,
        }
    }
}

impl ScanConfig {
    /// Create a new config with the given libraries
    pub fn new(libraries: Vec<Library>) -> Self {
        Self {
            libraries,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the libraries
    pub fn libraries(mut self, libraries: Vec<Library>) -> Self {
        self.config.libraries = libraries;
        self
    }

    /// Add a library
    pub fn add_library(mut self, library: Library) -> Self {
        self.config.libraries.push(library);
        self
    }

    /// Add a library from a root path, assigning the next id in
    /// configuration order
    pub fn add_root(mut self, root: impl Into<PathBuf>) -> Self {
        let id = self.config.libraries.len() as i64 + 1;
        self.config.libraries.push(Library::from_root(id, root));
        self
    }

    /// Enable or disable forced full rescan
    pub fn full_rescan(mut self, enabled: bool) -> Self {
        self.config.full_rescan = enabled;
        self
    }

    /// Set the skip-scan marker file name
    pub fn skip_scan_file(mut self, name: impl Into<String>) -> Self {
        self.config.skip_scan_file = name.into();
        self
    }

    /// Set the file classifier
    pub fn classifier(mut self, classifier: FileClassifier) -> Self {
        self.config.classifier = classifier;
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = Some(path);
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert!(config.libraries.is_empty());
        assert!(!config.full_rescan);
        assert_eq!(config.skip_scan_file, DEFAULT_SKIP_SCAN_FILE);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .add_root("/srv/media/Music")
            .add_root("/srv/media/Audiobooks")
            .full_rescan(true)
            .skip_scan_file(".noscan")
            .db_path(PathBuf::from("scan.db"))
            .build();

        assert_eq!(config.libraries.len(), 2);
        assert_eq!(config.libraries[0].id, 1);
        assert_eq!(config.libraries[0].name, "Music");
        assert_eq!(config.libraries[1].id, 2);
        assert_eq!(config.libraries[1].name, "Audiobooks");
        assert!(config.full_rescan);
        assert_eq!(config.skip_scan_file, ".noscan");
        assert_eq!(config.db_path, Some(PathBuf::from("scan.db")));
    }

    #[test]
    fn test_libraries_keep_configured_order() {
        let libs = vec![
            Library::new(7, "B", "/b"),
            Library::new(3, "A", "/a"),
        ];
        let config = ScanConfig::new(libs.clone());
        assert_eq!(config.libraries, libs);
    }
}
