//! Core data models for the folder scanner

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// A configured root directory tree scanned as one media collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Stable library identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Root path of the library
    pub path: PathBuf,
}

impl Library {
    /// Create a new library descriptor
    pub fn new(id: i64, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            path: path.into(),
        }
    }

    /// Build a library from a root path, deriving the name from the last
    /// path component
    pub fn from_root(id: i64, root: impl Into<PathBuf>) -> Self {
        let path = root.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { id, name, path }
    }
}

/// A classified file captured during a directory visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name without path
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Modification time
    pub modified: DateTime<Utc>,
}

impl FileEntry {
    /// Create a new file entry
    pub fn new(name: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
        }
    }
}

/// The scan's output record for exactly one directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Deterministic identifier derived from (library id, cleaned path)
    pub id: String,
    /// Identifier of the owning library
    pub library_id: i64,
    /// Cleaned absolute path of the directory
    pub path: PathBuf,
    /// Most recent modification time of the directory itself and its
    /// immediate non-directory children
    pub mod_time: DateTime<Utc>,
    /// Last recorded update time from the store; Unix epoch if never seen
    pub upd_time: DateTime<Utc>,
    /// Audio files by name
    pub audio_files: BTreeMap<String, FileEntry>,
    /// Image files by name
    pub image_files: BTreeMap<String, FileEntry>,
    /// Most recent modification time among image files only
    pub images_updated_at: DateTime<Utc>,
    /// Playlist files in listing order
    pub playlists: Vec<FileEntry>,
}

impl FolderEntry {
    /// Create an empty record for a directory of the given library
    pub fn new(library: &Library, path: &Path) -> Self {
        let cleaned = clean_path(path);
        Self {
            id: folder_id(library, &cleaned),
            library_id: library.id,
            path: cleaned,
            mod_time: DateTime::UNIX_EPOCH,
            upd_time: DateTime::UNIX_EPOCH,
            audio_files: BTreeMap::new(),
            image_files: BTreeMap::new(),
            images_updated_at: DateTime::UNIX_EPOCH,
            playlists: Vec::new(),
        }
    }

    /// Whether this folder's on-disk content is newer than what the store
    /// last recorded for it.
    ///
    /// Strictly greater: a folder re-recorded at exactly its mod time is
    /// up to date.
    pub fn is_outdated(&self) -> bool {
        self.mod_time > self.upd_time
    }

    /// Total number of classified files in this folder
    pub fn num_files(&self) -> usize {
        self.audio_files.len() + self.image_files.len() + self.playlists.len()
    }
}

/// Deterministic folder identifier: MD5 of the library id and the cleaned
/// path, stable across runs and traversal order.
pub fn folder_id(library: &Library, path: &Path) -> String {
    let cleaned = clean_path(path);
    let digest = Md5::digest(format!("{}:{}", library.id, cleaned.to_string_lossy()).as_bytes());
    format!("{:x}", digest)
}

/// Normalize a path lexically: drop `.` components, fold `..` into their
/// parent where possible, collapse separators.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // ".." directly under the root stays at the root
                let (at_root, can_pop) = match cleaned.components().next_back() {
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => (true, false),
                    Some(Component::ParentDir) | None => (false, false),
                    _ => (false, true),
                };
                if can_pop {
                    cleaned.pop();
                } else if !at_root {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Result of a whole multi-library scan run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Total folders visited across all libraries
    pub folders_visited: u64,
    /// Folders actually emitted as needing re-indexing
    pub folders_emitted: u64,
    /// Libraries whose walk completed
    pub libraries_scanned: u64,
    /// Libraries skipped because their scan context could not be built
    pub libraries_skipped: u64,
    /// Total run duration in milliseconds
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn library() -> Library {
        Library::new(1, "Music", "/music")
    }

    #[test]
    fn test_folder_id_idempotent() {
        let lib = library();
        let a = folder_id(&lib, Path::new("/music/Artist/Album"));
        let b = folder_id(&lib, Path::new("/music/Artist/Album"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_folder_id_cleans_path() {
        let lib = library();
        assert_eq!(
            folder_id(&lib, Path::new("/music/Artist/./Album/")),
            folder_id(&lib, Path::new("/music/Artist/Album")),
        );
    }

    #[test]
    fn test_folder_id_scoped_by_library() {
        let a = folder_id(&Library::new(1, "a", "/music"), Path::new("/music/Album"));
        let b = folder_id(&Library::new(2, "b", "/music"), Path::new("/music/Album"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/a/./b/")), PathBuf::from("/a/b"));
        assert_eq!(clean_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(clean_path(Path::new("../../a")), PathBuf::from("../../a"));
        assert_eq!(clean_path(Path::new("a/..")), PathBuf::from("."));
        assert_eq!(clean_path(Path::new("//a//b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_library_from_root() {
        let lib = Library::from_root(3, "/srv/media/Soundtracks");
        assert_eq!(lib.name, "Soundtracks");
        assert_eq!(lib.path, PathBuf::from("/srv/media/Soundtracks"));
    }

    #[test]
    fn test_outdated_strict_comparison() {
        let lib = library();
        let mut folder = FolderEntry::new(&lib, Path::new("/music/Album"));
        folder.mod_time = DateTime::from_timestamp_millis(1_000).unwrap();

        folder.upd_time = DateTime::from_timestamp_millis(999).unwrap();
        assert!(folder.is_outdated());

        // Equal timestamps are up to date
        folder.upd_time = DateTime::from_timestamp_millis(1_000).unwrap();
        assert!(!folder.is_outdated());

        folder.upd_time = DateTime::from_timestamp_millis(1_001).unwrap();
        assert!(!folder.is_outdated());
    }

    #[test]
    fn test_new_folder_defaults_to_epoch() {
        let folder = FolderEntry::new(&library(), Path::new("/music/Album"));
        assert_eq!(folder.upd_time, DateTime::UNIX_EPOCH);
        assert_eq!(folder.mod_time, DateTime::UNIX_EPOCH);
        assert_eq!(folder.num_files(), 0);
        assert!(!folder.is_outdated());
    }

    proptest! {
        #[test]
        fn prop_outdated_iff_mod_after_upd(
            mod_ms in 0i64..4_102_444_800_000,
            upd_ms in 0i64..4_102_444_800_000,
        ) {
            let mut folder = FolderEntry::new(&library(), Path::new("/music/Album"));
            folder.mod_time = DateTime::from_timestamp_millis(mod_ms).unwrap();
            folder.upd_time = DateTime::from_timestamp_millis(upd_ms).unwrap();
            prop_assert_eq!(folder.is_outdated(), mod_ms > upd_ms);
        }

        #[test]
        fn prop_folder_id_deterministic(segs in proptest::collection::vec("[A-Za-z0-9 ._-]{1,12}", 1..5)) {
            let lib = library();
            let path = PathBuf::from("/music").join(segs.join("/"));
            prop_assert_eq!(folder_id(&lib, &path), folder_id(&lib, &path));
        }
    }
}
