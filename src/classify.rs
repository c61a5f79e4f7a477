//! Path and file-kind classification
//!
//! Pure predicates used by the tree walker: file-kind classification by
//! extension, plus the directory probes (symlink resolution, ignore rules,
//! readability).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Windows recycle-bin folder name, seen on network mounts regardless of the
/// host platform
const RECYCLE_BIN: &str = "$RECYCLE.BIN";

/// Classifies file names into audio, image, and playlist kinds by extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileClassifier {
    /// Audio file extensions (lowercase, without dot)
    pub audio_extensions: HashSet<String>,
    /// Image file extensions
    pub image_extensions: HashSet<String>,
    /// Playlist file extensions
    pub playlist_extensions: HashSet<String>,
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self {
            audio_extensions: Self::default_audio_extensions(),
            image_extensions: Self::default_image_extensions(),
            playlist_extensions: Self::default_playlist_extensions(),
        }
    }
}

impl FileClassifier {
    /// Get the default audio extensions
    pub fn default_audio_extensions() -> HashSet<String> {
        [
            "mp3", "flac", "wav", "aac", "ogg", "oga", "opus", "wma", "m4a", "ape", "wv", "aiff",
            "alac",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Get the default image extensions
    pub fn default_image_extensions() -> HashSet<String> {
        ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Get the default playlist extensions
    pub fn default_playlist_extensions() -> HashSet<String> {
        ["m3u", "m3u8", "pls"].iter().map(|s| s.to_string()).collect()
    }

    /// True if the file name has an audio extension
    pub fn is_audio_file(&self, name: &str) -> bool {
        matches_extension(name, &self.audio_extensions)
    }

    /// True if the file name has an image extension
    pub fn is_image_file(&self, name: &str) -> bool {
        matches_extension(name, &self.image_extensions)
    }

    /// True if the file name has a playlist extension
    pub fn is_playlist(&self, name: &str) -> bool {
        matches_extension(name, &self.playlist_extensions)
    }
}

fn matches_extension(name: &str, extensions: &HashSet<String>) -> bool {
    match name.rsplit_once('.') {
        // A leading dot alone is a hidden file, not an extension
        Some((stem, ext)) if !stem.is_empty() => extensions.contains(&ext.to_lowercase()),
        _ => false,
    }
}

/// True if the entry is a directory, or a symlink that resolves to one.
///
/// Resolving a symlink costs one stat; a broken link surfaces as `Err` and
/// the caller must skip the entry rather than abort the scan.
pub fn is_dir_or_symlink_to_dir(base_dir: &Path, entry: &fs::DirEntry) -> io::Result<bool> {
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
        return Ok(true);
    }
    if !file_type.is_symlink() {
        return Ok(false);
    }
    let resolved = fs::metadata(base_dir.join(entry.file_name()))?;
    Ok(resolved.is_dir())
}

/// True if the directory must be excluded from scanning: hidden names
/// (leading `.`, but not `..` so album names starting with an ellipsis
/// survive), the recycle bin, or a marker file inside the directory.
pub fn is_dir_ignored(base_dir: &Path, name: &str, skip_scan_file: &str) -> bool {
    if name.starts_with('.') && !name.starts_with("..") {
        return true;
    }
    if name.eq_ignore_ascii_case(RECYCLE_BIN) {
        return true;
    }
    // One extra stat per candidate subdirectory
    fs::symlink_metadata(base_dir.join(name).join(skip_scan_file)).is_ok()
}

/// True if the directory can be opened for reading. The handle is dropped
/// immediately; this is a permission probe, not a traversal.
pub fn is_dir_readable(base_dir: &Path, name: &str) -> bool {
    fs::read_dir(base_dir.join(name)).is_ok()
}
