//! Folder store: the persistent record of per-folder update times
//!
//! The scanner core only reads the store, once per library, to build its
//! scan context. The write path (`record_folders`) belongs to the
//! downstream consumer; the CLI uses it so consecutive runs are
//! incremental.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ScanError;
use crate::models::{FolderEntry, Library};

/// Read interface the scanner needs from the persistent store
pub trait FolderStore: Send {
    /// All folder ids of one library with their last recorded update
    /// times, in a single query. Failure returns an error, never partial
    /// data.
    fn folder_update_times(
        &self,
        library: &Library,
    ) -> Result<HashMap<String, DateTime<Utc>>, ScanError>;
}

/// SQLite-backed folder store
pub struct SqliteFolderStore {
    conn: Connection,
}

impl SqliteFolderStore {
    /// Open or create the database
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS folders (
                id TEXT PRIMARY KEY,
                library_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_folders_library ON folders(library_id);
            CREATE INDEX IF NOT EXISTS idx_folders_updated_at ON folders(updated_at);
            ",
        )?;
        Ok(())
    }

    /// Batch upsert of emitted folders, recorded as updated at `at`
    pub fn record_folders(
        &mut self,
        folders: &[FolderEntry],
        at: DateTime<Utc>,
    ) -> SqliteResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO folders (id, library_id, path, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for folder in folders {
                // Normalize path separators for cross-platform consistency
                let path_str = folder.path.to_string_lossy().replace('\\', "/");
                stmt.execute(params![
                    folder.id,
                    folder.library_id,
                    path_str,
                    at.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Record a single folder id at an explicit update time
    pub fn record_update_time(
        &mut self,
        library: &Library,
        id: &str,
        path: &Path,
        at: DateTime<Utc>,
    ) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO folders (id, library_id, path, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                library.id,
                path.to_string_lossy().replace('\\', "/"),
                at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Get the total folder count across all libraries
    pub fn folder_count(&self) -> SqliteResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl FolderStore for SqliteFolderStore {
    fn folder_update_times(
        &self,
        library: &Library,
    ) -> Result<HashMap<String, DateTime<Utc>>, ScanError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, updated_at FROM folders WHERE library_id = ?1")?;

        let rows = stmt.query_map([library.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut index = HashMap::new();
        for row in rows {
            let (id, millis) = row.map_err(ScanError::from)?;
            let updated_at =
                DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH);
            index.insert(id, updated_at);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::folder_id;
    use std::path::PathBuf;

    fn entry(library: &Library, path: &str) -> FolderEntry {
        FolderEntry::new(library, Path::new(path))
    }

    #[test]
    fn test_record_and_load_roundtrip() {
        let lib = Library::new(1, "Music", "/music");
        let mut store = SqliteFolderStore::open_memory().unwrap();

        let folders = vec![entry(&lib, "/music/A"), entry(&lib, "/music/B")];
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        store.record_folders(&folders, at).unwrap();

        let index = store.folder_update_times(&lib).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index[&folders[0].id], at);
        assert_eq!(index[&folders[1].id], at);
    }

    #[test]
    fn test_snapshot_scoped_to_library() {
        let music = Library::new(1, "Music", "/music");
        let books = Library::new(2, "Audiobooks", "/books");
        let mut store = SqliteFolderStore::open_memory().unwrap();

        let at = Utc::now();
        store.record_folders(&[entry(&music, "/music/A")], at).unwrap();
        store.record_folders(&[entry(&books, "/books/B")], at).unwrap();

        assert_eq!(store.folder_update_times(&music).unwrap().len(), 1);
        assert_eq!(store.folder_update_times(&books).unwrap().len(), 1);
        assert_eq!(store.folder_count().unwrap(), 2);
    }

    #[test]
    fn test_upsert_replaces_update_time() {
        let lib = Library::new(1, "Music", "/music");
        let mut store = SqliteFolderStore::open_memory().unwrap();

        let folder = entry(&lib, "/music/Album");
        let first = DateTime::from_timestamp_millis(1_000).unwrap();
        let second = DateTime::from_timestamp_millis(2_000).unwrap();
        store.record_folders(std::slice::from_ref(&folder), first).unwrap();
        store.record_folders(std::slice::from_ref(&folder), second).unwrap();

        let index = store.folder_update_times(&lib).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[&folder.id], second);
    }

    #[test]
    fn test_record_update_time_single() {
        let lib = Library::new(1, "Music", "/music");
        let mut store = SqliteFolderStore::open_memory().unwrap();

        let path = PathBuf::from("/music/Album");
        let id = folder_id(&lib, &path);
        let at = DateTime::from_timestamp_millis(42_000).unwrap();
        store.record_update_time(&lib, &id, &path, at).unwrap();

        let index = store.folder_update_times(&lib).unwrap();
        assert_eq!(index[&id], at);
    }

    #[test]
    fn test_empty_snapshot() {
        let lib = Library::new(9, "Empty", "/empty");
        let store = SqliteFolderStore::open_memory().unwrap();
        assert!(store.folder_update_times(&lib).unwrap().is_empty());
    }
}
