//! Scanner module - incremental, resilient folder discovery
//!
//! One walker thread per library performs a depth-first, post-order
//! traversal, emitting a [`FolderEntry`] for every directory whose content
//! is newer than the store's last record. Walkers hand entries to the
//! consumer over rendezvous channels, so at most one folder's listing is in
//! flight per library regardless of tree size.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::classify::{self, FileClassifier};
use crate::config::ScanConfig;
use crate::db::FolderStore;
use crate::error::ScanError;
use crate::models::{clean_path, FileEntry, FolderEntry, Library, ScanSummary};
use crate::progress::ScanObserver;

/// Cooperative cancellation signal shared across the pipeline's threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; checked cooperatively by all scan stages
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Per-library, per-run scan state
pub struct ScanContext {
    /// The library being scanned
    pub library: Library,
    /// Re-emit every visited folder
    pub full_rescan: bool,
    /// Folders visited so far, incremented by the walking thread
    num_folders: AtomicU64,
    /// Folder id -> last recorded update time, snapshotted at construction
    last_updates: HashMap<String, DateTime<Utc>>,
}

impl ScanContext {
    /// Build the context for one library, snapshotting its recorded update
    /// times from the store in a single query. The snapshot is taken once;
    /// consistency is "as of scan start", not "as of visit time".
    pub fn new(
        store: &dyn FolderStore,
        library: Library,
        full_rescan: bool,
    ) -> Result<Self, ScanError> {
        let last_updates = store
            .folder_update_times(&library)
            .map_err(|err| ScanError::library(library.name.clone(), err.message))?;
        Ok(Self {
            library,
            full_rescan,
            num_folders: AtomicU64::new(0),
            last_updates,
        })
    }

    /// Last recorded update time for a folder id; Unix epoch if never seen
    pub fn last_update_of(&self, id: &str) -> DateTime<Utc> {
        self.last_updates
            .get(id)
            .copied()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Folders visited so far
    pub fn folders_visited(&self) -> u64 {
        self.num_folders.load(Ordering::Relaxed)
    }

    fn count_folder(&self) {
        self.num_folders.fetch_add(1, Ordering::Relaxed);
    }
}

/// Accumulate entries from a listing, skipping the ones that error out.
///
/// The listing is allowed to keep failing as long as it keeps failing
/// differently; the same message twice in a row means it is stuck (seen on
/// some network filesystems) and the read stops with whatever was
/// accumulated before the repeat.
fn collect_entries<E>(
    cancel: &CancelToken,
    observer: &dyn ScanObserver,
    path: &Path,
    mut entries: impl Iterator<Item = io::Result<E>>,
) -> Vec<E> {
    let mut collected = Vec::new();
    let mut prev_err: Option<String> = None;
    loop {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let Some(entry) = entries.next() else {
            break;
        };
        match entry {
            Ok(entry) => collected.push(entry),
            Err(err) => {
                let message = err.to_string();
                if prev_err.as_deref() == Some(message.as_str()) {
                    observer.warning(&ScanError::stuck_read(path.to_path_buf(), message));
                    break;
                }
                observer.warning(&ScanError::entry(path.to_path_buf(), message.clone()));
                prev_err = Some(message);
            }
        }
    }
    collected
}

/// Read a whole directory, skipping failed entries, sorted by name for
/// deterministic downstream ordering
fn full_read_dir(
    cancel: &CancelToken,
    observer: &dyn ScanObserver,
    path: &Path,
    dir: fs::ReadDir,
) -> Vec<fs::DirEntry> {
    let mut entries = collect_entries(cancel, observer, path, dir);
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    entries
}

/// Depth-first walker for one library
struct Walker {
    ctx: Arc<ScanContext>,
    classifier: Arc<FileClassifier>,
    observer: Arc<dyn ScanObserver>,
    cancel: CancelToken,
    skip_scan_file: String,
}

impl Walker {
    /// Walk one directory post-order: children first, then the emission
    /// decision for the directory itself. Only cancellation propagates;
    /// every other fault is confined and reported on the way.
    fn walk_folder(&self, path: &Path, tx: &Sender<FolderEntry>) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::cancelled());
        }
        let (mut folder, children) = match self.load_dir(path) {
            Ok(loaded) => loaded,
            Err(err) if err.is_cancellation() => return Err(err),
            Err(err) => {
                self.observer.warning(&err);
                return Ok(());
            }
        };
        for child in &children {
            self.walk_folder(child, tx)?;
        }
        self.ctx.count_folder();

        if !folder.is_outdated() && !self.ctx.full_rescan {
            return Ok(());
        }
        folder.path = clean_path(path);
        // A failed send means the consumer dropped the stream; unwind
        // without emitting further entries
        tx.send(folder).map_err(|_| ScanError::cancelled())
    }

    /// Load one directory: classify its files, fold modification times,
    /// and collect the subdirectories to recurse into
    fn load_dir(&self, dir_path: &Path) -> Result<(FolderEntry, Vec<PathBuf>), ScanError> {
        let mut folder = FolderEntry::new(&self.ctx.library, dir_path);
        folder.upd_time = self.ctx.last_update_of(&folder.id);

        let dir_info = fs::metadata(dir_path)
            .map_err(|err| ScanError::subtree(dir_path.to_path_buf(), err))?;
        folder.mod_time = mod_time_of(&dir_info);

        let dir = fs::read_dir(dir_path)
            .map_err(|err| ScanError::subtree(dir_path.to_path_buf(), err))?;

        let mut children = Vec::new();
        for entry in full_read_dir(&self.cancel, self.observer.as_ref(), dir_path, dir) {
            if self.cancel.is_cancelled() {
                return Err(ScanError::cancelled());
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = match classify::is_dir_or_symlink_to_dir(dir_path, &entry) {
                Ok(is_dir) => is_dir,
                Err(err) => {
                    self.observer.warning(&ScanError::broken_symlink(
                        dir_path.join(&name),
                        err.to_string(),
                    ));
                    continue;
                }
            };
            if is_dir {
                if classify::is_dir_ignored(dir_path, &name, &self.skip_scan_file) {
                    continue;
                }
                if !classify::is_dir_readable(dir_path, &name) {
                    self.observer
                        .warning(&ScanError::unreadable_dir(dir_path.join(&name)));
                    continue;
                }
                children.push(dir_path.join(&name));
            } else {
                let info = match entry.metadata() {
                    Ok(info) => info,
                    Err(err) => {
                        self.observer
                            .warning(&ScanError::entry(dir_path.join(&name), err.to_string()));
                        continue;
                    }
                };
                let modified = mod_time_of(&info);
                if modified > folder.mod_time {
                    folder.mod_time = modified;
                }
                let file = FileEntry::new(name.clone(), info.len(), modified);
                if self.classifier.is_audio_file(&name) {
                    folder.audio_files.insert(name, file);
                } else if self.classifier.is_playlist(&name) {
                    folder.playlists.push(file);
                } else if self.classifier.is_image_file(&name) {
                    if modified > folder.images_updated_at {
                        folder.images_updated_at = modified;
                    }
                    folder.image_files.insert(name, file);
                }
            }
        }
        Ok((folder, children))
    }
}

fn mod_time_of(meta: &fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::from)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Lazy stream of folders needing re-indexing, across all configured
/// libraries.
///
/// Iteration blocks until the next folder is available; dropping the stream
/// mid-run cancels the pipeline.
pub struct FolderStream {
    rx: Receiver<FolderEntry>,
    driver: Option<JoinHandle<ScanSummary>>,
    builder: Option<JoinHandle<()>>,
}

impl Iterator for FolderStream {
    type Item = FolderEntry;

    fn next(&mut self) -> Option<FolderEntry> {
        self.rx.recv().ok()
    }
}

impl FolderStream {
    /// Drain any remaining entries and return the run summary
    pub fn finish(mut self) -> ScanSummary {
        for _ in self.by_ref() {}
        if let Some(builder) = self.builder.take() {
            let _ = builder.join();
        }
        match self.driver.take() {
            Some(driver) => match driver.join() {
                Ok(summary) => summary,
                Err(_) => {
                    log::error!("Scanner: driver thread panicked");
                    ScanSummary::default()
                }
            },
            None => ScanSummary::default(),
        }
    }
}

/// Scan all configured libraries, producing the ordered stream of folders
/// that need re-indexing (every visited folder on a forced full rescan).
///
/// Scan contexts are built on their own thread and queued; libraries are
/// walked and drained strictly one at a time, in the order their contexts
/// become available. Every channel past the context queue is a rendezvous
/// channel, so the walkers block until the caller consumes - memory stays
/// bounded to one in-flight folder per stage.
pub fn scan_folders(
    config: ScanConfig,
    store: Box<dyn FolderStore>,
    observer: Arc<dyn ScanObserver>,
    cancel: CancelToken,
) -> FolderStream {
    let started = Instant::now();
    observer.scan_started(&config.libraries, config.full_rescan);

    let (ctx_tx, ctx_rx) = bounded::<Arc<ScanContext>>(config.libraries.len().max(1));
    let skipped = Arc::new(AtomicU64::new(0));

    // Context construction runs on its own thread, feeding the context
    // queue while earlier libraries are still draining
    let builder = {
        let observer = Arc::clone(&observer);
        let cancel = cancel.clone();
        let libraries = config.libraries.clone();
        let full_rescan = config.full_rescan;
        let skipped = Arc::clone(&skipped);
        thread::spawn(move || {
            for library in libraries {
                if cancel.is_cancelled() {
                    break;
                }
                match ScanContext::new(store.as_ref(), library, full_rescan) {
                    Ok(ctx) => {
                        if ctx_tx.send(Arc::new(ctx)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        observer.warning(&err);
                        skipped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        })
    };

    let (out_tx, out_rx) = bounded::<FolderEntry>(0);
    let driver = {
        let observer = Arc::clone(&observer);
        let classifier = Arc::new(config.classifier.clone());
        let skip_scan_file = config.skip_scan_file.clone();
        thread::spawn(move || {
            let mut summary = ScanSummary::default();
            for ctx in ctx_rx.iter() {
                if cancel.is_cancelled() {
                    break;
                }
                let (folder_tx, folder_rx) = bounded::<FolderEntry>(0);
                let walker = Walker {
                    ctx: Arc::clone(&ctx),
                    classifier: Arc::clone(&classifier),
                    observer: Arc::clone(&observer),
                    cancel: cancel.clone(),
                    skip_scan_file: skip_scan_file.clone(),
                };
                let root = ctx.library.path.clone();
                let handle = thread::spawn(move || {
                    if let Err(err) = walker.walk_folder(&root, &folder_tx) {
                        if !err.is_cancellation() {
                            walker.observer.warning(&err);
                        }
                    }
                });

                let mut consumer_gone = false;
                for folder in folder_rx.iter() {
                    observer.folder_found(&folder);
                    if out_tx.send(folder).is_err() {
                        cancel.cancel();
                        consumer_gone = true;
                        break;
                    }
                    summary.folders_emitted += 1;
                }
                if consumer_gone {
                    // Unblock a walker still parked on its send
                    drop(folder_rx);
                    let _ = handle.join();
                    break;
                }
                let _ = handle.join();
                summary.folders_visited += ctx.folders_visited();
                summary.libraries_scanned += 1;
                observer.library_scanned(&ctx.library, ctx.folders_visited());
            }
            summary.libraries_skipped = skipped.load(Ordering::Relaxed);
            summary.duration_ms = started.elapsed().as_millis() as u64;
            observer.scan_finished(&summary);
            summary
        })
    };

    FolderStream {
        rx: out_rx,
        driver: Some(driver),
        builder: Some(builder),
    }
}
