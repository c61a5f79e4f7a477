//! Library Scanner CLI
//!
//! Incremental folder scanner for media libraries: emits the directories
//! that changed since the last run and records them back into the folder
//! store.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use library_scanner::{
    scan_folders, CancelToken, FolderEntry, LogObserver, ProgressReporter, ScanConfig,
    ScanObserver, SqliteFolderStore, DEFAULT_DB_FILE, DEFAULT_SKIP_SCAN_FILE,
};

const ABOUT: &str = r#"
Library Scanner - incremental media library folder scanner

Examples:
  library_scanner scan -r /srv/media/Music                 scan one library
  library_scanner scan -r /music -r /audiobooks            scan two libraries
  library_scanner scan -r /music --full-rescan             re-emit every folder
  library_scanner scan -r /music --json                    JSON output
  library_scanner scan -r /music -d folders.db             choose the store file
  library_scanner scan -r /music --dry-run                 do not record results
"#;

/// Incremental media library folder scanner
#[derive(Parser)]
#[command(name = "library_scanner")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan library roots for changed folders
    Scan {
        /// Library root directory (may be given multiple times)
        #[arg(short = 'r', long = "root", required = true)]
        roots: Vec<PathBuf>,

        /// Folder store database file
        #[arg(short = 'd', long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,

        /// Emit every visited folder regardless of recorded update times
        #[arg(short = 'f', long)]
        full_rescan: bool,

        /// Marker file name that excludes a directory subtree
        #[arg(long, default_value = DEFAULT_SKIP_SCAN_FILE)]
        skip_file: String,

        /// Output the emitted folders and summary as JSON
        #[arg(long)]
        json: bool,

        /// Emit machine-readable progress messages on stderr
        #[arg(long)]
        progress: bool,

        /// Do not record emitted folders back into the store
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Scan {
            roots,
            db,
            full_rescan,
            skip_file,
            json,
            progress,
            dry_run,
        }) => {
            let mut builder = ScanConfig::builder()
                .full_rescan(full_rescan)
                .skip_scan_file(skip_file)
                .db_path(db.clone());
            for root in roots {
                builder = builder.add_root(root);
            }
            let config = builder.build();

            info!("Starting folder scan of {} libraries...", config.libraries.len());

            let store = match SqliteFolderStore::open(&db) {
                Ok(store) => store,
                Err(err) => {
                    error!("Cannot open folder store {:?}: {}", db, err);
                    std::process::exit(1);
                }
            };

            let observer: Arc<dyn ScanObserver> = if progress {
                Arc::new(ProgressReporter::new(true, 200))
            } else {
                Arc::new(LogObserver)
            };

            let libraries = config.libraries.clone();
            let mut stream = scan_folders(config, Box::new(store), observer, CancelToken::new());

            let mut folders: Vec<FolderEntry> = Vec::new();
            for folder in stream.by_ref() {
                if !json {
                    println!("{}", folder.path.display());
                }
                folders.push(folder);
            }
            let summary = stream.finish();

            if !dry_run && !folders.is_empty() {
                match SqliteFolderStore::open(&db) {
                    Ok(mut store) => {
                        if let Err(err) = store.record_folders(&folders, chrono::Utc::now()) {
                            error!("Failed to record scanned folders: {}", err);
                        }
                    }
                    Err(err) => error!("Cannot reopen folder store {:?}: {}", db, err),
                }
            }

            if json {
                let output = serde_json::json!({
                    "libraries": libraries,
                    "folders": folders,
                    "summary": summary,
                });
                match serde_json::to_string_pretty(&output) {
                    Ok(text) => println!("{}", text),
                    Err(err) => error!("Failed to serialize scan output: {}", err),
                }
            } else {
                println!("Scan completed:");
                println!("  Folders visited: {}", summary.folders_visited);
                println!("  Folders emitted: {}", summary.folders_emitted);
                println!("  Libraries scanned: {}", summary.libraries_scanned);
                println!("  Libraries skipped: {}", summary.libraries_skipped);
                println!("  Duration: {}ms", summary.duration_ms);
            }
        }
        None => {
            println!("{}", ABOUT);
            println!("Use 'library_scanner scan -h' for the scan command's options");
        }
    }
}
