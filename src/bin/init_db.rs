//! Creates a fresh snapshot ledger, optionally seeded from a JSON dataset.
//!
//! ```text
//! init-db [--file covid19.db] [--overwrite] [--data dataset.json]
//! ```
//! The dataset is `{ "data": [ { "date": "MMDDYYYY", "total_cases": "1", ... } ] }`;
//! every key must be present and unknown counts may be `""` or `null`.

use std::path::{Path, PathBuf};
use std::{env, fs, io, process};

use covid19_updater::snapshot::load_dataset;
use covid19_updater::store::SnapshotStore;

const EXIT_FILE_EXISTS: i32 = 1;
const EXIT_BAD_DATASET: i32 = 2;
const EXIT_USAGE: i32 = 64;

struct Params {
    file: PathBuf,
    overwrite: bool,
    dataset: Option<PathBuf>,
}

fn parse_args() -> Result<Params, String> {
    let mut params = Params {
        file: PathBuf::from("covid19.db"),
        overwrite: false,
        dataset: None,
    };
    let mut args = env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "-f" | "--file" => {
                params.file = PathBuf::from(args.next().ok_or("Missing value for --file")?)
            }
            "--overwrite" => params.overwrite = true,
            "-d" | "--data" => {
                params.dataset = Some(PathBuf::from(
                    args.next().ok_or("Missing value for --data")?,
                ))
            }
            "-h" | "--help" => {
                println!("usage: init-db [--file PATH] [--overwrite] [--data DATASET.json]");
                process::exit(0);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }
    Ok(params)
}

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let params = match parse_args() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("{e}");
            process::exit(EXIT_USAGE);
        }
    };

    tracing::info!(
        file = %params.file.display(),
        overwrite = params.overwrite,
        dataset = ?params.dataset,
        "creating ledger"
    );

    match run(&params) {
        Ok(rows) => tracing::info!(rows, "done! ledger created: {}", params.file.display()),
        Err(code) => process::exit(code),
    }
}

/// Create (and optionally seed) the ledger. Returns the seeded row count,
/// or the exit code after logging what went wrong.
fn run(params: &Params) -> Result<usize, i32> {
    // Parse before touching anything so a bad dataset leaves any existing
    // ledger in place.
    let rows = match params.dataset.as_deref().map(load_dataset).transpose() {
        Ok(rows) => rows.unwrap_or_default(),
        Err(e) => {
            tracing::error!("problem reading dataset: {e:#}");
            return Err(EXIT_BAD_DATASET);
        }
    };

    if params.file.exists() {
        if !params.overwrite {
            tracing::error!("file already exists; pass --overwrite to replace it");
            return Err(EXIT_FILE_EXISTS);
        }
        tracing::info!("removing existing file");
        if let Err(e) = remove_ledger(&params.file) {
            tracing::error!("cannot remove existing file: {e}");
            return Err(EXIT_FILE_EXISTS);
        }
    }

    let mut store = match SnapshotStore::open(&params.file) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("cannot create ledger: {e}");
            return Err(EXIT_BAD_DATASET);
        }
    };

    if !rows.is_empty() {
        if let Err(e) = store.seed(&rows) {
            tracing::error!("problem seeding dataset: {e}");
            drop(store);
            let _ = remove_ledger(&params.file);
            return Err(EXIT_BAD_DATASET);
        }
    }
    Ok(rows.len())
}

/// The database file plus any WAL sidecars SQLite left next to it.
fn remove_ledger(file: &Path) -> io::Result<()> {
    fs::remove_file(file)?;
    for suffix in ["-wal", "-shm"] {
        let mut side = file.as_os_str().to_owned();
        side.push(suffix);
        match fs::remove_file(&side) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
    }
    Ok(())
}
