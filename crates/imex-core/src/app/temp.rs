//! Temp files for export output.
//!
//! An export is written to `<base>-<yyyyMMddHHmmss><.ext>` in the scratch
//! directory, pushed to the station, and deleted no matter how the job ended.
//! A file that cannot be deleted right away is parked in the store's deferred
//! list and retried later, at the latest when the store itself is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::ports::Clock;

const DEFAULT_EXTENSION: &str = ".tmp";
const DEFAULT_BASE_NAME: &str = "export";
const MAX_NAME_ATTEMPTS: usize = 1000;

type Deferred = Arc<Mutex<Vec<PathBuf>>>;

/// Factory for uniquely named scratch files.
pub struct TempStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    deferred: Deferred,
}

impl TempStore {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
            deferred: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty file named after `target_name`.
    pub fn create(&self, target_name: &str) -> io::Result<TempArtifact> {
        let (base, extension) = split_name(target_name);
        let stamp = self.clock.now().format("%Y%m%d%H%M%S").to_string();
        fs::create_dir_all(&self.dir)?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{base}-{stamp}{extension}")
            } else {
                format!("{base}-{stamp}-{attempt}{extension}")
            };
            let path = self.dir.join(&file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "created temp file");
                    return Ok(TempArtifact {
                        path,
                        file_name,
                        deferred: Arc::clone(&self.deferred),
                        removed: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free temp file name for {target_name}"),
        ))
    }

    /// Paths whose deletion is still pending.
    pub fn deferred(&self) -> Vec<PathBuf> {
        lock(&self.deferred).clone()
    }

    /// Try again to delete parked files. Returns how many are still left.
    pub fn retry_deferred(&self) -> usize {
        let mut pending = lock(&self.deferred);
        pending.retain(|path| !try_remove(path));
        pending.len()
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        let left = self.retry_deferred();
        if left > 0 {
            warn!(left, "temp files could not be deleted");
        }
    }
}

/// A scratch file that deletes itself when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    file_name: String,
    deferred: Deferred,
    removed: bool,
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Open for writing from the start.
    pub fn writer(&self) -> io::Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(BufWriter::new(file))
    }

    pub fn reader(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Delete now. Returns `false` when deletion was deferred.
    pub fn remove(mut self) -> bool {
        self.remove_inner()
    }

    fn remove_inner(&mut self) -> bool {
        if self.removed {
            return true;
        }
        self.removed = true;

        debug!(path = %self.path.display(), "deleting temp file");
        if try_remove(&self.path) {
            return true;
        }
        lock(&self.deferred).push(self.path.clone());
        false
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.remove_inner();
    }
}

fn try_remove(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to delete temp file");
            false
        }
    }
}

fn lock(deferred: &Deferred) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
    deferred.lock().unwrap_or_else(|e| e.into_inner())
}

/// `"dir/orders.csv"` -> `("orders", ".csv")`; no extension -> `".tmp"`.
fn split_name(target_name: &str) -> (String, String) {
    let path = Path::new(target_name);
    let base = path
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().trim().to_string())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    (base, extension)
}
