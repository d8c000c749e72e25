//! Checkpoint directory management with bounded rotation.
//!
//! A checkpoint directory holds one `init.json` snapshot (the grid seed)
//! and a rotating set of `iter-N.json` iteration snapshots. Rotation is
//! driven by an explicit ordered ring of iteration identifiers with an
//! oldest-evicted-first policy — eviction order never depends on filesystem
//! listing order. On open, the ring is rebuilt from the numeric identifiers
//! embedded in the file names, sorted ascending.
//!
//! Missing files are not errors: a missing `init.json` means "initialize
//! fresh", a missing latest snapshot means "start from the seed". Writes
//! are atomic (temp file in the same directory, then rename) so a crash
//! mid-write never leaves a corrupt snapshot behind.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

const INIT_FILE: &str = "init.json";
const ITER_PREFIX: &str = "iter-";
const ITER_SUFFIX: &str = ".json";

/// An ordered ring of iteration snapshots plus one init snapshot.
#[derive(Debug)]
pub struct CheckpointRing {
    dir: PathBuf,
    keep_latest: usize,
    /// Iteration ids with snapshots on disk, oldest first.
    ring: VecDeque<u64>,
}

impl CheckpointRing {
    /// Opens (creating if necessary) a checkpoint directory, rebuilding the
    /// rotation ring from the snapshots already present.
    ///
    /// `keep_latest` bounds how many iteration snapshots are retained; it
    /// is clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] when the directory cannot be created
    /// or scanned.
    pub fn open(dir: impl AsRef<Path>, keep_latest: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::Checkpoint(e.to_string()))?;

        let mut ids: Vec<u64> = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| Error::Checkpoint(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::Checkpoint(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = parse_iteration_id(name) {
                ids.push(id);
            }
        }
        // Ring order is defined by the identifiers, not by listing order.
        ids.sort_unstable();

        Ok(Self {
            dir,
            keep_latest: keep_latest.max(1),
            ring: ids.into(),
        })
    }

    /// Loads the init snapshot, or `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] when the file exists but cannot be
    /// read or parsed.
    pub fn load_init<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        read_json_opt(&self.dir.join(INIT_FILE))
    }

    /// Writes the init snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] on I/O or serialization failure.
    pub fn save_init<T: Serialize>(&self, state: &T) -> Result<()> {
        let path = self.dir.join(INIT_FILE);
        write_json_atomic(&path, state)?;
        tracing::debug!(path = %path.display(), "init snapshot written");
        Ok(())
    }

    /// Writes the snapshot for `iteration` atomically and evicts the oldest
    /// snapshots until at most `keep_latest` remain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] on I/O or serialization failure.
    pub fn save_iteration<T: Serialize>(&mut self, iteration: u64, state: &T) -> Result<()> {
        let path = self.iteration_path(iteration);
        write_json_atomic(&path, state)?;
        tracing::debug!(iteration, path = %path.display(), "iteration snapshot written");

        if self.ring.back() != Some(&iteration) {
            self.ring.push_back(iteration);
        }
        while self.ring.len() > self.keep_latest {
            // Oldest first, regardless of how the directory lists files.
            if let Some(old) = self.ring.pop_front() {
                let old_path = self.iteration_path(old);
                let _ = fs::remove_file(&old_path);
                tracing::debug!(iteration = old, "iteration snapshot evicted");
            }
        }
        Ok(())
    }

    /// Loads the most recent iteration snapshot, or `None` if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] when the newest snapshot exists but
    /// cannot be read or parsed.
    pub fn load_latest<T: DeserializeOwned>(&self) -> Result<Option<(u64, T)>> {
        let Some(&latest) = self.ring.back() else {
            return Ok(None);
        };
        let state = read_json_opt(&self.iteration_path(latest))?;
        Ok(state.map(|s| (latest, s)))
    }

    /// Iteration ids currently retained, oldest first.
    #[must_use]
    pub fn retained(&self) -> Vec<u64> {
        self.ring.iter().copied().collect()
    }

    fn iteration_path(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("{ITER_PREFIX}{iteration}{ITER_SUFFIX}"))
    }
}

fn parse_iteration_id(name: &str) -> Option<u64> {
    name.strip_prefix(ITER_PREFIX)?
        .strip_suffix(ITER_SUFFIX)?
        .parse()
        .ok()
}

/// Atomic write: temp file in the same directory, then rename. Prevents
/// corrupt snapshots if the process crashes mid-write.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, state: &T) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    let file = fs::File::create(&tmp_path).map_err(|e| Error::Checkpoint(e.to_string()))?;
    serde_json::to_writer(file, state).map_err(|e| Error::Checkpoint(e.to_string()))?;
    fs::rename(&tmp_path, path).map_err(|e| Error::Checkpoint(e.to_string()))
}

pub(crate) fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Checkpoint(e.to_string())),
    };
    let state =
        serde_json::from_reader(file).map_err(|e| Error::Checkpoint(e.to_string()))?;
    Ok(Some(state))
}
