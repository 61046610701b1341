//! Durable snapshot file for the event table.
//!
//! Directory layout:
//!
//! ```text
//! <store_dir>/
//! ├─ LOCK              # Advisory lock, one writer process
//! └─ events.json       # Full table snapshot
//! ```
//!
//! Every commit rewrites `events.json` through a temporary file and an
//! atomic rename, so a crash leaves either the old or the new table.

use crate::error::{StoreError, StoreResult};
use crate::event::Event;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "events.json";
const SNAPSHOT_TEMP: &str = "events.json.tmp";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    version: u32,
    events: Vec<Event>,
}

/// Holds the store directory lock and reads/writes the snapshot.
#[derive(Debug)]
pub(crate) struct SnapshotFile {
    dir: PathBuf,
    _lock_file: File,
}

impl SnapshotFile {
    /// Opens (creating if needed) the store directory and takes its lock.
    pub(crate) fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Path of the store directory.
    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the snapshot; an absent file is an empty table.
    pub(crate) fn load(&self) -> StoreResult<Vec<Event>> {
        let path = self.dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&path)?;
        let body: SnapshotBody = serde_json::from_slice(&data)?;
        if body.version != FORMAT_VERSION {
            return Err(StoreError::Corrupted(format!(
                "unsupported snapshot version {}",
                body.version
            )));
        }
        Ok(body.events)
    }

    /// Atomically replaces the snapshot with `events`.
    pub(crate) fn write<'a>(&self, events: impl Iterator<Item = &'a Event>) -> StoreResult<()> {
        let body = SnapshotBody {
            version: FORMAT_VERSION,
            events: events.cloned().collect(),
        };
        let data = serde_json::to_vec(&body)?;

        let temp_path = self.dir.join(SNAPSHOT_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.dir.join(SNAPSHOT_FILE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, NewEvent};
    use tempfile::tempdir;

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::open(dir.path()).unwrap();
        assert!(snapshot.load().unwrap().is_empty());
    }

    #[test]
    fn write_then_load() {
        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::open(dir.path()).unwrap();
        let event = NewEvent::new("d", EventType::MissedCall)
            .with_id("e1")
            .into_event(42)
            .unwrap();

        snapshot.write(std::iter::once(&event)).unwrap();
        assert_eq!(snapshot.load().unwrap(), vec![event]);
        assert!(!dir.path().join(SNAPSHOT_TEMP).exists());
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = SnapshotFile::open(dir.path()).unwrap();
        assert!(matches!(
            SnapshotFile::open(dir.path()),
            Err(StoreError::Locked)
        ));
    }

    #[test]
    fn corrupted_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE), b"not json").unwrap();
        let snapshot = SnapshotFile::open(dir.path()).unwrap();
        assert!(matches!(snapshot.load(), Err(StoreError::Corrupted(_))));
    }
}
