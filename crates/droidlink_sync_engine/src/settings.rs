//! Persisted key-value settings outside the event table.
//!
//! Settings are read with [`SettingsStore::load`] and changed through a
//! [`SettingsEditor`], which holds the store's edit lock for its lifetime
//! and saves on [`commit`](SettingsEditor::commit) or, failing that, when
//! dropped.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Local settings of this installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Selected user account.
    pub account: Option<String>,
    /// Identifier of this device for the selected account.
    pub device_id: Option<String>,
    /// Human readable device name.
    pub device_name: Option<String>,
    /// Push registration token.
    pub push_token: Option<String>,
    /// End of the last sync cycle, in epoch milliseconds.
    pub last_sync: i64,
    /// Last sync token generated by this device.
    pub sync_token: Option<String>,
    /// Device identifier assigned to each account used so far.
    pub account_device_ids: BTreeMap<String, String>,
    /// Whether the current device registration reached the server.
    pub registration_done: bool,
    /// Events received since the user last looked at the list.
    pub unread_events: u32,
    /// Whether the event list is on screen.
    pub event_list_visible: bool,
}

/// Storage for [`Settings`].
pub trait SettingsStore: Send + Sync {
    /// Reads the current settings.
    fn load(&self) -> SyncResult<Settings>;

    /// Replaces the stored settings.
    fn save(&self, settings: &Settings) -> SyncResult<()>;

    /// Serializes editors; held by [`SettingsEditor`].
    fn edit_lock(&self) -> MutexGuard<'_, ()>;
}

/// A scoped edit of the settings.
///
/// Dereferences to [`Settings`]. Changes are saved by [`commit`](Self::commit);
/// an editor dropped with unsaved changes saves them itself and logs a
/// failure, so every exit path flushes.
pub struct SettingsEditor<'a> {
    store: &'a dyn SettingsStore,
    settings: Settings,
    dirty: bool,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> SettingsEditor<'a> {
    /// Acquires the edit lock of `store` and loads the settings.
    pub fn begin(store: &'a dyn SettingsStore) -> SyncResult<Self> {
        let guard = store.edit_lock();
        let settings = store.load()?;
        Ok(Self {
            store,
            settings,
            dirty: false,
            _guard: guard,
        })
    }

    /// Saves the changes and releases the lock.
    pub fn commit(mut self) -> SyncResult<()> {
        self.flush()
    }

    fn flush(&mut self) -> SyncResult<()> {
        if self.dirty {
            self.store.save(&self.settings)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Deref for SettingsEditor<'_> {
    type Target = Settings;

    fn deref(&self) -> &Settings {
        &self.settings
    }
}

impl DerefMut for SettingsEditor<'_> {
    fn deref_mut(&mut self) -> &mut Settings {
        self.dirty = true;
        &mut self.settings
    }
}

impl Drop for SettingsEditor<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to save settings");
        }
    }
}

/// Settings held in memory only.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
    lock: Mutex<()>,
}

impl MemorySettingsStore {
    /// Creates a store with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `settings`.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            lock: Mutex::new(()),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> SyncResult<Settings> {
        Ok(self.settings.read().clone())
    }

    fn save(&self, settings: &Settings) -> SyncResult<()> {
        *self.settings.write() = settings.clone();
        Ok(())
    }

    fn edit_lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

/// Settings persisted as a JSON file.
///
/// Saves write a temporary file and rename it over the target.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    /// Uses the file at `path`; it is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> SyncResult<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let data = fs::read(&self.path).map_err(|e| settings_error(&self.path, e))?;
        serde_json::from_slice(&data).map_err(|e| settings_error(&self.path, e))
    }

    fn save(&self, settings: &Settings) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| settings_error(parent, e))?;
            }
        }

        let data = serde_json::to_vec_pretty(settings).map_err(|e| settings_error(&self.path, e))?;
        let temp = self.temp_path();
        let mut file = File::create(&temp).map_err(|e| settings_error(&temp, e))?;
        file.write_all(&data)
            .and_then(|()| file.sync_all())
            .map_err(|e| settings_error(&temp, e))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|e| settings_error(&self.path, e))
    }

    fn edit_lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

fn settings_error(path: &Path, err: impl std::fmt::Display) -> SyncError {
    SyncError::Settings(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn commit_saves() {
        let store = MemorySettingsStore::new();
        let mut editor = SettingsEditor::begin(&store).unwrap();
        editor.account = Some("me@example.com".into());
        editor.commit().unwrap();

        assert_eq!(store.load().unwrap().account.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn drop_flushes_pending_changes() {
        let store = MemorySettingsStore::new();
        {
            let mut editor = SettingsEditor::begin(&store).unwrap();
            editor.last_sync = 42;
        }
        assert_eq!(store.load().unwrap().last_sync, 42);
    }

    #[test]
    fn read_only_editor_does_not_save() {
        struct Failing(Mutex<()>);
        impl SettingsStore for Failing {
            fn load(&self) -> SyncResult<Settings> {
                Ok(Settings::default())
            }
            fn save(&self, _: &Settings) -> SyncResult<()> {
                Err(SyncError::Settings("read-only".into()))
            }
            fn edit_lock(&self) -> MutexGuard<'_, ()> {
                self.0.lock()
            }
        }

        let store = Failing(Mutex::new(()));
        let editor = SettingsEditor::begin(&store).unwrap();
        assert_eq!(editor.last_sync, 0);
        assert!(editor.commit().is_ok());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("conf").join("settings.json"));
        assert_eq!(store.load().unwrap(), Settings::default());

        let mut settings = Settings {
            sync_token: Some("tok".into()),
            last_sync: 7,
            ..Settings::default()
        };
        settings
            .account_device_ids
            .insert("me@example.com".into(), "device-1".into());
        store.save(&settings).unwrap();

        let reopened = FileSettingsStore::new(store.path());
        assert_eq!(reopened.load().unwrap(), settings);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn missing_keys_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, br#"{"account": "me@example.com"}"#).unwrap();

        let settings = FileSettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.account.as_deref(), Some("me@example.com"));
        assert_eq!(settings.last_sync, 0);
        assert!(!settings.registration_done);
    }
}
