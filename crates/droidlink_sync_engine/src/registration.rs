//! Device identity and registration.

use crate::error::{SyncError, SyncResult};
use crate::settings::{SettingsEditor, SettingsStore};
use crate::transport::SyncTransport;
use droidlink_sync_protocol::DeviceRegistration;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Name given to a device that has none.
pub const DEFAULT_DEVICE_NAME: &str = "DroidLink device";

/// Receives device registration requests from the engine.
///
/// Implementations must return without running a sync cycle.
pub trait DeviceRegistrar: Send + Sync {
    /// Asks for the device record to be uploaded; `force` uploads even if a
    /// previous registration succeeded.
    fn request_registration(&self, force: bool);
}

/// A registrar that ignores every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

impl DeviceRegistrar for NoopRegistrar {
    fn request_registration(&self, _force: bool) {}
}

/// The account, device id and name this installation syncs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Selected account.
    pub account: String,
    /// Device identifier for the account.
    pub device_id: String,
    /// Device name.
    pub device_name: String,
}

impl DeviceIdentity {
    /// Selects `account` and makes sure it has a device id and name.
    ///
    /// Each account keeps the device id it was first given. Switching to an
    /// account with a different device id clears the registration flag.
    pub fn ensure(settings: &dyn SettingsStore, account: &str) -> SyncResult<Self> {
        let account = account.trim();
        if account.is_empty() {
            return Err(SyncError::NotConfigured("account"));
        }

        let mut editor = SettingsEditor::begin(settings)?;
        if editor.device_name.is_none() {
            editor.device_name = Some(DEFAULT_DEVICE_NAME.to_string());
        }

        let device_id = match editor.account_device_ids.get(account) {
            Some(id) => id.clone(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tracing::info!(account, device_id = %id, "device identifier generated");
                editor
                    .account_device_ids
                    .insert(account.to_string(), id.clone());
                id
            }
        };

        if editor.device_id.as_deref() != Some(device_id.as_str()) {
            editor.device_id = Some(device_id.clone());
            editor.registration_done = false;
        }
        editor.account = Some(account.to_string());

        let identity = Self {
            account: account.to_string(),
            device_id,
            device_name: editor
                .device_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
        };
        editor.commit()?;
        Ok(identity)
    }

    /// Returns the configured identity, if an account and device id are set.
    pub fn current(settings: &dyn SettingsStore) -> SyncResult<Option<Self>> {
        let settings = settings.load()?;
        Ok(match (settings.account, settings.device_id) {
            (Some(account), Some(device_id)) => Some(Self {
                account,
                device_id,
                device_name: settings
                    .device_name
                    .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            }),
            _ => None,
        })
    }
}

/// Uploads the device record: `PUT /devices/{deviceId}` with `{name, c2dm}`.
pub struct RegistrationService<T: SyncTransport> {
    transport: Arc<T>,
    settings: Arc<dyn SettingsStore>,
}

impl<T: SyncTransport> RegistrationService<T> {
    /// Creates a registration service.
    pub fn new(transport: Arc<T>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Registers the device.
    ///
    /// Returns `Ok(false)` when a previous registration succeeded and
    /// `force` is false.
    pub fn register(&self, force: bool) -> SyncResult<bool> {
        let settings = self.settings.load()?;
        if settings.account.is_none() {
            return Err(SyncError::NotConfigured("account"));
        }
        let device_id = settings
            .device_id
            .ok_or(SyncError::NotConfigured("device id"))?;
        if settings.registration_done && !force {
            tracing::debug!(device_id = %device_id, "device already registered");
            return Ok(false);
        }

        let name = settings
            .device_name
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());
        let registration = DeviceRegistration::new(name, settings.push_token);
        tracing::info!(device_id = %device_id, name = %registration.name, "registering device");
        self.transport.register_device(&device_id, &registration)?;

        let mut editor = SettingsEditor::begin(self.settings.as_ref())?;
        if editor.device_id.as_deref() == Some(device_id.as_str()) {
            editor.registration_done = true;
        }
        editor.commit()?;
        Ok(true)
    }
}

/// Runs a [`RegistrationService`] on its own thread.
///
/// At most one request is pending at a time; requests arriving while one
/// is pending are merged into it.
pub struct BackgroundRegistrar {
    sender: Mutex<Option<SyncSender<()>>>,
    force: Arc<AtomicBool>,
    completed: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundRegistrar {
    /// Starts the worker thread.
    pub fn start<T: SyncTransport + 'static>(service: RegistrationService<T>) -> SyncResult<Self> {
        let (sender, receiver) = mpsc::sync_channel::<()>(1);
        let force = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicU64::new(0));

        let worker_force = force.clone();
        let worker_completed = completed.clone();
        let worker = std::thread::Builder::new()
            .name("droidlink-register".into())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    let force = worker_force.swap(false, Ordering::SeqCst);
                    match service.register(force) {
                        Ok(true) => tracing::info!("device registration done"),
                        Ok(false) => {}
                        Err(e) => tracing::warn!(error = %e, "device registration failed"),
                    }
                    worker_completed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .map_err(|e| SyncError::transport_fatal(format!("failed to start registrar: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            force,
            completed,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Number of registration attempts the worker has finished.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Stops accepting requests and waits for the pending one to finish.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("registration worker panicked");
            }
        }
    }
}

impl DeviceRegistrar for BackgroundRegistrar {
    fn request_registration(&self, force: bool) {
        if force {
            self.force.store(true, Ordering::SeqCst);
        }
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            tracing::warn!("registration requested after shutdown");
            return;
        };
        match sender.try_send(()) {
            Ok(()) => tracing::debug!(force, "registration queued"),
            Err(TrySendError::Full(())) => tracing::debug!("registration already pending"),
            Err(TrySendError::Disconnected(())) => tracing::warn!("registration worker stopped"),
        }
    }
}

impl Drop for BackgroundRegistrar {
    fn drop(&mut self) {
        self.shutdown();
    }
}
