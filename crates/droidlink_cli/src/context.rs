//! Data directory, configuration and sync wiring shared by the commands.

use droidlink_store::MemoryEventStore;
use droidlink_sync_engine::{
    BackgroundRegistrar, FileSettingsStore, HttpTransport, Notification, RegistrationService,
    RemoteClient, ReqwestClient, SettingsStore, StaticToken, SyncConfig, SyncCycleResult,
    SyncEngine, SyncRequest, SyncRequester, SyncResult, SyncRunner, SyncTrigger,
    UnreadCounterNotifier,
};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Settings file name inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// REST transport used by the CLI.
pub type CliTransport = HttpTransport<ReqwestClient>;

/// Engine used by the CLI.
pub type CliEngine = SyncEngine<CliTransport, MemoryEventStore>;

/// Global command-line options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the store and settings.
    pub data_dir: PathBuf,
    /// Server host.
    pub host: Option<String>,
    /// API base URL override.
    pub base_url: Option<String>,
    /// Bearer credential of the account.
    pub credential: Option<String>,
    /// Log sync requests instead of running them.
    pub offline: bool,
}

/// Opened data directory.
pub struct Context {
    options: Options,
    config: SyncConfig,
    store: Arc<MemoryEventStore>,
    settings: Arc<FileSettingsStore>,
}

impl Context {
    /// Creates the data directory if needed and opens the store and settings.
    pub fn open(options: Options) -> Result<Self, Box<dyn Error>> {
        fs::create_dir_all(&options.data_dir)?;
        let store = MemoryEventStore::open(&options.data_dir)?;
        let settings = FileSettingsStore::new(options.data_dir.join(SETTINGS_FILE));

        let mut config = match &options.host {
            Some(host) => SyncConfig::new(host.clone()),
            None => SyncConfig::default(),
        };
        if let Some(url) = &options.base_url {
            config = config.with_base_url(url.clone());
        }

        Ok(Self {
            options,
            config,
            store: Arc::new(store),
            settings: Arc::new(settings),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.options.data_dir
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryEventStore> {
        &self.store
    }

    pub fn settings(&self) -> Arc<dyn SettingsStore> {
        self.settings.clone()
    }

    /// Returns the selected account.
    pub fn account(&self) -> Result<String, Box<dyn Error>> {
        self.settings
            .load()?
            .account
            .ok_or_else(|| "No account selected. Run `droidlink init <account>` first.".into())
    }

    /// Builds the REST transport for `account`.
    ///
    /// Without a credential every request fails with a permission error.
    pub fn transport(&self, account: &str) -> SyncResult<Arc<CliTransport>> {
        let auth = match &self.options.credential {
            Some(credential) => StaticToken::single(account, credential.clone()),
            None => StaticToken::new(),
        };
        let http = ReqwestClient::new(&self.config)?;
        let client = RemoteClient::new(&self.config, account, http, Arc::new(auth));
        Ok(Arc::new(HttpTransport::new(client)))
    }

    /// Builds an engine for `account` with a background registrar and the
    /// unread counter.
    pub fn engine(&self, account: &str) -> SyncResult<SyncServices> {
        let transport = self.transport(account)?;
        let registrar = Arc::new(BackgroundRegistrar::start(RegistrationService::new(
            transport.clone(),
            self.settings(),
        ))?);
        let notifier = Arc::new(UnreadCounterNotifier::new(self.settings()));
        let engine = SyncEngine::new(
            self.config.clone(),
            transport,
            self.store.clone(),
            self.settings(),
        )
        .with_registrar(registrar.clone())
        .with_notifier(notifier.clone());

        Ok(SyncServices {
            engine: Arc::new(engine),
            registrar,
            notifier,
        })
    }

    /// Starts a session that runs the syncs requested by local changes.
    ///
    /// Offline, or without an account, requests are only logged.
    pub fn session(&self) -> Result<SyncSession, Box<dyn Error>> {
        let account = self.settings.load()?.account;
        let (Some(account), false) = (account, self.options.offline) else {
            return Ok(SyncSession::offline());
        };

        let services = self.engine(&account)?;
        let runner: Arc<dyn SyncRunner> = services.engine.clone();
        let trigger = Arc::new(SyncTrigger::start(runner, self.config.queue_capacity)?);
        let results = trigger.subscribe();
        Ok(SyncSession {
            trigger: Some(trigger),
            results: Some(results),
            services: Some(services),
        })
    }
}

/// An engine and the collaborators it reports to.
pub struct SyncServices {
    pub engine: Arc<CliEngine>,
    pub registrar: Arc<BackgroundRegistrar>,
    pub notifier: Arc<UnreadCounterNotifier>,
}

impl SyncServices {
    /// Waits for a pending registration and prints the notification, if any.
    pub fn finish(&self) {
        self.registrar.shutdown();
        match self.notifier.latest() {
            Some(Notification::Single { event_id }) => println!("New event: {event_id}"),
            Some(Notification::Summary { unread }) => println!("{unread} unread events"),
            None => {}
        }
    }
}

/// Logs requests instead of running them.
struct OfflineRequester;

impl SyncRequester for OfflineRequester {
    fn request(&self, request: SyncRequest) -> SyncResult<()> {
        tracing::info!(
            strategy = ?request.strategy,
            "offline, run `droidlink sync` to push local changes"
        );
        Ok(())
    }
}

/// Sync requests raised while a command runs.
pub struct SyncSession {
    trigger: Option<Arc<SyncTrigger>>,
    results: Option<Receiver<SyncCycleResult>>,
    services: Option<SyncServices>,
}

impl SyncSession {
    fn offline() -> Self {
        Self {
            trigger: None,
            results: None,
            services: None,
        }
    }

    /// Returns the requester to hand to recorders and purgers.
    pub fn requester(&self) -> Arc<dyn SyncRequester> {
        if let Some(trigger) = &self.trigger {
            return trigger.clone();
        }
        Arc::new(OfflineRequester)
    }

    /// Runs the queued requests and prints their results.
    pub fn finish(self) {
        if let Some(trigger) = &self.trigger {
            trigger.shutdown();
        }
        if let Some(results) = &self.results {
            for result in results.try_iter() {
                crate::commands::sync::print_result(&result);
            }
        }
        if let Some(services) = &self.services {
            services.finish();
        }
    }
}
