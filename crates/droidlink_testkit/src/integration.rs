//! End-to-end helpers: devices syncing against the reference server
//! through a loopback HTTP client.

use crate::fixtures::{configured_settings, CountingRegistrar, RecordingNotifier, TestStore};
use droidlink_store::{EventFilter, EventState, EventStore, MemoryEventStore};
use droidlink_sync_engine::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
    MemorySettingsStore, RegistrationService, RemoteClient, StaticToken, SyncConfig,
    SyncCycleResult, SyncEngine, SyncRequest,
};
use droidlink_sync_server::{Method, ServerRequest, SyncServer};
use std::sync::Arc;
use std::time::Duration;

/// API base used by loopback clients.
pub const LOOPBACK_BASE_URL: &str = "http://loopback/api/1";

/// Exposes a [`SyncServer`] to the engine's loopback client.
#[derive(Clone)]
pub struct ServerBackend {
    server: Arc<SyncServer>,
}

impl ServerBackend {
    /// Wraps `server`.
    pub fn new(server: Arc<SyncServer>) -> Self {
        Self { server }
    }

    /// Returns the wrapped server.
    pub fn server(&self) -> &Arc<SyncServer> {
        &self.server
    }
}

impl LoopbackServer for ServerBackend {
    fn handle(&self, method: HttpMethod, path: &str, request: &HttpRequest) -> HttpResponse {
        let method = match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Put => Method::Put,
            HttpMethod::Post => Method::Post,
            HttpMethod::Delete => Method::Delete,
        };
        let mut server_request = ServerRequest::new(method, path);
        server_request.authorization = request.header("authorization").map(str::to_string);
        server_request.body = request.body.clone().unwrap_or_default();

        let response = self.server.handle(&server_request);
        HttpResponse::new(response.status, response.body)
    }
}

/// Transport of a [`TestDevice`].
pub type LoopbackTransport = HttpTransport<LoopbackClient<ServerBackend>>;

/// Builds a REST transport for `account` talking to `server` in-process.
///
/// The credential is a signed token when the server requires one and the
/// account name otherwise.
pub fn loopback_transport(server: &Arc<SyncServer>, config: &SyncConfig, account: &str) -> LoopbackTransport {
    let credential = server
        .create_token(account)
        .unwrap_or_else(|_| account.to_string());
    let http = LoopbackClient::new(LOOPBACK_BASE_URL, ServerBackend::new(server.clone()));
    let client = RemoteClient::new(
        config,
        account,
        http,
        Arc::new(StaticToken::single(account, credential)),
    );
    HttpTransport::new(client)
}

/// One device of an account: its own store, settings and engine.
pub struct TestDevice {
    /// Account.
    pub account: String,
    /// Device identifier.
    pub device_id: String,
    /// Local event store.
    pub store: TestStore,
    /// Local settings.
    pub settings: Arc<MemorySettingsStore>,
    /// REST transport to the server.
    pub transport: Arc<LoopbackTransport>,
    /// Registration requests made by the engine.
    pub registrar: Arc<CountingRegistrar>,
    /// New-event notifications.
    pub notifier: Arc<RecordingNotifier>,
    /// The engine.
    pub engine: SyncEngine<LoopbackTransport, MemoryEventStore>,
}

impl TestDevice {
    /// Creates a device without debounce.
    pub fn new(server: &Arc<SyncServer>, account: &str, device_id: &str) -> Self {
        let config = SyncConfig::default()
            .with_base_url(LOOPBACK_BASE_URL)
            .with_debounce(Duration::ZERO);
        Self::with_config(server, account, device_id, config)
    }

    /// Creates a device with `config`; the base URL is forced to loopback.
    pub fn with_config(server: &Arc<SyncServer>, account: &str, device_id: &str, config: SyncConfig) -> Self {
        let config = config.with_base_url(LOOPBACK_BASE_URL);
        let store = TestStore::new();
        let settings = configured_settings(account, device_id);
        let transport = Arc::new(loopback_transport(server, &config, account));
        let registrar = Arc::new(CountingRegistrar::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = SyncEngine::new(config, transport.clone(), store.store.clone(), settings.clone())
            .with_registrar(registrar.clone())
            .with_notifier(notifier.clone());

        Self {
            account: account.to_string(),
            device_id: device_id.to_string(),
            store,
            settings,
            transport,
            registrar,
            notifier,
            engine,
        }
    }

    /// Uploads the device record.
    pub fn register(&self) {
        RegistrationService::new(self.transport.clone(), self.settings.clone())
            .register(true)
            .expect("Failed to register device");
    }

    /// Runs a full cycle.
    pub fn full_sync(&self) -> SyncCycleResult {
        self.engine.sync(&SyncRequest::full(&self.account))
    }

    /// Runs a light cycle.
    pub fn light_sync(&self) -> SyncCycleResult {
        self.engine.sync(&SyncRequest::light(&self.account))
    }

    /// Returns `(id, state)` of every local event, sorted by id.
    pub fn states(&self) -> Vec<(String, EventState)> {
        let mut states: Vec<_> = self
            .store
            .query(&EventFilter::all())
            .expect("Failed to query events")
            .into_iter()
            .map(|event| (event.id, event.state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::local_event;
    use droidlink_store::EventType;

    #[test]
    fn device_round_trip() {
        let server = Arc::new(SyncServer::default());
        let phone = TestDevice::new(&server, "me@example.com", "phone");
        phone.register();
        phone
            .store
            .insert(local_event("E1", "phone", EventType::MissedCall, EventState::PendingUpload))
            .unwrap();

        assert!(phone.full_sync().outcome.is_completed());
        assert_eq!(phone.states(), vec![("E1".to_string(), EventState::Uploaded)]);
        assert_eq!(server.registry().event_count("me@example.com"), 1);
    }
}
