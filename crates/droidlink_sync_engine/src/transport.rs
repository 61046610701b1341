//! Transport layer abstraction for sync operations.

use crate::client::RemoteClient;
use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use droidlink_sync_protocol::{paths, DeviceRegistration, SyncTokenMessage};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// The remote operations the reconciliation engine needs.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (REST over HTTP, mock for testing, etc.).
pub trait SyncTransport: Send + Sync {
    /// `GET /events`: the account's complete remote collection.
    ///
    /// Elements are returned undecoded so one malformed event can be
    /// skipped without failing the whole download.
    fn fetch_events(&self) -> SyncResult<Vec<Value>>;

    /// `PUT /events/{id}`: upserts one event.
    fn upload_event(&self, id: &str, body: &Value) -> SyncResult<()>;

    /// `DELETE /events/{id}`.
    fn delete_event(&self, id: &str) -> SyncResult<()>;

    /// `PUT /devices/{deviceId}`: upserts the device registration.
    fn register_device(&self, device_id: &str, registration: &DeviceRegistration) -> SyncResult<()>;

    /// `POST /devices/{deviceId}/sync`: broadcasts a sync token to the
    /// account's other devices.
    fn broadcast_sync_token(&self, device_id: &str, message: &SyncTokenMessage) -> SyncResult<()>;
}

/// REST transport over a [`RemoteClient`].
pub struct HttpTransport<C: HttpClient> {
    client: RemoteClient<C>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport.
    pub fn new(client: RemoteClient<C>) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &RemoteClient<C> {
        &self.client
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn fetch_events(&self) -> SyncResult<Vec<Value>> {
        self.client.get_array(paths::EVENTS)
    }

    fn upload_event(&self, id: &str, body: &Value) -> SyncResult<()> {
        self.client.put(&paths::event(id), body).map(|_| ())
    }

    fn delete_event(&self, id: &str) -> SyncResult<()> {
        self.client.delete(&paths::event(id))
    }

    fn register_device(&self, device_id: &str, registration: &DeviceRegistration) -> SyncResult<()> {
        let body = to_json(registration)?;
        self.client.put(&paths::device(device_id), &body).map(|_| ())
    }

    fn broadcast_sync_token(&self, device_id: &str, message: &SyncTokenMessage) -> SyncResult<()> {
        let body = to_json(message)?;
        self.client
            .post(&paths::device_sync(device_id), &body)
            .map(|_| ())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> SyncResult<Value> {
    serde_json::to_value(value).map_err(|e| SyncError::Protocol(e.to_string()))
}

/// A remote call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `GET /events`
    FetchEvents,
    /// `PUT /events/{id}`
    Upload(String),
    /// `DELETE /events/{id}`
    Delete(String),
    /// `PUT /devices/{deviceId}`
    Register(String),
    /// `POST /devices/{deviceId}/sync` with the token.
    Broadcast(String),
}

/// A scripted failure for [`MockTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// HTTP 404.
    NotFound,
    /// HTTP 500.
    ServerFailure,
    /// Connection reset.
    Io,
    /// Rejected credential.
    Auth,
    /// Consent pending.
    Permission,
}

impl MockFailure {
    fn to_error(self, path: &str) -> SyncError {
        match self {
            MockFailure::NotFound => SyncError::NotFound {
                url: path.to_string(),
                status: 404,
            },
            MockFailure::ServerFailure => SyncError::ServerFailure {
                url: path.to_string(),
            },
            MockFailure::Io => SyncError::transport_retryable("connection reset"),
            MockFailure::Auth => SyncError::AuthenticationFailed("rejected".into()),
            MockFailure::Permission => SyncError::PermissionRequired(
                crate::error::GrantPermission::new("mock", "grant access"),
            ),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    remote: Vec<Value>,
    calls: Vec<TransportCall>,
    fetch_failure: Option<MockFailure>,
    upload_failures: HashMap<String, MockFailure>,
    delete_failures: HashMap<String, MockFailure>,
    register_failure: Option<MockFailure>,
    broadcast_failure: Option<MockFailure>,
    registrations: Vec<(String, DeviceRegistration)>,
}

/// An in-memory transport for testing.
///
/// Behaves like a server holding one remote collection: successful
/// uploads upsert into it and successful deletes remove from it.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates a mock with an empty remote collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock holding `events` remotely.
    pub fn with_remote_events(events: Vec<Value>) -> Self {
        let mock = Self::new();
        mock.state.lock().remote = events;
        mock
    }

    /// Adds one raw remote event.
    pub fn push_remote_event(&self, event: Value) {
        self.state.lock().remote.push(event);
    }

    /// Removes a remote event by id, as another device would.
    pub fn remove_remote_event(&self, id: &str) {
        self.state.lock().remote.retain(|e| event_id(e) != Some(id));
    }

    /// Returns the remote collection.
    pub fn remote_events(&self) -> Vec<Value> {
        self.state.lock().remote.clone()
    }

    /// Makes `GET /events` fail.
    pub fn fail_fetch(&self, failure: MockFailure) {
        self.state.lock().fetch_failure = Some(failure);
    }

    /// Makes the upload of `id` fail.
    pub fn fail_upload(&self, id: impl Into<String>, failure: MockFailure) {
        self.state.lock().upload_failures.insert(id.into(), failure);
    }

    /// Makes the delete of `id` fail.
    pub fn fail_delete(&self, id: impl Into<String>, failure: MockFailure) {
        self.state.lock().delete_failures.insert(id.into(), failure);
    }

    /// Makes device registration fail.
    pub fn fail_register(&self, failure: MockFailure) {
        self.state.lock().register_failure = Some(failure);
    }

    /// Makes the token broadcast fail.
    pub fn fail_broadcast(&self, failure: MockFailure) {
        self.state.lock().broadcast_failure = Some(failure);
    }

    /// Clears every scripted failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fetch_failure = None;
        state.upload_failures.clear();
        state.delete_failures.clear();
        state.register_failure = None;
        state.broadcast_failure = None;
    }

    /// Returns every call in order, including failed ones.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    /// Forgets recorded calls.
    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns the registrations received.
    pub fn registrations(&self) -> Vec<(String, DeviceRegistration)> {
        self.state.lock().registrations.clone()
    }
}

fn event_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

impl SyncTransport for MockTransport {
    fn fetch_events(&self) -> SyncResult<Vec<Value>> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::FetchEvents);
        if let Some(failure) = state.fetch_failure {
            return Err(failure.to_error(paths::EVENTS));
        }
        Ok(state.remote.clone())
    }

    fn upload_event(&self, id: &str, body: &Value) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Upload(id.to_string()));
        if let Some(failure) = state.upload_failures.get(id) {
            return Err(failure.to_error(&paths::event(id)));
        }
        let mut stored = body.clone();
        if let Value::Object(map) = &mut stored {
            map.insert("id".into(), Value::String(id.to_string()));
        }
        state.remote.retain(|e| event_id(e) != Some(id));
        state.remote.push(stored);
        Ok(())
    }

    fn delete_event(&self, id: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Delete(id.to_string()));
        if let Some(failure) = state.delete_failures.get(id) {
            return Err(failure.to_error(&paths::event(id)));
        }
        state.remote.retain(|e| event_id(e) != Some(id));
        Ok(())
    }

    fn register_device(&self, device_id: &str, registration: &DeviceRegistration) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Register(device_id.to_string()));
        if let Some(failure) = state.register_failure {
            return Err(failure.to_error(&paths::device(device_id)));
        }
        state
            .registrations
            .push((device_id.to_string(), registration.clone()));
        Ok(())
    }

    fn broadcast_sync_token(&self, device_id: &str, message: &SyncTokenMessage) -> SyncResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(TransportCall::Broadcast(message.token.clone()));
        if let Some(failure) = state.broadcast_failure {
            return Err(failure.to_error(&paths::device_sync(device_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::config::SyncConfig;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};
    use serde_json::json;
    use std::sync::Arc;

    struct Recorder {
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl HttpClient for Recorder {
        fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
            self.requests.lock().push(request);
            Ok(HttpResponse::empty(204))
        }
    }

    #[test]
    fn http_transport_routes() {
        let client = RemoteClient::new(
            &SyncConfig::new("h"),
            "a",
            Recorder {
                requests: Mutex::new(Vec::new()),
            },
            Arc::new(StaticToken::single("a", "t")),
        );
        let transport = HttpTransport::new(client);

        transport.fetch_events().unwrap();
        transport.upload_event("E1", &json!({"id": "E1"})).unwrap();
        transport.delete_event("E2").unwrap();
        transport
            .register_device("d1", &DeviceRegistration::new("Phone", None))
            .unwrap();
        transport
            .broadcast_sync_token("d1", &SyncTokenMessage { token: "tok".into() })
            .unwrap();

        let requests = transport.client().http().requests.lock();
        let routes: Vec<_> = requests
            .iter()
            .map(|r| (r.method, r.url.trim_start_matches("https://h/api/1").to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Get, "/events".to_string()),
                (HttpMethod::Put, "/events/E1".to_string()),
                (HttpMethod::Delete, "/events/E2".to_string()),
                (HttpMethod::Put, "/devices/d1".to_string()),
                (HttpMethod::Post, "/devices/d1/sync".to_string()),
            ]
        );
        assert_eq!(
            serde_json::from_slice::<Value>(requests[4].body.as_deref().unwrap()).unwrap(),
            json!({"token": "tok"})
        );
    }

    #[test]
    fn mock_behaves_like_a_server() {
        let mock = MockTransport::with_remote_events(vec![json!({"id": "E3"})]);
        mock.upload_event("E1", &json!({"deviceId": "d"})).unwrap();
        mock.delete_event("E3").unwrap();

        let remote = mock.remote_events();
        assert_eq!(remote, vec![json!({"deviceId": "d", "id": "E1"})]);
        assert_eq!(
            mock.calls(),
            vec![
                TransportCall::Upload("E1".into()),
                TransportCall::Delete("E3".into())
            ]
        );
    }

    #[test]
    fn mock_failures() {
        let mock = MockTransport::new();
        mock.fail_upload("E1", MockFailure::NotFound);
        assert!(mock.upload_event("E1", &json!({})).unwrap_err().is_not_found());
        assert!(mock.remote_events().is_empty());

        mock.clear_failures();
        assert!(mock.upload_event("E1", &json!({})).is_ok());
    }
}
