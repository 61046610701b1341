//! Remote sync client: authenticated JSON requests against the REST API.

use crate::auth::AuthProvider;
use crate::config::{RetryConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use droidlink_sync_protocol::paths;
use serde_json::Value;
use std::sync::Arc;

const JSON: &str = "application/json";

/// Stateless wrapper issuing JSON requests for one account.
///
/// Every request carries `Content-Type` and `Accept: application/json`,
/// the configured user agent and the account's bearer credential. Paths are
/// relative to the versioned API base and always normalized to start
/// with `/`.
///
/// Status handling:
///
/// | Status | Result |
/// |---|---|
/// | 2xx | body parsed as JSON, `None` when empty |
/// | 401, 403 | [`SyncError::AuthenticationFailed`] |
/// | 404 | [`SyncError::NotFound`] |
/// | 500 | [`SyncError::ServerFailure`] |
/// | other | [`SyncError::RequestFailed`] |
pub struct RemoteClient<C: HttpClient> {
    base_url: String,
    user_agent: String,
    retry: RetryConfig,
    account: String,
    http: C,
    auth: Arc<dyn AuthProvider>,
}

impl<C: HttpClient> RemoteClient<C> {
    /// Creates a client for `account`.
    pub fn new(
        config: &SyncConfig,
        account: impl Into<String>,
        http: C,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            base_url: config.base_url(),
            user_agent: config.user_agent.clone(),
            retry: config.retry.clone(),
            account: account.into(),
            http,
            auth,
        }
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the account requests are issued for.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &C {
        &self.http
    }

    /// `GET path`.
    pub fn get(&self, path: &str) -> SyncResult<Option<Value>> {
        self.send(HttpMethod::Get, path, None)
    }

    /// `GET path`, expecting a JSON array. An empty body is an empty array.
    pub fn get_array(&self, path: &str) -> SyncResult<Vec<Value>> {
        match self.get(path)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(SyncError::InvalidJson {
                url: self.url(path),
                message: format!("expected an array, got {}", json_kind(&other)),
            }),
        }
    }

    /// `PUT path` with a JSON body.
    ///
    /// Retried on connect timeout only, up to the configured attempts.
    pub fn put(&self, path: &str, body: &Value) -> SyncResult<Option<Value>> {
        let mut attempt = 1;
        loop {
            match self.send(HttpMethod::Put, path, Some(body)) {
                Err(SyncError::ConnectTimeout { url }) if attempt < self.retry.max_attempts => {
                    tracing::warn!(%url, attempt, "connect timeout, retrying upload");
                    attempt += 1;
                    if !self.retry.delay.is_zero() {
                        std::thread::sleep(self.retry.delay);
                    }
                }
                other => return other,
            }
        }
    }

    /// `POST path` with a JSON body.
    pub fn post(&self, path: &str, body: &Value) -> SyncResult<Option<Value>> {
        self.send(HttpMethod::Post, path, Some(body))
    }

    /// `DELETE path`.
    pub fn delete(&self, path: &str) -> SyncResult<()> {
        self.send(HttpMethod::Delete, path, None).map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, paths::normalize(path))
    }

    fn send(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> SyncResult<Option<Value>> {
        let url = self.url(path);
        let credential = self.auth.credential(&self.account)?;

        let mut request = HttpRequest::new(method, url.clone())
            .with_header("Content-Type", JSON)
            .with_header("Accept", JSON)
            .with_header("User-Agent", self.user_agent.clone())
            .with_header("Authorization", format!("Bearer {credential}"));
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;
            tracing::trace!(method = method.as_str(), %url, body = %body, "sending request");
            request = request.with_body(bytes);
        } else {
            tracing::trace!(method = method.as_str(), %url, "sending request");
        }

        let response = self.http.execute(request)?;
        classify(&url, response)
    }
}

/// Maps a response to its JSON body or to an error kind.
fn classify(url: &str, response: HttpResponse) -> SyncResult<Option<Value>> {
    match response.status {
        200..=299 => parse_body(url, &response.body),
        401 | 403 => Err(SyncError::AuthenticationFailed(format!(
            "{url} rejected the credential with status {}",
            response.status
        ))),
        404 => Err(SyncError::NotFound {
            url: url.to_string(),
            status: 404,
        }),
        500 => Err(SyncError::ServerFailure {
            url: url.to_string(),
        }),
        status => Err(SyncError::RequestFailed {
            url: url.to_string(),
            status,
        }),
    }
}

fn parse_body(url: &str, body: &[u8]) -> SyncResult<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| SyncError::InvalidJson {
            url: url.to_string(),
            message: e.to_string(),
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays scripted outcomes and records requests.
    struct ScriptedHttp {
        outcomes: Mutex<VecDeque<SyncResult<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttp {
        fn new(outcomes: Vec<SyncResult<HttpResponse>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for ScriptedHttp {
        fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
            self.requests.lock().push(request);
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::empty(204)))
        }
    }

    fn client(outcomes: Vec<SyncResult<HttpResponse>>) -> RemoteClient<ScriptedHttp> {
        RemoteClient::new(
            &SyncConfig::new("example.com"),
            "me@example.com",
            ScriptedHttp::new(outcomes),
            Arc::new(StaticToken::single("me@example.com", "tok")),
        )
    }

    fn timeout() -> SyncResult<HttpResponse> {
        Err(SyncError::ConnectTimeout { url: "u".into() })
    }

    #[test]
    fn requests_carry_headers_and_normalized_path() {
        let client = client(vec![Ok(HttpResponse::new(200, b"[]".to_vec()))]);
        assert!(client.get_array("events").unwrap().is_empty());

        let requests = client.http().requests.lock();
        let request = &requests[0];
        assert_eq!(request.url, "https://example.com/api/1/events");
        assert_eq!(request.header("content-type"), Some(JSON));
        assert_eq!(request.header("accept"), Some(JSON));
        assert_eq!(request.header("user-agent"), Some("Droid Link"));
        assert_eq!(request.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn empty_body_is_none() {
        let client = client(vec![Ok(HttpResponse::new(200, b"  \n".to_vec()))]);
        assert_eq!(client.get("/events/E1").unwrap(), None);
    }

    #[test]
    fn status_classification() {
        let client = client(vec![
            Ok(HttpResponse::empty(404)),
            Ok(HttpResponse::empty(500)),
            Ok(HttpResponse::empty(403)),
            Ok(HttpResponse::empty(409)),
            Ok(HttpResponse::empty(201)),
        ]);

        assert!(matches!(
            client.delete("/events/E1"),
            Err(SyncError::NotFound { status: 404, .. })
        ));
        assert!(matches!(
            client.delete("/events/E1"),
            Err(SyncError::ServerFailure { .. })
        ));
        assert!(matches!(
            client.delete("/events/E1"),
            Err(SyncError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            client.delete("/events/E1"),
            Err(SyncError::RequestFailed { status: 409, .. })
        ));
        assert!(client.delete("/events/E1").is_ok());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let client = client(vec![
            Ok(HttpResponse::new(200, b"{oops".to_vec())),
            Ok(HttpResponse::new(200, b"{\"id\":1}".to_vec())),
        ]);
        assert!(matches!(client.get("/events"), Err(SyncError::InvalidJson { .. })));
        assert!(matches!(
            client.get_array("/events"),
            Err(SyncError::InvalidJson { .. })
        ));
    }

    #[test]
    fn put_retries_connect_timeouts_only() {
        let client = client(vec![timeout(), timeout(), Ok(HttpResponse::empty(200))]);
        assert!(client.put("/events/E1", &json!({"id": "E1"})).is_ok());
        assert_eq!(client.http().requests.lock().len(), 3);

        let client = self::client(vec![timeout(), timeout(), timeout(), Ok(HttpResponse::empty(200))]);
        assert!(matches!(
            client.put("/events/E1", &json!({})),
            Err(SyncError::ConnectTimeout { .. })
        ));
        assert_eq!(client.http().requests.lock().len(), 3);

        let client = self::client(vec![Err(SyncError::transport_retryable("reset"))]);
        assert!(client.put("/events/E1", &json!({})).is_err());
        assert_eq!(client.http().requests.lock().len(), 1);
    }

    #[test]
    fn post_is_not_retried() {
        let client = client(vec![timeout(), Ok(HttpResponse::empty(200))]);
        assert!(client.post("/devices/d1/sync", &json!({"token": "t"})).is_err());
        assert_eq!(client.http().requests.lock().len(), 1);
    }

    #[test]
    fn missing_credential_sends_nothing() {
        let client = RemoteClient::new(
            &SyncConfig::default(),
            "other@example.com",
            ScriptedHttp::new(vec![]),
            Arc::new(StaticToken::new()),
        );
        assert!(matches!(
            client.get("/events"),
            Err(SyncError::PermissionRequired(_))
        ));
        assert!(client.http().requests.lock().is_empty());
    }
}
