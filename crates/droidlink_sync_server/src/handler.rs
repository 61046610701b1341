//! Request handlers for the REST endpoints.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::Registry;
use droidlink_sync_protocol::{paths, DeviceRegistration, EventPayload, SyncTokenMessage};
use serde_json::Value;
use std::sync::Arc;

/// Account used when authentication is off and no credential is sent.
pub const ANONYMOUS_ACCOUNT: &str = "anonymous";

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A request addressed to the API, path relative to the versioned base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRequest {
    /// Method.
    pub method: Method,
    /// Path such as `/events/E1`.
    pub path: String,
    /// Value of the `Authorization` header.
    pub authorization: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl ServerRequest {
    /// Creates a request without credential or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            authorization: None,
            body: Vec::new(),
        }
    }

    /// Sets `Authorization: Bearer {token}`.
    #[must_use]
    pub fn with_bearer(mut self, token: impl AsRef<str>) -> Self {
        self.authorization = Some(format!("Bearer {}", token.as_ref()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }
}

/// A response: status code and JSON body (empty for 204).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body.
    pub body: Vec<u8>,
}

impl ServerResponse {
    fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            body: value.to_string().into_bytes(),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: Vec::new(),
        }
    }

    fn error(err: &ServerError) -> Self {
        Self::json(err.status(), &serde_json::json!({ "error": err.to_string() }))
    }

    /// Parses the body as JSON.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Server state (shared across all handlers).
    pub registry: Arc<Registry>,
    validator: Option<TokenValidator>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, registry: Arc<Registry>) -> Self {
        let validator = config.credential_secret.as_ref().map(|secret| {
            TokenValidator::new(AuthConfig::new(secret.clone()).with_expiry(config.credential_ttl))
        });
        Self {
            config,
            registry,
            validator,
        }
    }

    /// Returns the token validator, when authentication is enabled.
    pub fn validator(&self) -> Option<&TokenValidator> {
        self.validator.as_ref()
    }

    fn authenticate(&self, authorization: Option<&str>) -> ServerResult<String> {
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match (&self.validator, token) {
            (Some(validator), Some(token)) => validator.validate_token(token),
            (Some(_), None) => Err(ServerError::NotAuthorized("missing credential".into())),
            (None, Some(account)) => Ok(account.to_string()),
            (None, None) => Ok(ANONYMOUS_ACCOUNT.to_string()),
        }
    }
}

/// A parsed route.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Events,
    Event(&'a str),
    Device(&'a str),
    DeviceSync(&'a str),
}

fn route(path: &str) -> Option<Route<'_>> {
    let path = path.split('?').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["events"] => Some(Route::Events),
        ["events", id] => Some(Route::Event(id)),
        ["devices", id] => Some(Route::Device(id)),
        ["devices", id, "sync"] => Some(Route::DeviceSync(id)),
        _ => None,
    }
}

/// Handler for REST requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request; every failure becomes an error response.
    pub fn handle(&self, request: &ServerRequest) -> ServerResponse {
        match self.dispatch(request) {
            Ok(Some(value)) => ServerResponse::json(200, &value),
            Ok(None) => ServerResponse::no_content(),
            Err(e) => {
                tracing::debug!(
                    method = request.method.as_str(),
                    path = %request.path,
                    status = e.status(),
                    error = %e,
                    "request rejected"
                );
                ServerResponse::error(&e)
            }
        }
    }

    fn dispatch(&self, request: &ServerRequest) -> ServerResult<Option<Value>> {
        let limit = self.context.config.body_limit;
        if request.body.len() > limit {
            return Err(ServerError::PayloadTooLarge {
                size: request.body.len(),
                limit,
            });
        }

        let account = self.context.authenticate(request.authorization.as_deref())?;
        let path = paths::normalize(&request.path);
        let route = route(&path).ok_or_else(|| ServerError::NotFound(path.clone()))?;

        match (request.method, route) {
            (Method::Get, Route::Events) => self.list_events(&account).map(Some),
            (Method::Put, Route::Event(id)) => self.put_event(&account, id, &request.body),
            (Method::Delete, Route::Event(id)) => Ok(self.delete_event(&account, id)),
            (Method::Put, Route::Device(id)) => self.put_device(&account, id, &request.body),
            (Method::Post, Route::DeviceSync(id)) => self.broadcast(&account, id, &request.body),
            (method, _) => Err(ServerError::MethodNotAllowed {
                method: method.as_str(),
                path: path.clone(),
            }),
        }
    }

    fn list_events(&self, account: &str) -> ServerResult<Value> {
        Ok(Value::Array(self.context.registry.events(account)?))
    }

    fn put_event(&self, account: &str, id: &str, body: &[u8]) -> ServerResult<Option<Value>> {
        let mut value: Value = serde_json::from_slice(body)?;
        if let Value::Object(map) = &mut value {
            map.insert("id".into(), Value::String(id.to_string()));
        }
        let event = EventPayload::from_value(value)
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

        let created = self.context.registry.put_event(account, event)?;
        tracing::debug!(account, event_id = id, created, "event stored");
        Ok(None)
    }

    fn delete_event(&self, account: &str, id: &str) -> Option<Value> {
        let existed = self.context.registry.delete_event(account, id);
        tracing::debug!(account, event_id = id, existed, "event deleted");
        None
    }

    fn put_device(&self, account: &str, device_id: &str, body: &[u8]) -> ServerResult<Option<Value>> {
        let registration: DeviceRegistration = serde_json::from_slice(body)?;
        let registration = DeviceRegistration::new(registration.name, registration.c2dm);
        let created = self
            .context
            .registry
            .register_device(account, device_id, registration);
        tracing::info!(account, device_id, created, "device registered");
        Ok(None)
    }

    fn broadcast(&self, account: &str, device_id: &str, body: &[u8]) -> ServerResult<Option<Value>> {
        let message: SyncTokenMessage = serde_json::from_slice(body)?;
        if message.token.trim().is_empty() {
            return Err(ServerError::InvalidRequest("empty sync token".into()));
        }
        let broadcast = self
            .context
            .registry
            .broadcast(account, device_id, message.token)?;
        tracing::debug!(
            account,
            device_id,
            recipients = broadcast.recipients.len(),
            "sync token broadcast"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes() {
        assert_eq!(route("/events"), Some(Route::Events));
        assert_eq!(route("/events/E1"), Some(Route::Event("E1")));
        assert_eq!(route("/events/E1?x=1"), Some(Route::Event("E1")));
        assert_eq!(route("/devices/d1"), Some(Route::Device("d1")));
        assert_eq!(route("/devices/d1/sync"), Some(Route::DeviceSync("d1")));
        assert_eq!(route("/devices/d1/other"), None);
        assert_eq!(route("/"), None);
    }

    #[test]
    fn credential_names_account_without_auth() {
        let context = HandlerContext::new(ServerConfig::default(), Arc::new(Registry::new()));
        assert_eq!(
            context.authenticate(Some("Bearer me@example.com")).unwrap(),
            "me@example.com"
        );
        assert_eq!(context.authenticate(None).unwrap(), ANONYMOUS_ACCOUNT);
    }

    #[test]
    fn auth_requires_signed_token() {
        let context = HandlerContext::new(
            ServerConfig::default().with_auth(b"secret".to_vec()),
            Arc::new(Registry::new()),
        );
        assert!(matches!(
            context.authenticate(None),
            Err(ServerError::NotAuthorized(_))
        ));
        assert!(context.authenticate(Some("Bearer me@example.com")).is_err());

        let token = context.validator().unwrap().create_token("me@example.com").unwrap();
        assert_eq!(
            context.authenticate(Some(&format!("Bearer {token}"))).unwrap(),
            "me@example.com"
        );
    }
}
