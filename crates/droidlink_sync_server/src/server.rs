//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler, ServerRequest, ServerResponse};
use crate::registry::Registry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The sync server.
///
/// Serves the DroidLink REST API from memory. It is transport-agnostic:
/// callers hand it a [`ServerRequest`] whose path is relative to the
/// versioned API base and get back a status and JSON body.
///
/// # Example
///
/// ```
/// use droidlink_sync_server::{Method, ServerConfig, ServerRequest, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// let response = server.handle(
///     &ServerRequest::new(Method::Get, "/events").with_bearer("me@example.com"),
/// );
/// assert_eq!(response.status, 200);
/// assert_eq!(response.body, b"[]");
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    injected: Mutex<VecDeque<u16>>,
    requests: AtomicU64,
}

impl SyncServer {
    /// Creates a new sync server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Arc::new(Registry::new()))
    }

    /// Creates a sync server with an existing registry.
    pub fn with_registry(config: ServerConfig, registry: Arc<Registry>) -> Self {
        let context = Arc::new(HandlerContext::new(config, registry));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self {
            handler,
            context,
            injected: Mutex::new(VecDeque::new()),
            requests: AtomicU64::new(0),
        }
    }

    /// Handles one request.
    pub fn handle(&self, request: &ServerRequest) -> ServerResponse {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.injected.lock().pop_front() {
            tracing::debug!(status, path = %request.path, "injected response");
            return ServerResponse {
                status,
                body: Vec::new(),
            };
        }
        self.handler.handle(request)
    }

    /// Answers the next request with `status` and an empty body, without
    /// handling it. Queued statuses are used in order.
    pub fn fail_next(&self, status: u16) {
        self.injected.lock().push_back(status);
    }

    /// Returns the server state.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.context.registry
    }

    /// Issues a token for `account`. Fails when authentication is off.
    pub fn create_token(&self, account: &str) -> ServerResult<String> {
        self.context
            .validator()
            .ok_or_else(|| ServerError::InvalidRequest("authentication is disabled".into()))?
            .create_token(account)
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Default for SyncServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
