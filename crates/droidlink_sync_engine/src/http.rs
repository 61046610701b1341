//! HTTP client abstraction.
//!
//! The engine never talks to a network library directly. It builds
//! [`HttpRequest`]s and hands them to an [`HttpClient`], which allows
//! different implementations (reqwest, an in-process loopback server for
//! tests, etc.).

use crate::error::SyncResult;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the first value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates a response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }
}

/// HTTP client abstraction.
///
/// Implementations return a response for every status code and report
/// only failures to obtain one as errors: [`SyncError::ConnectTimeout`]
/// when the connection could not be established in time, and
/// [`SyncError::Transport`] otherwise.
///
/// [`SyncError::ConnectTimeout`]: crate::SyncError::ConnectTimeout
/// [`SyncError::Transport`]: crate::SyncError::Transport
pub trait HttpClient: Send + Sync {
    /// Executes `request`, blocking until a response arrives.
    fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse>;
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request addressed to `path` (relative to the API base).
    fn handle(&self, method: HttpMethod, path: &str, request: &HttpRequest) -> HttpResponse;
}

/// An HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    base_url: String,
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a loopback client serving URLs under `base_url`.
    pub fn new(base_url: impl Into<String>, server: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server,
        }
    }

    /// Returns the wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        let path = request
            .url
            .strip_prefix(&self.base_url)
            .unwrap_or(&request.url)
            .to_string();
        Ok(self.server.handle(request.method, &path, &request))
    }
}

#[cfg(feature = "http-client")]
mod reqwest_client {
    use super::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    use crate::config::SyncConfig;
    use crate::error::{SyncError, SyncResult};

    /// [`HttpClient`] backed by a blocking `reqwest` client.
    pub struct ReqwestClient {
        client: reqwest::blocking::Client,
    }

    impl ReqwestClient {
        /// Builds a client with the timeouts and user agent of `config`.
        pub fn new(config: &SyncConfig) -> SyncResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(config.timeout)
                .connect_timeout(config.connect_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| SyncError::transport_fatal(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().map_err(|e| {
                if e.is_connect() && e.is_timeout() {
                    SyncError::ConnectTimeout {
                        url: request.url.clone(),
                    }
                } else if e.is_builder() {
                    SyncError::transport_fatal(e.to_string())
                } else {
                    SyncError::transport_retryable(e.to_string())
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .map_err(|e| SyncError::transport_retryable(format!("failed to read body: {e}")))?;
            Ok(HttpResponse::new(status, body.to_vec()))
        }
    }
}

#[cfg(feature = "http-client")]
pub use reqwest_client::ReqwestClient;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct EchoServer {
        seen: Mutex<Vec<(HttpMethod, String)>>,
    }

    impl LoopbackServer for EchoServer {
        fn handle(&self, method: HttpMethod, path: &str, _request: &HttpRequest) -> HttpResponse {
            self.seen.lock().push((method, path.to_string()));
            HttpResponse::new(200, path.as_bytes().to_vec())
        }
    }

    #[test]
    fn loopback_strips_base_url() {
        let client = LoopbackClient::new(
            "https://example.com/api/1/",
            EchoServer {
                seen: Mutex::new(Vec::new()),
            },
        );

        let response = client
            .execute(HttpRequest::new(
                HttpMethod::Delete,
                "https://example.com/api/1/events/E2",
            ))
            .unwrap();

        assert_eq!(response.body, b"/events/E2");
        assert_eq!(
            client.server().seen.lock().as_slice(),
            &[(HttpMethod::Delete, "/events/E2".to_string())]
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest::new(HttpMethod::Get, "u").with_header("Content-Type", "application/json");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("accept"), None);
    }
}
