//! # DroidLink Sync Server
//!
//! Reference implementation of the DroidLink REST API.
//!
//! This crate provides:
//! - The REST endpoints (events, device registration, sync broadcast)
//! - In-memory state per account
//! - Authentication middleware (HMAC-SHA256 tokens)
//!
//! # Architecture
//!
//! The server is transport-agnostic: [`SyncServer::handle`] takes a method,
//! a path relative to `/api/{version}`, the `Authorization` header and a
//! body. Test harnesses and loopback HTTP clients call it directly.
//!
//! It maintains, per account:
//! - The event collection
//! - Registered devices and their push tokens
//! - A log of sync token broadcasts
//!
//! # Authentication
//!
//! Without authentication the bearer credential is taken as the account
//! name. With authentication, credentials must be signed tokens:
//!
//! ```rust
//! use droidlink_sync_server::{ServerConfig, SyncServer};
//!
//! let config = ServerConfig::default().with_auth(b"my-secure-secret".to_vec());
//! let server = SyncServer::new(config);
//! let token = server.create_token("me@example.com").unwrap();
//! assert!(token.starts_with("me@example.com:"));
//! ```
//!
//! # Protocol
//!
//! - `PUT /events/{id}` answers 404 when the event's device is not registered
//! - `POST /devices/{id}/sync` answers 404 for an unregistered device
//! - `DELETE /events/{id}` succeeds whether or not the event exists

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use auth::{AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{
    HandlerContext, Method, RequestHandler, ServerRequest, ServerResponse, ANONYMOUS_ACCOUNT,
};
pub use registry::{Broadcast, Registry};
pub use server::SyncServer;
