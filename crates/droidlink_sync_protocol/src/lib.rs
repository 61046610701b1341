//! # DroidLink Sync Protocol
//!
//! JSON wire types for the DroidLink REST API.
//!
//! This crate provides:
//! - [`EventPayload`], the JSON form of an event
//! - [`DeviceRegistration`] and [`SyncTokenMessage`] request bodies
//! - Resource path builders ([`paths`])
//!
//! ## Endpoints
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | `GET` | `/events` | - (returns an array of events) |
//! | `PUT` | `/events/{id}` | event |
//! | `DELETE` | `/events/{id}` | - |
//! | `PUT` | `/devices/{deviceId}` | `{name, c2dm}` |
//! | `POST` | `/devices/{deviceId}/sync` | `{token}` |
//!
//! All paths are relative to `https://{host}/api/{version}`.
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
pub mod paths;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{DeviceRegistration, EventPayload, SyncTokenMessage};
