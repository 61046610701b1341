//! # DroidLink Testkit
//!
//! Test utilities for DroidLink.
//!
//! This crate provides:
//! - Temporary event stores and settings files
//! - Recording collaborators (registrar, notifier, observer, requester)
//! - Property-based test generators using proptest
//! - Multi-device integration helpers backed by the reference server
//!
//! ## Usage
//!
//! ```rust,ignore
//! use droidlink_testkit::prelude::*;
//!
//! #[test]
//! fn two_devices_converge() {
//!     let server = Arc::new(SyncServer::default());
//!     let phone = TestDevice::new(&server, "me@example.com", "phone");
//!     phone.register();
//!     // ... record events and sync
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
