//! CLI command implementations.

pub mod delete;
pub mod init;
pub mod list;
pub mod purge;
pub mod record;
pub mod register;
pub mod status;
pub mod sync;
