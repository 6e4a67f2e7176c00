//! # loginstore-bridge
//!
//! Caller-facing facade for loginstore.
//!
//! This crate wraps the store and sync engine of `loginstore-client` into
//! [`LoginStore`], a single handle whose every call returns
//! `Result<T, LoginStoreError>`.
//!
//! ## Design
//!
//! - Errors flatten to one of nine [`ErrorKind`]s (stable integer codes)
//!   plus a human-readable message
//! - Errors are owned values; nothing needs to be released by the caller
//! - Panics inside a call are caught and reported as [`ErrorKind::Panic`]
//! - Thin wrappers; all real logic lives in loginstore-client and
//!   loginstore-core

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handle;
pub mod types;

pub use error::{ErrorKind, LoginStoreError};
pub use handle::LoginStore;
pub use types::{StoreStatus, SyncResult, SyncState};
