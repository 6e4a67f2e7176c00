//! # login-types
//!
//! Record and sync wire types for the loginstore credential store.
//!
//! This crate provides the foundational types used across all loginstore crates:
//! - [`Guid`], [`Cursor`] - Identity and ordering types
//! - [`Login`], [`LoginFields`], [`LoginMeta`], [`LoginChanges`] - The record model
//! - [`SyncRecord`], [`RemoteRecord`], [`FetchedChanges`], [`PushAck`] - Sync exchange types
//! - [`TypesError`] - Codec errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod login;
mod remote;

pub use error::TypesError;
pub use ids::{Cursor, Guid};
pub use login::{Login, LoginChanges, LoginFields, LoginMeta};
pub use remote::{FetchedChanges, PushAck, RemoteRecord, SyncRecord};
