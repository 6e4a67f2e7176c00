//! # loginstore-core
//!
//! Pure logic for loginstore (no I/O, instant tests).
//!
//! This crate implements record validation, cooperative interruption, the
//! sync pass state machine and reconciliation without any network or disk
//! I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! Apart from the interrupt controller, which is shared state by nature,
//! all modules in this crate are **pure**: they take input and produce
//! output without side effects.
//!
//! The actual I/O (database, remote) is performed by `loginstore-client`,
//! which executes the decisions and actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod interrupt;
pub mod reconcile;
pub mod state;
pub mod validate;

pub use clock::{next_modified, now_millis};
pub use interrupt::{InterruptHandle, InterruptScope, InterruptState, Interrupted};
pub use reconcile::{merge, reconcile, LocalRecord, Resolution, SyncStatus};
pub use state::{Action, PassEvent, SyncEvent, SyncPhase, SyncSummary};
pub use validate::{validate, InvalidLogin, InvalidReason};
