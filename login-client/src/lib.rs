//! # loginstore-client
//!
//! Encrypted login storage and sync for loginstore.
//!
//! This is the main library that applications use to store credentials and
//! keep them in sync with a remote collection.
//!
//! ## Features
//!
//! - **Encrypted at Rest**: record content sealed with XChaCha20-Poly1305
//! - **Device-Adaptive Key Derivation**: Argon2id scales with available RAM
//! - **Validated Writes**: nothing invalid ever reaches the database
//! - **Interruptible**: long operations abort cleanly on request
//! - **Transport Abstraction**: pluggable remote (mock included)
//! - **Pure State Machine**: sync passes driven by loginstore-core
//!
//! ## Example
//!
//! ```ignore
//! use loginstore_client::{Store, StoreConfig, SyncEngine, MockRemote, SyncCredentials};
//!
//! let config = StoreConfig::default();
//! let store = Store::open(Path::new("logins.db"), "correct horse", &config).await?;
//! store.add(Login::new(fields)).await?;
//!
//! let engine = SyncEngine::new(store.clone(), config.sync.clone());
//! engine.sync(&remote, &SyncCredentials::new("token")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod store;
pub mod transport;

pub use config::{ConfigError, DatabaseConfig, KdfConfig, StoreConfig, SyncConfig};
pub use crypto::{Argon2Params, CryptoError, StoreKey, KEY_SIZE, NONCE_SIZE, SALT_SIZE};
pub use engine::{panic_message, SyncEngine, SyncListener};
pub use error::{StoreError, SyncError};
pub use store::{ApplyOutcome, ImportMetrics, SkipReason, Store, SyncInfo};
pub use transport::{MockRemote, SyncCredentials, Transport, TransportError};
