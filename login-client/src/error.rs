//! Error types for the login store and sync engine.

use loginstore_core::{InvalidLogin, Interrupted};
use loginstore_types::{Guid, TypesError};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::transport::TransportError;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record failed validation.
    #[error(transparent)]
    InvalidLogin(#[from] InvalidLogin),

    /// A live record already uses this guid.
    #[error("duplicate guid: {guid}")]
    DuplicateGuid {
        /// The conflicting guid.
        guid: Guid,
    },

    /// No live record has this guid.
    #[error("no such record: {guid}")]
    NoSuchRecord {
        /// The missing guid.
        guid: Guid,
    },

    /// The key does not open this database, or the file is not a store.
    #[error("invalid key or not a login database")]
    InvalidKey,

    /// The operation was interrupted.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Record payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] TypesError),

    /// A stored row is malformed.
    #[error("corrupt record {guid}: {reason}")]
    Corrupt {
        /// The affected guid.
        guid: Guid,
        /// What is wrong with it.
        reason: String,
    },
}

impl StoreError {
    /// Whether this error comes from the validator.
    pub fn is_invalid_login(&self) -> bool {
        matches!(self, Self::InvalidLogin(_))
    }

    /// Whether the failure is confined to a single stored row, leaving the
    /// rest of the store usable.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            Self::Crypto(_) | Self::Serialization(_) | Self::Corrupt { .. }
        )
    }
}

/// Errors from a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Talking to the remote failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The pass was interrupted.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// The pass panicked.
    #[error("sync pass panicked: {0}")]
    Panic(String),
}

impl SyncError {
    /// Whether the pass stopped because of an interrupt, wherever it was
    /// observed.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Interrupted(_) | Self::Store(StoreError::Interrupted(_))
        )
    }
}
