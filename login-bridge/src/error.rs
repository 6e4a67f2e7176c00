//! Error taxonomy for loginstore-bridge.
//!
//! Every lower-layer error flattens to a [`LoginStoreError`]: one of nine
//! [`ErrorKind`]s plus a human-readable message. FFI consumers get a code
//! and a string, not Rust enum internals.

use std::fmt;

use loginstore_client::{ConfigError, StoreError, SyncError, TransportError};
use loginstore_core::{Interrupted, InvalidLogin};
use thiserror::Error;

/// Kind of a facade error.
///
/// The integer codes are stable and cross language boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    /// Unmapped internal failure (database, I/O, corrupt data).
    Unspecified = 1,
    /// A bug: an internal invariant was violated and the call panicked.
    Panic = 2,
    /// The remote rejected the sync credentials.
    AuthInvalid = 3,
    /// No live record has the requested guid.
    NoSuchRecord = 4,
    /// A live record already uses the guid.
    DuplicateGuid = 5,
    /// The record failed validation.
    InvalidAddress = 6,
    /// Wrong key, or the file is not a login database.
    InvalidKey = 7,
    /// The remote could not be reached.
    Network = 8,
    /// The call was aborted by an interrupt.
    Interrupted = 9,
}

impl ErrorKind {
    /// Stable integer code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Kind for a code; unknown codes are `Unspecified`.
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Self::Panic,
            3 => Self::AuthInvalid,
            4 => Self::NoSuchRecord,
            5 => Self::DuplicateGuid,
            6 => Self::InvalidAddress,
            7 => Self::InvalidKey,
            8 => Self::Network,
            9 => Self::Interrupted,
            _ => Self::Unspecified,
        }
    }

    /// Whether retrying the same call later can succeed without the caller
    /// changing anything.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Interrupted)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Panic => "panic",
            Self::AuthInvalid => "auth invalid",
            Self::NoSuchRecord => "no such record",
            Self::DuplicateGuid => "duplicate guid",
            Self::InvalidAddress => "invalid address",
            Self::InvalidKey => "invalid key",
            Self::Network => "network",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned by every [`LoginStore`](crate::LoginStore) call.
///
/// Owned and cloneable; there is nothing for the caller to release.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct LoginStoreError {
    kind: ErrorKind,
    message: String,
}

impl LoginStoreError {
    /// Create an error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Rebuild an error from its code and message.
    pub fn from_parts(code: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::from_code(code), message)
    }

    /// The error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Split into code and message.
    pub fn into_parts(self) -> (i32, String) {
        (self.kind.code(), self.message)
    }
}

impl From<StoreError> for LoginStoreError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::InvalidLogin(_) => ErrorKind::InvalidAddress,
            StoreError::DuplicateGuid { .. } => ErrorKind::DuplicateGuid,
            StoreError::NoSuchRecord { .. } => ErrorKind::NoSuchRecord,
            StoreError::InvalidKey => ErrorKind::InvalidKey,
            StoreError::Interrupted(_) => ErrorKind::Interrupted,
            StoreError::Database(_)
            | StoreError::Crypto(_)
            | StoreError::Serialization(_)
            | StoreError::Corrupt { .. } => ErrorKind::Unspecified,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<TransportError> for LoginStoreError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::Network(_) => ErrorKind::Network,
            TransportError::AuthInvalid(_) => ErrorKind::AuthInvalid,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<SyncError> for LoginStoreError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Transport(e) => e.into(),
            SyncError::Store(e) => e.into(),
            SyncError::Interrupted(e) => e.into(),
            SyncError::Panic(message) => Self::new(ErrorKind::Panic, message),
        }
    }
}

impl From<InvalidLogin> for LoginStoreError {
    fn from(err: InvalidLogin) -> Self {
        Self::new(ErrorKind::InvalidAddress, err.to_string())
    }
}

impl From<Interrupted> for LoginStoreError {
    fn from(err: Interrupted) -> Self {
        Self::new(ErrorKind::Interrupted, err.to_string())
    }
}

impl From<ConfigError> for LoginStoreError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Unspecified, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginstore_client::CryptoError;
    use loginstore_types::{Guid, LoginFields};

    #[test]
    fn codes_are_stable() {
        let kinds = [
            (ErrorKind::Unspecified, 1),
            (ErrorKind::Panic, 2),
            (ErrorKind::AuthInvalid, 3),
            (ErrorKind::NoSuchRecord, 4),
            (ErrorKind::DuplicateGuid, 5),
            (ErrorKind::InvalidAddress, 6),
            (ErrorKind::InvalidKey, 7),
            (ErrorKind::Network, 8),
            (ErrorKind::Interrupted, 9),
        ];
        for (kind, code) in kinds {
            assert_eq!(kind.code(), code);
            assert_eq!(ErrorKind::from_code(code), kind);
        }
    }

    #[test]
    fn unknown_code_is_unspecified() {
        assert_eq!(ErrorKind::from_code(0), ErrorKind::Unspecified);
        assert_eq!(ErrorKind::from_code(42), ErrorKind::Unspecified);
        assert_eq!(ErrorKind::from_code(-1), ErrorKind::Unspecified);
    }

    #[test]
    fn store_invalid_login_maps_to_invalid_address() {
        let invalid = loginstore_core::validate(&LoginFields::default()).unwrap_err();
        let err: LoginStoreError = StoreError::from(invalid).into();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert!(err.message().contains("hostname"));
    }

    #[test]
    fn store_identity_errors_map_correctly() {
        let err: LoginStoreError = StoreError::DuplicateGuid {
            guid: Guid::from("g"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DuplicateGuid);

        let err: LoginStoreError = StoreError::NoSuchRecord {
            guid: Guid::from("g"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NoSuchRecord);
        assert!(err.message().contains('g'));

        let err: LoginStoreError = StoreError::InvalidKey.into();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
    }

    #[test]
    fn internal_failures_are_unspecified() {
        let err: LoginStoreError = StoreError::Crypto(CryptoError::DecryptionFailed).into();
        assert_eq!(err.kind(), ErrorKind::Unspecified);
        assert!(err.message().contains("crypto"));
    }

    #[test]
    fn transport_errors_map_through_sync() {
        let err: LoginStoreError =
            SyncError::Transport(TransportError::AuthInvalid("expired".into())).into();
        assert_eq!(err.kind(), ErrorKind::AuthInvalid);
        assert!(err.message().contains("expired"));

        let err: LoginStoreError =
            SyncError::Transport(TransportError::Network("reset".into())).into();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn interrupts_map_wherever_observed() {
        let direct: LoginStoreError = SyncError::Interrupted(Interrupted).into();
        let via_store: LoginStoreError = SyncError::Store(StoreError::Interrupted(Interrupted)).into();
        assert_eq!(direct.kind(), ErrorKind::Interrupted);
        assert_eq!(via_store.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn sync_panic_maps_to_panic() {
        let err: LoginStoreError = SyncError::Panic("index out of bounds".into()).into();
        assert_eq!(err.kind(), ErrorKind::Panic);
        assert_eq!(err.message(), "index out of bounds");
        assert!(!err.kind().is_retryable());
    }

    #[test]
    fn parts_roundtrip() {
        let err = LoginStoreError::new(ErrorKind::NoSuchRecord, "no such record: x");
        let (code, message) = err.clone().into_parts();
        assert_eq!(code, 4);
        assert_eq!(LoginStoreError::from_parts(code, message), err);
    }

    #[test]
    fn display_is_human_readable() {
        let err = LoginStoreError::new(ErrorKind::InvalidKey, "invalid key or not a login database");
        assert_eq!(
            err.to_string(),
            "invalid key: invalid key or not a login database"
        );
    }
}
