//! Transport abstraction for reaching the remote login collection.
//!
//! The sync engine only needs three things from a remote: check the sync
//! credentials, hand out changes after a cursor, and accept uploads. How the
//! bytes travel and how the payload is protected on the wire belong to the
//! implementation.
//!
//! # Example
//!
//! ```ignore
//! let remote = MockRemote::new("token");
//! remote.authenticate(&SyncCredentials::new("token")).await?;
//! let page = remote.fetch_changes(Cursor::zero(), 100).await?;
//! remote.push_changes(outgoing).await?;
//! ```

mod mock;

pub use mock::MockRemote;

use async_trait::async_trait;
use loginstore_types::{Cursor, FetchedChanges, PushAck, SyncRecord};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote could not be reached or the exchange failed midway.
    #[error("network error: {0}")]
    Network(String),

    /// The remote rejected the sync credentials.
    #[error("authentication rejected: {0}")]
    AuthInvalid(String),
}

/// Credentials presented to the remote at the start of a pass.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncCredentials {
    /// Bearer token for the remote collection.
    pub token: String,
}

impl SyncCredentials {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

// Don't leak the token in debug output
impl std::fmt::Debug for SyncCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyncCredentials {{ token: [REDACTED] }}")
    }
}

/// A remote login collection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Check the credentials. Fails with `AuthInvalid` on rejection.
    async fn authenticate(&self, credentials: &SyncCredentials) -> Result<(), TransportError>;

    /// Fetch up to `limit` changes with a cursor greater than `since`,
    /// ordered by ascending cursor.
    async fn fetch_changes(&self, since: Cursor, limit: u32)
        -> Result<FetchedChanges, TransportError>;

    /// Upload local changes.
    async fn push_changes(&self, records: Vec<SyncRecord>) -> Result<PushAck, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_is_redacted() {
        let debug = format!("{:?}", SyncCredentials::new("hunter2"));
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("hunter2"));
    }
}
