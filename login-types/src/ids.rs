//! Identity and ordering types for loginstore.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes behind a generated guid (12 base64 characters).
const GUID_RANDOM_BYTES: usize = 9;

/// A globally unique record identifier.
///
/// Either supplied by the caller or generated by the store at creation.
/// Immutable once a record has been stored.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Wrap an existing identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Create a new random Guid.
    ///
    /// 9 random bytes, displayed as 12 URL-safe base64 characters.
    pub fn random() -> Self {
        let mut bytes = [0u8; GUID_RANDOM_BYTES];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// An empty guid asks the store to assign one.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Check whether the guid is unset.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the guid bytes (used as associated data for record encryption).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Guid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.0)
    }
}

/// A monotonically increasing cursor into the remote change history.
///
/// Assigned by the remote store, not by clients. The locally persisted
/// cursor is the sync marker: everything at or below it has been applied.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Cursor(u64);

impl Cursor {
    /// Create a new Cursor with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Cursor.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Create a Cursor representing "no data yet".
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment the cursor by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({})", self.0)
    }
}
