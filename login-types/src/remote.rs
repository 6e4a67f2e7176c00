//! Sync exchange types.
//!
//! These describe what flows between the local sync engine and the remote
//! collection. How they are encoded and encrypted on the wire is the
//! transport's business, not ours.

use serde::{Deserialize, Serialize};

use crate::{Cursor, Guid, Login};

/// A record as seen by the remote collection: either a live login or a
/// deletion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncRecord {
    /// A live login.
    Login(Login),
    /// A deletion that must propagate to other stores.
    Tombstone {
        /// Identifier of the deleted record.
        guid: Guid,
        /// Deletion time in Unix milliseconds.
        deleted_at: i64,
    },
}

impl SyncRecord {
    /// Identifier of the record.
    pub fn guid(&self) -> &Guid {
        match self {
            Self::Login(login) => &login.guid,
            Self::Tombstone { guid, .. } => guid,
        }
    }

    /// Modification (or deletion) time in Unix milliseconds.
    pub fn modified(&self) -> i64 {
        match self {
            Self::Login(login) => login.meta.time_last_modified,
            Self::Tombstone { deleted_at, .. } => *deleted_at,
        }
    }

    /// Whether this is a deletion marker.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone { .. })
    }

    /// The live login, if any.
    pub fn as_login(&self) -> Option<&Login> {
        match self {
            Self::Login(login) => Some(login),
            Self::Tombstone { .. } => None,
        }
    }
}

/// A change pulled from the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote-assigned position in the change history.
    pub cursor: Cursor,
    /// The record content.
    pub record: SyncRecord,
}

impl RemoteRecord {
    /// Identifier of the record.
    pub fn guid(&self) -> &Guid {
        self.record.guid()
    }

    /// Modification time in Unix milliseconds.
    pub fn modified(&self) -> i64 {
        self.record.modified()
    }
}

/// One page of remote changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedChanges {
    /// Changes ordered by ascending cursor.
    pub records: Vec<RemoteRecord>,
    /// Whether more changes exist after this page.
    pub has_more: bool,
    /// Highest cursor the remote has assigned so far.
    pub max_cursor: Cursor,
}

/// Acknowledgement of an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    /// Number of records the remote accepted.
    pub accepted: u32,
    /// Highest cursor after the upload was stored.
    pub max_cursor: Cursor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoginFields;

    #[test]
    fn tombstone_accessors() {
        let record = SyncRecord::Tombstone {
            guid: Guid::from("gone"),
            deleted_at: 42,
        };
        assert!(record.is_tombstone());
        assert_eq!(record.guid().as_str(), "gone");
        assert_eq!(record.modified(), 42);
        assert!(record.as_login().is_none());
    }

    #[test]
    fn login_record_uses_last_modified() {
        let mut login = Login::with_guid("g1", LoginFields::for_realm("https://a", "r", "", "p"));
        login.meta.time_last_modified = 20;
        let remote = RemoteRecord {
            cursor: Cursor::new(3),
            record: SyncRecord::Login(login),
        };
        assert_eq!(remote.modified(), 20);
        assert_eq!(remote.guid().as_str(), "g1");
        assert!(!remote.record.is_tombstone());
    }

    #[test]
    fn sync_record_json_is_tagged() {
        let record = SyncRecord::Tombstone {
            guid: Guid::from("x"),
            deleted_at: 1,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "tombstone");
        let back: SyncRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
