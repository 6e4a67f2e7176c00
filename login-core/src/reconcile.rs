//! Reconciliation of remote changes against local state.
//!
//! Pure decision logic: given what the store holds for a guid and what the
//! remote sent, decide what the store should end up with. The engine in
//! login-client executes the decision.
//!
//! Rules:
//! - Last writer wins by modification time. On equal times the remote copy
//!   wins, so every store resolves a tie the same way.
//! - Two live copies with different content are merged starting from the
//!   winner. The password (with its change time) comes from whichever side
//!   changed it most recently. The origin context comes from the winner
//!   unless the winner has none.
//! - A remote deletion removes the local record unless the local copy is
//!   strictly newer. A local deletion survives a remote edit only if it is
//!   strictly newer.

use loginstore_types::{Login, LoginMeta, SyncRecord};

/// Per-record sync status kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Local copy matches what the remote last acknowledged.
    Synced,
    /// Modified locally since the last sync.
    Changed,
    /// Created locally and never uploaded.
    New,
}

impl SyncStatus {
    /// Integer stored in the database.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Synced => 0,
            Self::Changed => 1,
            Self::New => 2,
        }
    }

    /// Parse the stored integer. Unknown values read as `Changed` so the
    /// record gets uploaded again rather than silently dropped.
    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::Synced,
            2 => Self::New,
            _ => Self::Changed,
        }
    }

    /// Whether the record has something to upload.
    pub fn needs_upload(self) -> bool {
        !matches!(self, Self::Synced)
    }
}

/// What the store holds for one guid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    /// Live login or tombstone.
    pub record: SyncRecord,
    /// Sync status of the row.
    pub status: SyncStatus,
}

impl LocalRecord {
    /// Modification (or deletion) time.
    pub fn modified(&self) -> i64 {
        self.record.modified()
    }
}

/// Decision for one remote change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to do. The remote deleted a record we never had.
    Ignore,
    /// Store the remote copy as synced.
    TakeRemote(Login),
    /// Store a merge of both copies and upload it.
    TakeMerged(Login),
    /// Keep the local copy (live or tombstone) and upload it.
    KeepLocal,
    /// Remove the local row entirely.
    DeleteLocal,
}

impl Resolution {
    /// Whether executing this resolution writes to the store.
    pub fn writes(&self) -> bool {
        !matches!(self, Self::Ignore)
    }

    /// Short name for logs (never includes record content).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::TakeRemote(_) => "take-remote",
            Self::TakeMerged(_) => "take-merged",
            Self::KeepLocal => "keep-local",
            Self::DeleteLocal => "delete-local",
        }
    }
}

/// Decide what to do with `remote` given the local state for its guid.
pub fn reconcile(local: Option<&LocalRecord>, remote: &SyncRecord) -> Resolution {
    let Some(local) = local else {
        return match remote {
            SyncRecord::Login(login) => Resolution::TakeRemote(login.clone()),
            SyncRecord::Tombstone { .. } => Resolution::Ignore,
        };
    };

    let local_newer = local.modified() > remote.modified();

    match (&local.record, remote) {
        (SyncRecord::Tombstone { .. }, SyncRecord::Tombstone { .. }) => Resolution::DeleteLocal,

        (SyncRecord::Login(_), SyncRecord::Tombstone { .. }) => {
            if local_newer {
                Resolution::KeepLocal
            } else {
                Resolution::DeleteLocal
            }
        }

        (SyncRecord::Tombstone { .. }, SyncRecord::Login(incoming)) => {
            if local_newer {
                Resolution::KeepLocal
            } else {
                Resolution::TakeRemote(incoming.clone())
            }
        }

        (SyncRecord::Login(ours), SyncRecord::Login(theirs)) => {
            if ours.fields == theirs.fields {
                let mut synced = theirs.clone();
                synced.meta = merge_meta(ours, theirs);
                return Resolution::TakeRemote(synced);
            }

            let merged = merge(ours, theirs);
            if merged.fields == theirs.fields {
                Resolution::TakeRemote(merged)
            } else if local_newer && merged.fields == ours.fields {
                Resolution::KeepLocal
            } else {
                Resolution::TakeMerged(merged)
            }
        }
    }
}

/// Merge two live copies of the same login.
///
/// The remote copy wins on equal modification times.
pub fn merge(local: &Login, remote: &Login) -> Login {
    let (winner, loser) = if local.modified() > remote.modified() {
        (local, remote)
    } else {
        (remote, local)
    };

    let mut merged = winner.clone();
    merged.guid = local.guid.clone();

    if loser.meta.time_password_changed > winner.meta.time_password_changed {
        merged.fields.password = loser.fields.password.clone();
        merged.meta.time_password_changed = loser.meta.time_password_changed;
    }

    if !winner.fields.has_origin_context() && loser.fields.has_origin_context() {
        merged.fields.form_submit_url = loser.fields.form_submit_url.clone();
        merged.fields.http_realm = loser.fields.http_realm.clone();
    }

    let meta = merge_meta(local, remote);
    merged.meta.time_created = meta.time_created;
    merged.meta.time_last_used = meta.time_last_used;
    merged.meta.times_used = meta.times_used;
    merged.meta.time_last_modified = meta.time_last_modified;
    merged
}

fn merge_meta(a: &Login, b: &Login) -> LoginMeta {
    let created = match (a.meta.time_created, b.meta.time_created) {
        (0, t) | (t, 0) => t,
        (x, y) => x.min(y),
    };
    LoginMeta {
        time_created: created,
        time_last_used: a.meta.time_last_used.max(b.meta.time_last_used),
        time_last_modified: a.meta.time_last_modified.max(b.meta.time_last_modified),
        time_password_changed: a
            .meta
            .time_password_changed
            .max(b.meta.time_password_changed),
        times_used: a.meta.times_used.max(b.meta.times_used),
    }
}
