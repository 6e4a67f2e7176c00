//! FFI-friendly types for loginstore-bridge.
//!
//! All types here are flat: no generics, no lifetimes, no trait objects.

use loginstore_core::{SyncPhase, SyncSummary};

use crate::error::LoginStoreError;

/// Whether a sync pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No pass running.
    #[default]
    Idle,
    /// A pass is in progress.
    Syncing,
}

impl From<SyncPhase> for SyncState {
    fn from(phase: SyncPhase) -> Self {
        if phase.is_syncing() {
            Self::Syncing
        } else {
            Self::Idle
        }
    }
}

/// Snapshot returned by [`LoginStore::status`](crate::LoginStore::status).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreStatus {
    /// Idle or syncing.
    pub state: SyncState,
    /// Most recent failure of any call, cleared by a successful sync.
    pub last_error: Option<LoginStoreError>,
}

/// Totals of a finished sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncResult {
    /// Remote changes fetched.
    pub fetched: u64,
    /// Remote changes committed locally.
    pub applied: u64,
    /// Remote changes skipped (invalid, unreadable locally, or without guid).
    pub skipped: u64,
    /// Local changes uploaded.
    pub uploaded: u64,
    /// Sync marker after the pass.
    pub marker: u64,
}

impl From<SyncSummary> for SyncResult {
    fn from(summary: SyncSummary) -> Self {
        Self {
            fetched: summary.fetched as u64,
            applied: summary.applied as u64,
            skipped: summary.skipped as u64,
            uploaded: summary.uploaded as u64,
            marker: summary.marker.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginstore_types::Cursor;

    #[test]
    fn only_idle_phase_is_idle() {
        assert_eq!(SyncState::from(SyncPhase::Idle), SyncState::Idle);
        assert_eq!(SyncState::from(SyncPhase::Fetching), SyncState::Syncing);
        assert_eq!(SyncState::from(SyncPhase::Uploading), SyncState::Syncing);
    }

    #[test]
    fn summary_flattens() {
        let summary = SyncSummary {
            fetched: 3,
            applied: 2,
            skipped: 1,
            uploaded: 4,
            dropped_tombstones: 0,
            marker: Cursor::new(9),
        };
        let result = SyncResult::from(summary);
        assert_eq!(result.applied, 2);
        assert_eq!(result.marker, 9);
    }
}
