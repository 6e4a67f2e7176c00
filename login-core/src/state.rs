//! Sync pass state machine for loginstore.
//!
//! This module provides a pure, side-effect-free state machine for a single
//! sync pass. The state machine takes events as input and produces a new
//! phase plus a list of actions to execute.
//!
//! The actual I/O (talking to the remote, writing the store) is performed by
//! the engine in login-client, not by this module.

use loginstore_types::{Cursor, Guid};

/// Phase of a sync pass - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No pass running.
    #[default]
    Idle,
    /// Checking sync credentials with the remote.
    Authenticating,
    /// Pulling remote changes since the sync marker.
    Fetching,
    /// Deciding, record by record, what to do with each remote change.
    Reconciling,
    /// Committing the decisions to the store.
    Applying,
    /// Sending local changes to the remote.
    Uploading,
}

impl SyncPhase {
    /// Create a state machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions.
    pub fn on_event(self, event: PassEvent) -> (Self, Vec<Action>) {
        match (self, event) {
            (Self::Idle, PassEvent::PassRequested) => (
                Self::Authenticating,
                vec![
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Authenticating)),
                    Action::Authenticate,
                ],
            ),

            (Self::Authenticating, PassEvent::AuthSucceeded) => (
                Self::Fetching,
                vec![
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Fetching)),
                    Action::Fetch,
                ],
            ),

            (Self::Fetching, PassEvent::FetchCompleted { .. }) => (
                Self::Reconciling,
                vec![
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Reconciling)),
                    Action::Reconcile,
                ],
            ),

            (Self::Reconciling, PassEvent::ReconcileCompleted { .. }) => (
                Self::Applying,
                vec![
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Applying)),
                    Action::Apply,
                ],
            ),

            (Self::Applying, PassEvent::ApplyCompleted) => (
                Self::Uploading,
                vec![
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Uploading)),
                    Action::Upload,
                ],
            ),

            (Self::Uploading, PassEvent::UploadCompleted { summary }) => (
                Self::Idle,
                vec![
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Idle)),
                    Action::EmitEvent(SyncEvent::PassFinished { summary }),
                    Action::Finish,
                ],
            ),

            // Any failure while a pass runs ends the pass.
            (phase, PassEvent::Failed { error }) if phase != Self::Idle => (
                Self::Idle,
                vec![
                    Action::EmitEvent(SyncEvent::PassFailed { phase, error }),
                    Action::EmitEvent(SyncEvent::PhaseChanged(Self::Idle)),
                    Action::Finish,
                ],
            ),

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, vec![]),
        }
    }

    /// Check whether a pass is in progress.
    pub fn is_syncing(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Events that drive a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassEvent {
    /// Caller asked for a sync.
    PassRequested,
    /// The remote accepted the credentials.
    AuthSucceeded,
    /// All remote pages were fetched.
    FetchCompleted {
        /// Number of remote records fetched.
        records: usize,
    },
    /// Every fetched record was checked and queued for applying.
    ReconcileCompleted {
        /// Number of fetched records that carry a guid.
        planned: usize,
    },
    /// Every decision was committed (or skipped).
    ApplyCompleted,
    /// Local changes were uploaded.
    UploadCompleted {
        /// Totals for the whole pass.
        summary: SyncSummary,
    },
    /// The current step failed.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the sync engine.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Validate credentials with the remote.
    Authenticate,
    /// Fetch remote changes since the marker.
    Fetch,
    /// Compute per-record decisions.
    Reconcile,
    /// Commit decisions to the store.
    Apply,
    /// Send local changes.
    Upload,
    /// The pass is over.
    Finish,
    /// Emit an event to the application.
    EmitEvent(SyncEvent),
}

/// Totals for one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Remote records fetched.
    pub fetched: usize,
    /// Remote records committed locally.
    pub applied: usize,
    /// Remote records skipped because they could not be stored.
    pub skipped: usize,
    /// Local records uploaded (including deletions).
    pub uploaded: usize,
    /// Local tombstones dropped without upload.
    pub dropped_tombstones: usize,
    /// Sync marker at the end of the pass.
    pub marker: Cursor,
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The pass moved to a new phase.
    PhaseChanged(SyncPhase),
    /// A remote record was committed and the marker advanced to `cursor`.
    RecordApplied {
        /// The record.
        guid: Guid,
        /// The new sync marker.
        cursor: Cursor,
    },
    /// A remote record could not be stored and was skipped.
    RecordSkipped {
        /// The record.
        guid: Guid,
        /// Why it was skipped.
        reason: String,
    },
    /// The pass completed.
    PassFinished {
        /// Totals for the pass.
        summary: SyncSummary,
    },
    /// The pass failed.
    PassFailed {
        /// Phase in which the failure happened.
        phase: SyncPhase,
        /// Error message describing the failure.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_action(actions: &[Action], wanted: &Action) -> bool {
        actions.iter().any(|a| a == wanted)
    }

    #[test]
    fn starts_idle() {
        let phase = SyncPhase::new();
        assert!(matches!(phase, SyncPhase::Idle));
        assert!(!phase.is_syncing());
    }

    #[test]
    fn pass_request_transitions_to_authenticating() {
        let (phase, actions) = SyncPhase::Idle.on_event(PassEvent::PassRequested);

        assert_eq!(phase, SyncPhase::Authenticating);
        assert!(has_action(&actions, &Action::Authenticate));
        assert!(phase.is_syncing());
    }

    #[test]
    fn full_pass_walks_every_phase() {
        let steps = [
            (PassEvent::PassRequested, SyncPhase::Authenticating, Action::Authenticate),
            (PassEvent::AuthSucceeded, SyncPhase::Fetching, Action::Fetch),
            (
                PassEvent::FetchCompleted { records: 3 },
                SyncPhase::Reconciling,
                Action::Reconcile,
            ),
            (
                PassEvent::ReconcileCompleted { planned: 2 },
                SyncPhase::Applying,
                Action::Apply,
            ),
            (PassEvent::ApplyCompleted, SyncPhase::Uploading, Action::Upload),
            (
                PassEvent::UploadCompleted {
                    summary: SyncSummary::default(),
                },
                SyncPhase::Idle,
                Action::Finish,
            ),
        ];

        let mut phase = SyncPhase::Idle;
        for (event, expected_phase, expected_action) in steps {
            let (next, actions) = phase.on_event(event);
            assert_eq!(next, expected_phase);
            assert!(has_action(&actions, &expected_action), "{:?}", actions);
            assert!(has_action(
                &actions,
                &Action::EmitEvent(SyncEvent::PhaseChanged(expected_phase))
            ));
            phase = next;
        }
    }

    #[test]
    fn failure_returns_to_idle_and_reports_phase() {
        let (phase, actions) = SyncPhase::Fetching.on_event(PassEvent::Failed {
            error: "connection reset".into(),
        });

        assert_eq!(phase, SyncPhase::Idle);
        assert!(has_action(&actions, &Action::Finish));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitEvent(SyncEvent::PassFailed {
                phase: SyncPhase::Fetching,
                ..
            })
        )));
    }

    #[test]
    fn failure_while_idle_is_ignored() {
        let (phase, actions) = SyncPhase::Idle.on_event(PassEvent::Failed {
            error: "late".into(),
        });
        assert_eq!(phase, SyncPhase::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let (phase, actions) = SyncPhase::Authenticating.on_event(PassEvent::ApplyCompleted);
        assert_eq!(phase, SyncPhase::Authenticating);
        assert!(actions.is_empty());

        let (phase, actions) = SyncPhase::Applying.on_event(PassEvent::PassRequested);
        assert_eq!(phase, SyncPhase::Applying);
        assert!(actions.is_empty());
    }

    #[test]
    fn finish_emits_summary() {
        let summary = SyncSummary {
            fetched: 4,
            applied: 3,
            skipped: 1,
            uploaded: 2,
            dropped_tombstones: 0,
            marker: Cursor::new(9),
        };
        let (_, actions) = SyncPhase::Uploading.on_event(PassEvent::UploadCompleted { summary });
        assert!(has_action(
            &actions,
            &Action::EmitEvent(SyncEvent::PassFinished { summary })
        ));
    }
}
