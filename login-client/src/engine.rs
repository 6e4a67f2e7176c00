//! SyncEngine - runs sync passes between a [`Store`] and a remote.
//!
//! # Architecture
//!
//! The engine drives the pure pass state machine from loginstore-core and
//! interprets the actions it returns, performing the actual I/O through the
//! [`Transport`] trait and the store.
//!
//! ```text
//! Application → SyncEngine → Transport → Remote
//!                   ↓    ↘
//!       loginstore-core   Store
//! ```
//!
//! Every remote change is committed together with the sync marker advance,
//! so an interrupted or failed pass resumes after the last applied change.
//!
//! # Example
//!
//! ```ignore
//! let engine = SyncEngine::new(store.clone(), SyncConfig::default());
//! let summary = engine.sync(&remote, &SyncCredentials::new("token")).await?;
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use loginstore_core::{
    Action, InterruptScope, Interrupted, PassEvent, SyncEvent, SyncPhase, SyncSummary,
};
use loginstore_types::{Guid, RemoteRecord};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::{ApplyOutcome, Store};
use crate::transport::{SyncCredentials, Transport, TransportError};

/// Callback receiving pass events.
pub type SyncListener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Runs sync passes for one store.
///
/// Cheap to clone; clones share the phase and only one pass runs at a time.
#[derive(Clone)]
pub struct SyncEngine {
    store: Store,
    config: SyncConfig,
    listener: Option<SyncListener>,
    phase: Arc<std::sync::Mutex<SyncPhase>>,
    pass_lock: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Working state of one pass.
#[derive(Default)]
struct Pass {
    fetched: Vec<RemoteRecord>,
    summary: SyncSummary,
}

impl SyncEngine {
    /// Create an engine for `store`.
    pub fn new(store: Store, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            listener: None,
            phase: Arc::new(std::sync::Mutex::new(SyncPhase::new())),
            pass_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Deliver pass events to `listener`.
    pub fn with_listener(mut self, listener: SyncListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Current phase of the running pass, `Idle` if none.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one sync pass.
    ///
    /// Waits for a running pass to finish first. A panic inside the pass is
    /// caught and reported as [`SyncError::Panic`].
    pub async fn sync(
        &self,
        transport: &dyn Transport,
        credentials: &SyncCredentials,
    ) -> Result<SyncSummary, SyncError> {
        let scope = self.store.begin_scope();
        let _pass = tokio::select! {
            guard = self.pass_lock.lock() => guard,
            _ = scope.interrupted() => return Err(Interrupted.into()),
        };
        scope.err_if_interrupted()?;

        let pass = AssertUnwindSafe(self.run_pass(transport, credentials, &scope));
        match pass.catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = SyncPhase::Idle;
                let message = panic_message(payload.as_ref());
                tracing::error!("Sync pass panicked: {}", message);
                Err(SyncError::Panic(message))
            }
        }
    }

    async fn run_pass(
        &self,
        transport: &dyn Transport,
        credentials: &SyncCredentials,
        scope: &InterruptScope,
    ) -> Result<SyncSummary, SyncError> {
        let mut pass = Pass::default();
        let mut queue: VecDeque<Action> = self.advance(PassEvent::PassRequested).into();

        while let Some(action) = queue.pop_front() {
            let step = match action {
                Action::EmitEvent(event) => {
                    self.emit(&event);
                    continue;
                }
                Action::Finish => break,
                Action::Authenticate => self.authenticate(transport, credentials, scope).await,
                Action::Fetch => self.fetch(transport, scope, &mut pass).await,
                Action::Reconcile => self.plan(scope, &pass),
                Action::Apply => self.apply(scope, &mut pass).await,
                Action::Upload => self.upload(transport, scope, &mut pass).await,
            };

            match step {
                Ok(event) => queue.extend(self.advance(event)),
                Err(error) => {
                    tracing::warn!("Sync pass failed: {}", error);
                    let failed = PassEvent::Failed {
                        error: error.to_string(),
                    };
                    for action in self.advance(failed) {
                        if let Action::EmitEvent(event) = action {
                            self.emit(&event);
                        }
                    }
                    return Err(error);
                }
            }
        }

        let summary = pass.summary;
        tracing::info!(
            "Sync finished: fetched {}, applied {}, skipped {}, uploaded {}, marker {}",
            summary.fetched,
            summary.applied,
            summary.skipped,
            summary.uploaded,
            summary.marker
        );
        Ok(summary)
    }

    fn advance(&self, event: PassEvent) -> Vec<Action> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        let (next, actions) = phase.on_event(event);
        *phase = next;
        actions
    }

    fn emit(&self, event: &SyncEvent) {
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }

    async fn authenticate(
        &self,
        transport: &dyn Transport,
        credentials: &SyncCredentials,
        scope: &InterruptScope,
    ) -> Result<PassEvent, SyncError> {
        interruptible(scope, transport.authenticate(credentials)).await?;
        tracing::debug!("Authenticated with remote");
        Ok(PassEvent::AuthSucceeded)
    }

    async fn fetch(
        &self,
        transport: &dyn Transport,
        scope: &InterruptScope,
        pass: &mut Pass,
    ) -> Result<PassEvent, SyncError> {
        let mut since = self.store.sync_marker().await?;

        loop {
            scope.err_if_interrupted()?;
            let page = interruptible(scope, transport.fetch_changes(since, self.config.page_size))
                .await?;
            tracing::debug!(
                "Fetched {} changes after cursor {} (more: {})",
                page.records.len(),
                since,
                page.has_more
            );

            let last = page.records.last().map(|r| r.cursor);
            pass.fetched.extend(page.records);
            match last {
                Some(cursor) if page.has_more => since = cursor,
                _ => break,
            }
        }

        pass.summary.fetched = pass.fetched.len();
        Ok(PassEvent::FetchCompleted {
            records: pass.fetched.len(),
        })
    }

    /// Walk the fetched records with an interrupt check per record.
    ///
    /// Each record is reconciled inside `apply_incoming` against the local
    /// state of that moment, so local rows are not read here.
    fn plan(&self, scope: &InterruptScope, pass: &Pass) -> Result<PassEvent, SyncError> {
        let mut planned = 0;
        for incoming in &pass.fetched {
            scope.err_if_interrupted()?;
            if incoming.guid().is_empty() {
                tracing::trace!("Remote record at {} has no guid", incoming.cursor);
            } else {
                planned += 1;
            }
        }
        Ok(PassEvent::ReconcileCompleted { planned })
    }

    async fn apply(&self, scope: &InterruptScope, pass: &mut Pass) -> Result<PassEvent, SyncError> {
        for incoming in std::mem::take(&mut pass.fetched) {
            scope.err_if_interrupted()?;
            let guid = incoming.guid().clone();

            match self.store.apply_incoming(scope, &incoming).await? {
                ApplyOutcome::Applied(resolution) => {
                    tracing::debug!("Applied {} ({})", guid, resolution.label());
                    pass.summary.applied += 1;
                    self.emit(&SyncEvent::RecordApplied {
                        guid,
                        cursor: incoming.cursor,
                    });
                }
                ApplyOutcome::Skipped(reason) => {
                    tracing::warn!("Skipping remote record {:?}: {}", guid.as_str(), reason);
                    pass.summary.skipped += 1;
                    self.emit(&SyncEvent::RecordSkipped {
                        guid,
                        reason: reason.to_string(),
                    });
                }
            }
        }
        Ok(PassEvent::ApplyCompleted)
    }

    async fn upload(
        &self,
        transport: &dyn Transport,
        scope: &InterruptScope,
        pass: &mut Pass,
    ) -> Result<PassEvent, SyncError> {
        scope.err_if_interrupted()?;
        pass.summary.dropped_tombstones = self.store.purge_unsent_tombstones(scope).await?;

        let pending = self.store.pending_uploads().await?;
        for batch in pending.chunks(self.config.upload_batch.max(1)) {
            scope.err_if_interrupted()?;
            let uploaded: Vec<(Guid, i64)> = batch
                .iter()
                .map(|record| (record.guid().clone(), record.modified()))
                .collect();

            let ack = interruptible(scope, transport.push_changes(batch.to_vec())).await?;
            self.store.mark_uploaded(scope, &uploaded).await?;
            pass.summary.uploaded += batch.len();
            tracing::debug!(
                "Uploaded {} records (remote cursor {})",
                ack.accepted,
                ack.max_cursor
            );
        }

        pass.summary.marker = self.store.sync_marker().await?;
        Ok(PassEvent::UploadCompleted {
            summary: pass.summary,
        })
    }
}

/// Await a transport call unless the scope is interrupted first.
async fn interruptible<T>(
    scope: &InterruptScope,
    call: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, SyncError> {
    tokio::select! {
        result = call => Ok(result?),
        _ = scope.interrupted() => Err(Interrupted.into()),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
