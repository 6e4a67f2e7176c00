//! Cooperative interruption.
//!
//! An [`InterruptHandle`] is shared by everything working on one store.
//! Each operation opens an [`InterruptScope`] when it starts; the scope
//! remembers the interrupt generation it began in. Calling
//! [`InterruptHandle::interrupt`] bumps the generation, so every scope that
//! is currently open observes the request at its next checkpoint, while
//! scopes opened afterwards run normally.
//!
//! Cancellation is cooperative only. Code polls
//! [`InterruptScope::err_if_interrupted`] at checkpoints, and blocking waits
//! race [`InterruptScope::interrupted`] so no wait outlives a request.

use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

/// The operation observed an interrupt request at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation interrupted")]
pub struct Interrupted;

/// State of an interrupt scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptState {
    /// No interrupt has been requested since the scope began.
    Running,
    /// An interrupt was requested; the operation must abort.
    InterruptRequested,
}

#[derive(Debug, Default)]
struct Shared {
    generation: AtomicU64,
    notify: Notify,
}

/// Shared interrupt trigger.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    shared: Arc<Shared>,
}

impl InterruptHandle {
    /// Create a new handle with no pending interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask all in-flight operations to abort.
    ///
    /// Idempotent for any open scope: calling it again changes nothing for
    /// a scope that has already been interrupted.
    pub fn interrupt(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    /// Open a scope for a new operation.
    pub fn begin_scope(&self) -> InterruptScope {
        InterruptScope {
            started_at: self.shared.generation.load(Ordering::SeqCst),
            shared: Arc::clone(&self.shared),
        }
    }
}

/// The interrupt view of a single operation.
#[derive(Debug, Clone)]
pub struct InterruptScope {
    started_at: u64,
    shared: Arc<Shared>,
}

impl InterruptScope {
    /// Current state of this scope.
    pub fn state(&self) -> InterruptState {
        if self.was_interrupted() {
            InterruptState::InterruptRequested
        } else {
            InterruptState::Running
        }
    }

    /// Whether an interrupt arrived after this scope began.
    pub fn was_interrupted(&self) -> bool {
        self.shared.generation.load(Ordering::SeqCst) != self.started_at
    }

    /// Checkpoint: fail with [`Interrupted`] if an interrupt arrived.
    pub fn err_if_interrupted(&self) -> Result<(), Interrupted> {
        if self.was_interrupted() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Resolve once this scope is interrupted.
    ///
    /// Meant to be raced against lock acquisition with `tokio::select!`.
    pub async fn interrupted(&self) {
        loop {
            let mut notified = pin!(self.shared.notify.notified());
            // Register before checking so an interrupt between the check and
            // the await still wakes us.
            notified.as_mut().enable();
            if self.was_interrupted() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_scope_is_running() {
        let handle = InterruptHandle::new();
        let scope = handle.begin_scope();
        assert_eq!(scope.state(), InterruptState::Running);
        assert!(scope.err_if_interrupted().is_ok());
    }

    #[test]
    fn interrupt_reaches_open_scope() {
        let handle = InterruptHandle::new();
        let scope = handle.begin_scope();
        handle.interrupt();
        assert_eq!(scope.state(), InterruptState::InterruptRequested);
        assert_eq!(scope.err_if_interrupted(), Err(Interrupted));
    }

    #[test]
    fn interrupt_is_idempotent() {
        let handle = InterruptHandle::new();
        let scope = handle.begin_scope();
        handle.interrupt();
        handle.interrupt();
        assert!(scope.was_interrupted());
    }

    #[test]
    fn fresh_scope_after_interrupt_runs() {
        let handle = InterruptHandle::new();
        handle.interrupt();
        let scope = handle.begin_scope();
        assert_eq!(scope.state(), InterruptState::Running);
    }

    #[test]
    fn clones_share_the_trigger() {
        let handle = InterruptHandle::new();
        let other = handle.clone();
        let scope = handle.begin_scope();
        other.interrupt();
        assert!(scope.was_interrupted());
    }

    #[tokio::test]
    async fn interrupted_future_wakes_waiter() {
        let handle = InterruptHandle::new();
        let scope = handle.begin_scope();
        let trigger = handle.clone();

        let waiter = tokio::spawn(async move { scope.interrupted().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.interrupt();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on interrupt")
            .unwrap();
    }

    #[tokio::test]
    async fn interrupted_future_resolves_immediately_when_already_interrupted() {
        let handle = InterruptHandle::new();
        let scope = handle.begin_scope();
        handle.interrupt();
        tokio::time::timeout(Duration::from_millis(100), scope.interrupted())
            .await
            .expect("already interrupted");
    }
}
