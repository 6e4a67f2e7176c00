//! LoginStore: the caller-facing handle.
//!
//! Wraps one [`Store`], one [`SyncEngine`] and the store's interrupt handle
//! behind methods that return owned, flat errors.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use futures_util::FutureExt;
use loginstore_client::{
    panic_message, ImportMetrics, Store, StoreConfig, SyncCredentials, SyncEngine, SyncListener,
    Transport,
};
use loginstore_core::InterruptHandle;
use loginstore_types::{Guid, Login, LoginChanges};

use crate::error::{ErrorKind, LoginStoreError};
use crate::types::{StoreStatus, SyncResult};

/// Handle to an open login store.
///
/// Safe to share between tasks; writes are serialized inside the store and
/// sync passes run one at a time.
pub struct LoginStore {
    store: Store,
    engine: SyncEngine,
    interrupts: InterruptHandle,
    remote: RwLock<Option<Arc<dyn Transport>>>,
    last_error: Mutex<Option<LoginStoreError>>,
}

impl std::fmt::Debug for LoginStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginStore")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl LoginStore {
    /// Open (or create) the database at `path` with `key`.
    ///
    /// Fails with `InvalidKey` if the key is wrong or the file is not a
    /// login database.
    pub async fn open(
        path: impl AsRef<Path>,
        key: &str,
        config: &StoreConfig,
    ) -> Result<Self, LoginStoreError> {
        let path = path.as_ref();
        let store = guarded(Store::open(path, key, config)).await?;
        Ok(Self::from_store(store, config))
    }

    /// Open a store that lives only in memory.
    pub async fn open_in_memory(key: &str, config: &StoreConfig) -> Result<Self, LoginStoreError> {
        let store = guarded(Store::open_in_memory(key, config)).await?;
        Ok(Self::from_store(store, config))
    }

    fn from_store(store: Store, config: &StoreConfig) -> Self {
        Self {
            engine: SyncEngine::new(store.clone(), config.sync.clone()),
            interrupts: store.interrupt_handle(),
            store,
            remote: RwLock::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Use `remote` for subsequent sync passes.
    pub fn with_remote(self, remote: Arc<dyn Transport>) -> Self {
        self.set_remote(remote);
        self
    }

    /// Replace the remote used for sync passes.
    pub fn set_remote(&self, remote: Arc<dyn Transport>) {
        *self.remote.write().unwrap_or_else(|e| e.into_inner()) = Some(remote);
    }

    /// Deliver sync progress events to `listener`.
    pub fn with_sync_listener(mut self, listener: SyncListener) -> Self {
        self.engine = self.engine.with_listener(listener);
        self
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Store a new login and return it with its guid and timestamps.
    pub async fn add(&self, login: Login) -> Result<Login, LoginStoreError> {
        self.call(self.store.add(login)).await
    }

    /// Apply changes to an existing login.
    pub async fn update(
        &self,
        guid: &Guid,
        changes: LoginChanges,
    ) -> Result<Login, LoginStoreError> {
        self.call(self.store.update(guid, changes)).await
    }

    /// Record a use of a login.
    pub async fn touch(&self, guid: &Guid) -> Result<Login, LoginStoreError> {
        self.call(self.store.touch(guid)).await
    }

    /// Fetch a login.
    pub async fn get(&self, guid: &Guid) -> Result<Option<Login>, LoginStoreError> {
        self.call(self.store.get(guid)).await
    }

    /// Delete a login. Returns whether one existed.
    pub async fn delete(&self, guid: &Guid) -> Result<bool, LoginStoreError> {
        self.call(self.store.delete(guid)).await
    }

    /// All logins, ordered by hostname then guid.
    pub async fn list(&self) -> Result<Vec<Login>, LoginStoreError> {
        self.call(self.store.list()).await
    }

    /// Logins for one hostname.
    pub async fn get_by_hostname(&self, hostname: &str) -> Result<Vec<Login>, LoginStoreError> {
        self.call(self.store.get_by_hostname(hostname)).await
    }

    /// Number of logins.
    pub async fn count(&self) -> Result<usize, LoginStoreError> {
        self.call(self.store.count()).await
    }

    // =========================================================================
    // Bulk
    // =========================================================================

    /// Import many logins at once, skipping invalid and duplicate ones.
    pub async fn import(&self, logins: Vec<Login>) -> Result<ImportMetrics, LoginStoreError> {
        self.call(self.store.import(logins)).await
    }

    /// Delete every login (the deletions sync).
    pub async fn wipe(&self) -> Result<usize, LoginStoreError> {
        self.call(self.store.wipe()).await
    }

    /// Remove all local data without syncing the removal.
    pub async fn wipe_local(&self) -> Result<(), LoginStoreError> {
        self.call(self.store.wipe_local()).await
    }

    /// Forget sync history so the next pass re-uploads everything.
    pub async fn reset_sync(&self) -> Result<(), LoginStoreError> {
        self.call(self.store.reset_sync()).await
    }

    /// Re-encrypt the store under `new_key`.
    pub async fn rekey(&self, new_key: &str) -> Result<(), LoginStoreError> {
        self.call(self.store.rekey(new_key)).await
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Run a sync pass against the configured remote.
    pub async fn sync(&self, credentials: &SyncCredentials) -> Result<SyncResult, LoginStoreError> {
        let remote = self
            .remote
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(remote) = remote else {
            let err = LoginStoreError::new(ErrorKind::Unspecified, "no remote configured");
            self.record(&err);
            return Err(err);
        };

        let summary = self
            .call(self.engine.sync(remote.as_ref(), credentials))
            .await?;
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(summary.into())
    }

    /// Abort every operation currently running on this store.
    ///
    /// Operations started afterwards run normally.
    pub fn interrupt(&self) {
        tracing::debug!("Interrupt requested");
        self.interrupts.interrupt();
    }

    /// Sync state and the last error.
    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            state: self.engine.phase().into(),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    /// Position in the remote change history applied so far.
    pub async fn sync_marker(&self) -> Result<u64, LoginStoreError> {
        let marker = self.call(self.store.sync_marker()).await?;
        Ok(marker.value())
    }

    async fn call<T, E>(&self, operation: impl Future<Output = Result<T, E>>) -> Result<T, LoginStoreError>
    where
        E: Into<LoginStoreError>,
    {
        let result = guarded(operation).await;
        if let Err(err) = &result {
            self.record(err);
        }
        result
    }

    fn record(&self, err: &LoginStoreError) {
        tracing::debug!("Call failed ({}): {}", err.kind().code(), err);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.clone());
    }
}

/// Run `operation`, flattening its error and turning a panic into a
/// `Panic` error.
async fn guarded<T, E>(operation: impl Future<Output = Result<T, E>>) -> Result<T, LoginStoreError>
where
    E: Into<LoginStoreError>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Call panicked: {}", message);
            Err(LoginStoreError::new(ErrorKind::Panic, message))
        }
    }
}
