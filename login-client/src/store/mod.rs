//! Encrypted login store backed by SQLite.
//!
//! Record content is sealed with the store key before it touches disk; only
//! the guid, timestamps and sync bookkeeping are stored in the clear. Uses
//! WAL mode so readers see the last committed state while a write runs.
//!
//! Every mutation runs in one transaction under the store's write lock.
//! Waiting for the lock races the interrupt notifier, and bulk operations
//! check for interrupts between records; an interrupt drops the open
//! transaction, so nothing from the interrupted call is committed.

mod schema;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use loginstore_core::{
    next_modified, now_millis, reconcile, validate, InterruptHandle, InterruptScope, Interrupted,
    InvalidLogin, LocalRecord, Resolution, SyncStatus,
};
use loginstore_types::{
    Cursor, Guid, Login, LoginChanges, LoginFields, LoginMeta, RemoteRecord, SyncRecord,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use zeroize::Zeroizing;

use crate::config::StoreConfig;
use crate::crypto::{random_salt, Argon2Params, CryptoError, StoreKey};
use crate::error::StoreError;
use schema::Layout;

/// Column list shared by every row query.
macro_rules! select_rows {
    ($tail:literal) => {
        concat!(
            "SELECT guid, payload, time_created, time_last_used, time_last_modified, ",
            "time_password_changed, times_used, sync_status, is_deleted, server_modified, ",
            "sync_cursor FROM logins ",
            $tail
        )
    };
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportMetrics {
    /// Records offered.
    pub total: usize,
    /// Records stored.
    pub imported: usize,
    /// Records rejected by the validator.
    pub invalid: usize,
    /// Records whose guid already belongs to a live record.
    pub duplicates: usize,
}

/// Sync bookkeeping of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInfo {
    /// Upload state.
    pub status: SyncStatus,
    /// Whether the row is a tombstone.
    pub is_deleted: bool,
    /// Modification time of the version last exchanged with the remote.
    pub server_modified: i64,
    /// Remote cursor of the version last received.
    pub sync_cursor: Cursor,
}

/// Result of applying one remote change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The change was reconciled and committed.
    Applied(Resolution),
    /// Nothing was stored for the change, but the sync marker moved past it.
    Skipped(SkipReason),
}

/// Why a remote change was not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The reconciled record fails validation.
    Invalid(InvalidLogin),
    /// The remote record carries no guid.
    MissingGuid,
    /// The local copy cannot be decrypted or decoded.
    Unreadable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(invalid) => write!(f, "{}", invalid),
            Self::MissingGuid => f.write_str("remote record has no guid"),
            Self::Unreadable(reason) => write!(f, "local copy is unreadable: {}", reason),
        }
    }
}

/// An open, unlocked login store.
///
/// Cheap to clone; clones share the connection pool, the key and the write
/// lock.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    pool: SqlitePool,
    // Lock order: write_lock, then key, then a pool connection.
    key: RwLock<StoreKey>,
    write_lock: Mutex<()>,
    interrupts: InterruptHandle,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LoginRow {
    guid: String,
    payload: Option<Vec<u8>>,
    time_created: i64,
    time_last_used: i64,
    time_last_modified: i64,
    time_password_changed: i64,
    times_used: i64,
    sync_status: i64,
    is_deleted: bool,
    server_modified: i64,
    sync_cursor: i64,
}

impl LoginRow {
    fn status(&self) -> SyncStatus {
        SyncStatus::from_i64(self.sync_status)
    }

    fn meta(&self) -> LoginMeta {
        LoginMeta {
            time_created: self.time_created,
            time_last_used: self.time_last_used,
            time_last_modified: self.time_last_modified,
            time_password_changed: self.time_password_changed,
            times_used: self.times_used,
        }
    }

    fn into_login(self, key: &StoreKey) -> Result<Login, StoreError> {
        let meta = self.meta();
        let guid = Guid::from(self.guid);
        let Some(payload) = self.payload else {
            return Err(StoreError::Corrupt {
                guid,
                reason: "live record without payload".into(),
            });
        };
        let plaintext = Zeroizing::new(key.open_record(&guid, &payload)?);
        let fields = LoginFields::from_bytes(&plaintext)?;
        Ok(Login { guid, fields, meta })
    }

    fn into_local(self, key: &StoreKey) -> Result<LocalRecord, StoreError> {
        let status = self.status();
        let record = if self.is_deleted {
            SyncRecord::Tombstone {
                guid: Guid::from(self.guid),
                deleted_at: self.time_last_modified,
            }
        } else {
            SyncRecord::Login(self.into_login(key)?)
        };
        Ok(LocalRecord { record, status })
    }
}

/// Sync columns written alongside a record.
#[derive(Debug, Clone, Copy)]
struct RowSync {
    status: SyncStatus,
    server_modified: i64,
    sync_cursor: i64,
}

impl RowSync {
    fn fresh() -> Self {
        Self {
            status: SyncStatus::New,
            server_modified: 0,
            sync_cursor: 0,
        }
    }

    /// Bookkeeping after a local edit of `row`.
    fn edited(row: &LoginRow) -> Self {
        Self {
            status: edited_status(row.status()),
            server_modified: row.server_modified,
            sync_cursor: row.sync_cursor,
        }
    }
}

/// A record never uploaded stays New; anything else now has changes.
fn edited_status(previous: SyncStatus) -> SyncStatus {
    match previous {
        SyncStatus::New => SyncStatus::New,
        SyncStatus::Synced | SyncStatus::Changed => SyncStatus::Changed,
    }
}

impl Store {
    /// Open (or create) the store at `path` with `key`.
    ///
    /// A new file is initialized with a fresh salt and the configured KDF
    /// parameters. An existing file must be a login store that `key`
    /// unlocks; anything else fails with [`StoreError::InvalidKey`].
    pub async fn open(path: &Path, key: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.database.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(schema::map_open_error)?;

        let store = Self::unlock(pool, key, config).await?;
        tracing::info!("Opened login store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing and ephemeral use).
    pub async fn open_in_memory(key: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // One connection that never closes: the database lives in it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::unlock(pool, key, config).await
    }

    async fn unlock(pool: SqlitePool, key: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        match Self::derive_for(&pool, key, config).await {
            Ok(store_key) => Ok(Self {
                inner: Arc::new(StoreInner {
                    pool,
                    key: RwLock::new(store_key),
                    write_lock: Mutex::new(()),
                    interrupts: InterruptHandle::new(),
                }),
            }),
            Err(e) => {
                pool.close().await;
                Err(e)
            }
        }
    }

    async fn derive_for(
        pool: &SqlitePool,
        key: &str,
        config: &StoreConfig,
    ) -> Result<StoreKey, StoreError> {
        match schema::inspect(pool).await? {
            Layout::Empty => {
                let salt = random_salt();
                let params = config.kdf.params();
                let store_key = derive_key(key, salt.to_vec(), params).await?;
                schema::create(pool, &salt, params, &store_key.key_check()?).await?;
                tracing::debug!(
                    "Created login store (argon2: {} MiB, {} iterations)",
                    params.memory_mib(),
                    params.iterations()
                );
                Ok(store_key)
            }
            Layout::Current => {
                let meta = schema::load_meta(pool)
                    .await?
                    .ok_or(StoreError::InvalidKey)?;
                let store_key = derive_key(key, meta.salt.clone(), meta.params()?).await?;
                if store_key.verify_key_check(&meta.key_check) {
                    Ok(store_key)
                } else {
                    Err(StoreError::InvalidKey)
                }
            }
            Layout::Foreign => Err(StoreError::InvalidKey),
        }
    }

    /// The interrupt trigger shared by every operation on this store.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.inner.interrupts.clone()
    }

    /// Open an interrupt scope for a new operation.
    pub fn begin_scope(&self) -> InterruptScope {
        self.inner.interrupts.begin_scope()
    }

    async fn lock_writes(&self, scope: &InterruptScope) -> Result<MutexGuard<'_, ()>, StoreError> {
        scope.err_if_interrupted()?;
        tokio::select! {
            guard = self.inner.write_lock.lock() => {
                scope.err_if_interrupted()?;
                Ok(guard)
            }
            _ = scope.interrupted() => Err(Interrupted.into()),
        }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Store a new record.
    ///
    /// An empty guid is replaced by a random one. All timestamps are set to
    /// now; `times_used` is kept. Fails with `DuplicateGuid` if a live record
    /// has the guid. Re-adding over a tombstone is allowed.
    pub async fn add(&self, login: Login) -> Result<Login, StoreError> {
        validate(&login.fields)?;
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let key = self.inner.key.read().await;
        let mut tx = self.inner.pool.begin().await?;

        let added = insert_new(&mut tx, &key, login, now_millis()).await?;

        tx.commit().await?;
        tracing::debug!("Added login {}", added.guid);
        Ok(added)
    }

    /// Apply `changes` to a live record.
    ///
    /// The merged record is validated before anything is written; on
    /// rejection the stored record is untouched.
    pub async fn update(&self, guid: &Guid, changes: LoginChanges) -> Result<Login, StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let key = self.inner.key.read().await;
        let mut tx = self.inner.pool.begin().await?;

        let row = live_row(&mut tx, guid).await?;
        let sync = RowSync::edited(&row);
        let current = row.into_login(&key)?;

        let fields = changes.apply_to(&current.fields);
        validate(&fields)?;

        let modified = next_modified(current.meta.time_last_modified, now_millis());
        let mut meta = current.meta;
        meta.time_last_modified = modified;
        if changes.changes_password(&current.fields) {
            meta.time_password_changed = modified;
        }

        let updated = Login {
            guid: current.guid,
            fields,
            meta,
        };
        write_login(&mut tx, &key, &updated, sync).await?;

        tx.commit().await?;
        tracing::debug!("Updated login {}", updated.guid);
        Ok(updated)
    }

    /// Record a use of a live record.
    ///
    /// Bumps `time_last_modified`, `time_last_used` and `times_used`; the
    /// content is unchanged.
    pub async fn touch(&self, guid: &Guid) -> Result<Login, StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let key = self.inner.key.read().await;
        let mut tx = self.inner.pool.begin().await?;

        let row = live_row(&mut tx, guid).await?;
        let sync = RowSync::edited(&row);
        let mut login = row.into_login(&key)?;

        let modified = next_modified(login.meta.time_last_modified, now_millis());
        login.meta.time_last_modified = modified;
        login.meta.time_last_used = modified;
        login.meta.times_used = login.meta.times_used.saturating_add(1);
        write_login(&mut tx, &key, &login, sync).await?;

        tx.commit().await?;
        Ok(login)
    }

    /// Fetch a live record.
    pub async fn get(&self, guid: &Guid) -> Result<Option<Login>, StoreError> {
        let key = self.inner.key.read().await;
        let row = sqlx::query_as::<_, LoginRow>(select_rows!("WHERE guid = ?1 AND is_deleted = 0"))
            .bind(guid.as_str())
            .fetch_optional(&self.inner.pool)
            .await?;
        row.map(|r| r.into_login(&key)).transpose()
    }

    /// Delete a live record, leaving a tombstone for sync.
    ///
    /// Returns `false` if no live record has the guid.
    pub async fn delete(&self, guid: &Guid) -> Result<bool, StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let mut tx = self.inner.pool.begin().await?;

        let Some(row) = fetch_row(&mut tx, guid).await? else {
            return Ok(false);
        };
        if row.is_deleted {
            return Ok(false);
        }

        let deleted_at = next_modified(row.time_last_modified, now_millis());
        sqlx::query(
            r#"
            UPDATE logins
            SET payload = NULL, is_deleted = 1, time_last_modified = ?2, sync_status = ?3
            WHERE guid = ?1
            "#,
        )
        .bind(guid.as_str())
        .bind(deleted_at)
        .bind(edited_status(row.status()).as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("Deleted login {}", guid);
        Ok(true)
    }

    /// All live records, ordered by hostname then guid.
    pub async fn list(&self) -> Result<Vec<Login>, StoreError> {
        let scope = self.begin_scope();
        let key = self.inner.key.read().await;
        let rows = sqlx::query_as::<_, LoginRow>(select_rows!("WHERE is_deleted = 0"))
            .fetch_all(&self.inner.pool)
            .await?;

        let mut logins = Vec::with_capacity(rows.len());
        for row in rows {
            scope.err_if_interrupted()?;
            logins.push(row.into_login(&key)?);
        }
        logins.sort_by(|a, b| {
            a.fields
                .hostname
                .cmp(&b.fields.hostname)
                .then_with(|| a.guid.cmp(&b.guid))
        });
        Ok(logins)
    }

    /// Live records for one hostname, ordered by guid.
    pub async fn get_by_hostname(&self, hostname: &str) -> Result<Vec<Login>, StoreError> {
        let mut logins = self.list().await?;
        logins.retain(|login| login.fields.hostname == hostname);
        Ok(logins)
    }

    /// Number of live records.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logins WHERE is_deleted = 0")
            .fetch_one(&self.inner.pool)
            .await?;
        Ok(count as usize)
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Store many records in one transaction.
    ///
    /// Invalid records and records with a guid already in use are skipped
    /// and counted. An interrupt aborts the whole import.
    pub async fn import(&self, logins: Vec<Login>) -> Result<ImportMetrics, StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let key = self.inner.key.read().await;
        let mut tx = self.inner.pool.begin().await?;

        let mut metrics = ImportMetrics {
            total: logins.len(),
            ..ImportMetrics::default()
        };
        let now = now_millis();

        for login in logins {
            scope.err_if_interrupted()?;
            if let Err(invalid) = validate(&login.fields) {
                tracing::warn!("Skipping invalid login {} on import: {}", login.guid, invalid);
                metrics.invalid += 1;
                continue;
            }
            match insert_new(&mut tx, &key, login, now).await {
                Ok(_) => metrics.imported += 1,
                Err(StoreError::DuplicateGuid { guid }) => {
                    tracing::debug!("Skipping duplicate guid {} on import", guid);
                    metrics.duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit().await?;
        tracing::info!(
            "Imported {} of {} logins ({} invalid, {} duplicates)",
            metrics.imported,
            metrics.total,
            metrics.invalid,
            metrics.duplicates
        );
        Ok(metrics)
    }

    /// Delete every live record, leaving tombstones so the deletion syncs.
    ///
    /// Returns the number of records deleted.
    pub async fn wipe(&self) -> Result<usize, StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let mut tx = self.inner.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE logins
            SET payload = NULL,
                is_deleted = 1,
                time_last_modified = MAX(?1, time_last_modified + 1),
                sync_status = CASE WHEN sync_status = ?2 THEN ?2 ELSE ?3 END
            WHERE is_deleted = 0
            "#,
        )
        .bind(now_millis())
        .bind(SyncStatus::New.as_i64())
        .bind(SyncStatus::Changed.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        let wiped = result.rows_affected() as usize;
        tracing::info!("Wiped {} logins", wiped);
        Ok(wiped)
    }

    /// Remove every row and all sync state, without leaving tombstones.
    pub async fn wipe_local(&self) -> Result<(), StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let mut tx = self.inner.pool.begin().await?;

        sqlx::query("DELETE FROM logins").execute(&mut *tx).await?;
        sqlx::query("UPDATE store_meta SET sync_marker = 0 WHERE id = 1")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Wiped local login store");
        Ok(())
    }

    /// Forget all sync history: live records become New, tombstones are
    /// dropped and the sync marker is cleared.
    pub async fn reset_sync(&self) -> Result<(), StoreError> {
        let scope = self.begin_scope();
        let _guard = self.lock_writes(&scope).await?;
        let mut tx = self.inner.pool.begin().await?;

        sqlx::query("DELETE FROM logins WHERE is_deleted = 1")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE logins SET sync_status = ?1, server_modified = 0, sync_cursor = 0")
            .bind(SyncStatus::New.as_i64())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE store_meta SET sync_marker = 0 WHERE id = 1")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Reset sync state");
        Ok(())
    }

    /// Re-encrypt every record under a new key.
    ///
    /// A fresh salt is generated; the KDF parameters of the store are kept.
    /// The old key stays valid until the transaction commits.
    pub async fn rekey(&self, new_key: &str) -> Result<(), StoreError> {
        let scope = self.begin_scope();
        let meta = schema::load_meta(&self.inner.pool)
            .await?
            .ok_or(StoreError::InvalidKey)?;
        let salt = random_salt();
        let replacement = derive_key(new_key, salt.to_vec(), meta.params()?).await?;

        let _guard = self.lock_writes(&scope).await?;
        let mut key = self.inner.key.write().await;
        let mut tx = self.inner.pool.begin().await?;

        let rows = sqlx::query_as::<_, LoginRow>(select_rows!("WHERE payload IS NOT NULL"))
            .fetch_all(&mut *tx)
            .await?;

        for row in rows {
            scope.err_if_interrupted()?;
            let guid = Guid::from(row.guid.as_str());
            let Some(payload) = row.payload else { continue };
            let plaintext = Zeroizing::new(key.open_record(&guid, &payload)?);
            let sealed = replacement.seal_record(&guid, &plaintext)?;
            sqlx::query("UPDATE logins SET payload = ?2 WHERE guid = ?1")
                .bind(guid.as_str())
                .bind(sealed)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE store_meta SET salt = ?1, key_check = ?2 WHERE id = 1")
            .bind(salt.as_slice())
            .bind(replacement.key_check()?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        *key = replacement;
        tracing::info!("Re-encrypted login store under a new key");
        Ok(())
    }

    // =========================================================================
    // Sync support
    // =========================================================================

    /// Sync bookkeeping for a row (tombstones included).
    pub async fn sync_info(&self, guid: &Guid) -> Result<Option<SyncInfo>, StoreError> {
        let row = sqlx::query_as::<_, LoginRow>(select_rows!("WHERE guid = ?1"))
            .bind(guid.as_str())
            .fetch_optional(&self.inner.pool)
            .await?;
        Ok(row.map(|row| SyncInfo {
            status: row.status(),
            is_deleted: row.is_deleted,
            server_modified: row.server_modified,
            sync_cursor: Cursor::new(row.sync_cursor as u64),
        }))
    }

    /// Position in the remote change history applied so far.
    pub async fn sync_marker(&self) -> Result<Cursor, StoreError> {
        let marker: i64 = sqlx::query_scalar("SELECT sync_marker FROM store_meta WHERE id = 1")
            .fetch_one(&self.inner.pool)
            .await?;
        Ok(Cursor::new(marker as u64))
    }

    /// Local state of a record, tombstones included.
    pub async fn local_record(&self, guid: &Guid) -> Result<Option<LocalRecord>, StoreError> {
        let key = self.inner.key.read().await;
        let row = sqlx::query_as::<_, LoginRow>(select_rows!("WHERE guid = ?1"))
            .bind(guid.as_str())
            .fetch_optional(&self.inner.pool)
            .await?;
        row.map(|r| r.into_local(&key)).transpose()
    }

    /// Reconcile one remote change against fresh local state and commit the
    /// result together with the marker advance.
    pub async fn apply_incoming(
        &self,
        scope: &InterruptScope,
        incoming: &RemoteRecord,
    ) -> Result<ApplyOutcome, StoreError> {
        let _guard = self.lock_writes(scope).await?;
        let key = self.inner.key.read().await;
        let mut tx = self.inner.pool.begin().await?;

        let guid = incoming.guid();
        let server_modified = incoming.modified();
        let sync_cursor = incoming.cursor.value() as i64;

        if guid.is_empty() {
            advance_marker(&mut tx, sync_cursor).await?;
            tx.commit().await?;
            return Ok(ApplyOutcome::Skipped(SkipReason::MissingGuid));
        }

        let local = match fetch_row(&mut tx, guid).await? {
            Some(row) => match row.into_local(&key) {
                Ok(local) => Some(local),
                Err(err) if err.is_record_scoped() => {
                    advance_marker(&mut tx, sync_cursor).await?;
                    tx.commit().await?;
                    return Ok(ApplyOutcome::Skipped(SkipReason::Unreadable(err.to_string())));
                }
                Err(err) => return Err(err),
            },
            None => None,
        };
        let resolution = reconcile(local.as_ref(), &incoming.record);

        let skipped = match &resolution {
            Resolution::Ignore => None,
            Resolution::TakeRemote(login) | Resolution::TakeMerged(login) => {
                match validate(&login.fields) {
                    Err(invalid) => Some(SkipReason::Invalid(invalid)),
                    Ok(()) => {
                        let status = if matches!(resolution, Resolution::TakeRemote(_)) {
                            SyncStatus::Synced
                        } else {
                            SyncStatus::Changed
                        };
                        let sync = RowSync {
                            status,
                            server_modified,
                            sync_cursor,
                        };
                        write_login(&mut tx, &key, login, sync).await?;
                        None
                    }
                }
            }
            Resolution::KeepLocal => {
                sqlx::query(
                    r#"
                    UPDATE logins SET sync_status = ?2, server_modified = ?3, sync_cursor = ?4
                    WHERE guid = ?1
                    "#,
                )
                .bind(guid.as_str())
                .bind(SyncStatus::Changed.as_i64())
                .bind(server_modified)
                .bind(sync_cursor)
                .execute(&mut *tx)
                .await?;
                None
            }
            Resolution::DeleteLocal => {
                sqlx::query("DELETE FROM logins WHERE guid = ?1")
                    .bind(guid.as_str())
                    .execute(&mut *tx)
                    .await?;
                None
            }
        };

        advance_marker(&mut tx, sync_cursor).await?;

        tx.commit().await?;
        Ok(match skipped {
            Some(reason) => ApplyOutcome::Skipped(reason),
            None => ApplyOutcome::Applied(resolution),
        })
    }

    /// Drop tombstones of records that were never uploaded.
    pub async fn purge_unsent_tombstones(&self, scope: &InterruptScope) -> Result<usize, StoreError> {
        let _guard = self.lock_writes(scope).await?;
        let result = sqlx::query("DELETE FROM logins WHERE is_deleted = 1 AND sync_status = ?1")
            .bind(SyncStatus::New.as_i64())
            .execute(&self.inner.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    /// Records (and tombstones) with changes the remote has not seen,
    /// ordered by guid.
    ///
    /// Rows that cannot be decrypted or decoded are left out and stay
    /// pending.
    pub async fn pending_uploads(&self) -> Result<Vec<SyncRecord>, StoreError> {
        let key = self.inner.key.read().await;
        let rows = sqlx::query_as::<_, LoginRow>(select_rows!(
            "WHERE sync_status != 0 ORDER BY guid"
        ))
        .fetch_all(&self.inner.pool)
        .await?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let guid = row.guid.clone();
            match row.into_local(&key) {
                Ok(local) => pending.push(local.record),
                Err(err) if err.is_record_scoped() => {
                    tracing::warn!("Not uploading unreadable record {}: {}", guid, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(pending)
    }

    /// Record that the remote accepted these versions.
    ///
    /// Each entry is `(guid, modified)` of an uploaded version. Rows edited
    /// again since the upload keep their pending status. Uploaded
    /// tombstones are purged.
    pub async fn mark_uploaded(
        &self,
        scope: &InterruptScope,
        uploaded: &[(Guid, i64)],
    ) -> Result<(), StoreError> {
        let _guard = self.lock_writes(scope).await?;
        let mut tx = self.inner.pool.begin().await?;

        for (guid, modified) in uploaded {
            scope.err_if_interrupted()?;
            sqlx::query(
                r#"
                UPDATE logins SET sync_status = ?3, server_modified = time_last_modified
                WHERE guid = ?1 AND time_last_modified = ?2 AND is_deleted = 0
                "#,
            )
            .bind(guid.as_str())
            .bind(modified)
            .bind(SyncStatus::Synced.as_i64())
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "DELETE FROM logins WHERE guid = ?1 AND time_last_modified = ?2 AND is_deleted = 1",
            )
            .bind(guid.as_str())
            .bind(modified)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn derive_key(
    key: &str,
    salt: Vec<u8>,
    params: Argon2Params,
) -> Result<StoreKey, StoreError> {
    let key = Zeroizing::new(key.to_string());
    // Argon2 is CPU-bound; keep it off the async workers.
    let derived = tokio::task::spawn_blocking(move || StoreKey::derive(&key, &salt, params))
        .await
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))??;
    Ok(derived)
}

async fn fetch_row(
    tx: &mut Transaction<'_, Sqlite>,
    guid: &Guid,
) -> Result<Option<LoginRow>, StoreError> {
    let row = sqlx::query_as::<_, LoginRow>(select_rows!("WHERE guid = ?1"))
        .bind(guid.as_str())
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

/// Move the sync marker forward to `cursor`; it never moves back.
async fn advance_marker(tx: &mut Transaction<'_, Sqlite>, cursor: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE store_meta SET sync_marker = MAX(sync_marker, ?1) WHERE id = 1")
        .bind(cursor)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn live_row(tx: &mut Transaction<'_, Sqlite>, guid: &Guid) -> Result<LoginRow, StoreError> {
    match fetch_row(tx, guid).await? {
        Some(row) if !row.is_deleted => Ok(row),
        _ => Err(StoreError::NoSuchRecord { guid: guid.clone() }),
    }
}

/// Insert a validated record as new local content.
async fn insert_new(
    tx: &mut Transaction<'_, Sqlite>,
    key: &StoreKey,
    mut login: Login,
    now: i64,
) -> Result<Login, StoreError> {
    if login.guid.is_empty() {
        login.guid = Guid::random();
    }

    let existing = fetch_row(tx, &login.guid).await?;
    let (sync, created) = match &existing {
        Some(row) if !row.is_deleted => {
            return Err(StoreError::DuplicateGuid { guid: login.guid });
        }
        // Re-adding over a tombstone: the remote may know the guid.
        Some(row) => (
            RowSync::edited(row),
            next_modified(row.time_last_modified, now),
        ),
        None => (RowSync::fresh(), now),
    };

    login.meta = LoginMeta {
        time_created: created,
        time_last_used: created,
        time_last_modified: created,
        time_password_changed: created,
        times_used: login.meta.times_used,
    };
    write_login(tx, key, &login, sync).await?;
    Ok(login)
}

/// Insert or replace a live row.
async fn write_login(
    tx: &mut Transaction<'_, Sqlite>,
    key: &StoreKey,
    login: &Login,
    sync: RowSync,
) -> Result<(), StoreError> {
    let plaintext = Zeroizing::new(login.fields.to_bytes()?);
    let payload = key.seal_record(&login.guid, &plaintext)?;

    sqlx::query(
        r#"
        INSERT INTO logins (
            guid, payload, time_created, time_last_used, time_last_modified,
            time_password_changed, times_used, sync_status, is_deleted,
            server_modified, sync_cursor
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)
        ON CONFLICT(guid) DO UPDATE SET
            payload = excluded.payload,
            time_created = excluded.time_created,
            time_last_used = excluded.time_last_used,
            time_last_modified = excluded.time_last_modified,
            time_password_changed = excluded.time_password_changed,
            times_used = excluded.times_used,
            sync_status = excluded.sync_status,
            is_deleted = 0,
            server_modified = excluded.server_modified,
            sync_cursor = excluded.sync_cursor
        "#,
    )
    .bind(login.guid.as_str())
    .bind(payload)
    .bind(login.meta.time_created)
    .bind(login.meta.time_last_used)
    .bind(login.meta.time_last_modified)
    .bind(login.meta.time_password_changed)
    .bind(login.meta.times_used)
    .bind(sync.status.as_i64())
    .bind(sync.server_modified)
    .bind(sync.sync_cursor)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
impl Store {
    /// Overwrite a row's sealed payload with bytes that cannot be opened.
    pub(crate) async fn corrupt_payload(&self, guid: &Guid) {
        sqlx::query("UPDATE logins SET payload = x'00010203' WHERE guid = ?1")
            .bind(guid.as_str())
            .execute(&self.inner.pool)
            .await
            .unwrap();
    }
}
