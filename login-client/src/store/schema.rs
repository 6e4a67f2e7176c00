//! Database layout and the checks run when a store is opened.

use sqlx::sqlite::SqlitePool;

use crate::crypto::Argon2Params;
use crate::error::StoreError;

/// `PRAGMA user_version` of a login store.
pub(super) const SCHEMA_VERSION: i64 = 1;

/// SQLITE_NOTADB: the file exists but is not a SQLite database.
const SQLITE_NOTADB: &str = "26";

/// What an opened database file turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Layout {
    /// Brand new file, no tables.
    Empty,
    /// A login store at the current schema version.
    Current,
    /// Some other SQLite database (or an unknown version).
    Foreign,
}

/// The single row of `store_meta`.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct MetaRow {
    pub salt: Vec<u8>,
    pub key_check: Vec<u8>,
    pub kdf_memory_mib: i64,
    pub kdf_iterations: i64,
    pub kdf_parallelism: i64,
}

impl MetaRow {
    /// Argon2 parameters recorded at creation.
    ///
    /// Values outside `1..=u32::MAX` were not written by a login store, so
    /// the file is reported as `InvalidKey`.
    pub fn params(&self) -> Result<Argon2Params, StoreError> {
        Ok(Argon2Params::new(
            kdf_value(self.kdf_memory_mib)?,
            kdf_value(self.kdf_iterations)?,
            kdf_value(self.kdf_parallelism)?,
        ))
    }
}

fn kdf_value(stored: i64) -> Result<u32, StoreError> {
    u32::try_from(stored)
        .ok()
        .filter(|value| *value > 0)
        .ok_or(StoreError::InvalidKey)
}

/// Map errors seen while opening so a non-database file, or a database
/// missing our tables, reads as a bad key.
pub(super) fn map_open_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.code().as_deref() == Some(SQLITE_NOTADB)
                || db.message().contains("not a database")
                || db.message().contains("no such table") =>
        {
            StoreError::InvalidKey
        }
        _ => StoreError::Database(err),
    }
}

/// Classify the database behind `pool`.
pub(super) async fn inspect(pool: &SqlitePool) -> Result<Layout, StoreError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(map_open_error)?;

    if version == SCHEMA_VERSION {
        return Ok(Layout::Current);
    }
    if version != 0 {
        return Ok(Layout::Foreign);
    }

    let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master")
        .fetch_one(pool)
        .await
        .map_err(map_open_error)?;

    Ok(if tables == 0 {
        Layout::Empty
    } else {
        Layout::Foreign
    })
}

/// Create the tables of a new store and record its key material.
pub(super) async fn create(
    pool: &SqlitePool,
    salt: &[u8],
    params: Argon2Params,
    key_check: &[u8],
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE store_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            salt BLOB NOT NULL,
            key_check BLOB NOT NULL,
            kdf_memory_mib INTEGER NOT NULL,
            kdf_iterations INTEGER NOT NULL,
            kdf_parallelism INTEGER NOT NULL,
            sync_marker INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE logins (
            guid TEXT PRIMARY KEY,
            payload BLOB,
            time_created INTEGER NOT NULL,
            time_last_used INTEGER NOT NULL,
            time_last_modified INTEGER NOT NULL,
            time_password_changed INTEGER NOT NULL,
            times_used INTEGER NOT NULL DEFAULT 0,
            sync_status INTEGER NOT NULL DEFAULT 2,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            server_modified INTEGER NOT NULL DEFAULT 0,
            sync_cursor INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX idx_logins_sync_status ON logins(sync_status)")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO store_meta (id, salt, key_check, kdf_memory_mib, kdf_iterations, kdf_parallelism)
        VALUES (1, ?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(salt)
    .bind(key_check)
    .bind(params.memory_mib() as i64)
    .bind(params.iterations() as i64)
    .bind(params.parallelism() as i64)
    .execute(&mut *tx)
    .await?;

    // PRAGMA does not take bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Read the key material of an existing store.
pub(super) async fn load_meta(pool: &SqlitePool) -> Result<Option<MetaRow>, StoreError> {
    sqlx::query_as::<_, MetaRow>(
        r#"
        SELECT salt, key_check, kdf_memory_mib, kdf_iterations, kdf_parallelism
        FROM store_meta WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await
    .map_err(map_open_error)
}
