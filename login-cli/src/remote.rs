//! Remote collection stored in a local JSON file.
//!
//! Lets two databases sync through a shared file without a server. The file
//! keeps the latest version of each record and the last assigned cursor.
//! The first token presented claims an empty file.

use async_trait::async_trait;
use loginstore_client::{SyncCredentials, Transport, TransportError};
use loginstore_types::{Cursor, FetchedChanges, Guid, PushAck, RemoteRecord, SyncRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RemoteFile {
    #[serde(default)]
    token: String,
    #[serde(default)]
    last_cursor: Cursor,
    #[serde(default)]
    records: BTreeMap<Guid, RemoteRecord>,
}

/// A remote collection kept in a JSON file.
#[derive(Debug)]
pub struct FileRemote {
    path: PathBuf,
    state: Mutex<RemoteFile>,
}

impl FileRemote {
    /// Load the collection at `path`, or start an empty one.
    pub async fn open(path: &Path) -> Result<Self, TransportError> {
        let state = match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                TransportError::Network(format!("invalid remote file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RemoteFile::default(),
            Err(e) => {
                return Err(TransportError::Network(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    /// Number of records held, tombstones included.
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    async fn save(&self, state: &RemoteFile) -> Result<(), TransportError> {
        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| TransportError::Network(e.to_string()))?;
        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| TransportError::Network(format!("cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| TransportError::Network(format!("cannot replace {}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl Transport for FileRemote {
    async fn authenticate(&self, credentials: &SyncCredentials) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.token.is_empty() {
            state.token = credentials.token.clone();
            return self.save(&state).await;
        }
        if state.token != credentials.token {
            return Err(TransportError::AuthInvalid("token does not match".into()));
        }
        Ok(())
    }

    async fn fetch_changes(
        &self,
        since: Cursor,
        limit: u32,
    ) -> Result<FetchedChanges, TransportError> {
        let state = self.state.lock().await;
        let mut pending: Vec<&RemoteRecord> = state
            .records
            .values()
            .filter(|r| r.cursor > since)
            .collect();
        pending.sort_by_key(|r| r.cursor);

        let limit = limit.max(1) as usize;
        let has_more = pending.len() > limit;
        Ok(FetchedChanges {
            records: pending.into_iter().take(limit).cloned().collect(),
            has_more,
            max_cursor: state.last_cursor,
        })
    }

    async fn push_changes(&self, records: Vec<SyncRecord>) -> Result<PushAck, TransportError> {
        let mut state = self.state.lock().await;
        let accepted = records.len() as u32;
        for record in records {
            state.last_cursor = state.last_cursor.next();
            let cursor = state.last_cursor;
            state
                .records
                .insert(record.guid().clone(), RemoteRecord { cursor, record });
        }
        self.save(&state).await?;
        Ok(PushAck {
            accepted,
            max_cursor: state.last_cursor,
        })
    }
}
