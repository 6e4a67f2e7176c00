//! In-memory remote collection for testing.
//!
//! Keeps the latest version of each record, assigns increasing cursors to
//! every accepted change, and can be told to fail the next call.

use super::{SyncCredentials, Transport, TransportError};
use async_trait::async_trait;
use loginstore_types::{Cursor, FetchedChanges, Guid, PushAck, RemoteRecord, SyncRecord};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-memory remote for testing.
///
/// Clones share state, so two engines pointed at clones of one mock sync
/// through the same collection.
#[derive(Debug, Default)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    token: String,
    records: BTreeMap<Guid, RemoteRecord>,
    last_cursor: Cursor,
    pushed: Vec<Vec<SyncRecord>>,
    fetch_calls: usize,
    fail_next_auth: Option<String>,
    fail_next_fetch: Option<String>,
    fail_next_push: Option<String>,
}

impl MockRemote {
    /// Create an empty remote accepting `token`.
    pub fn new(token: &str) -> Self {
        let remote = Self::default();
        remote.inner.lock().unwrap().token = token.to_string();
        remote
    }

    /// Store a record as if another client had uploaded it.
    pub fn insert(&self, record: SyncRecord) -> Cursor {
        let mut inner = self.inner.lock().unwrap();
        inner.store(record)
    }

    /// Latest version of a record.
    pub fn record(&self, guid: &Guid) -> Option<SyncRecord> {
        let inner = self.inner.lock().unwrap();
        inner.records.get(guid).map(|r| r.record.clone())
    }

    /// Number of records (including tombstones) held.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.records.len()
    }

    /// Whether the remote holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest cursor assigned so far.
    pub fn max_cursor(&self) -> Cursor {
        let inner = self.inner.lock().unwrap();
        inner.last_cursor
    }

    /// Every batch received through `push_changes`.
    pub fn pushed(&self) -> Vec<Vec<SyncRecord>> {
        let inner = self.inner.lock().unwrap();
        inner.pushed.clone()
    }

    /// Number of `fetch_changes` calls served.
    pub fn fetch_calls(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.fetch_calls
    }

    /// Cause the next authenticate() to be rejected.
    pub fn fail_next_auth(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_auth = Some(error.to_string());
    }

    /// Cause the next fetch_changes() to fail with a network error.
    pub fn fail_next_fetch(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch = Some(error.to_string());
    }

    /// Cause the next push_changes() to fail with a network error.
    pub fn fail_next_push(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_push = Some(error.to_string());
    }
}

impl MockRemoteInner {
    fn store(&mut self, record: SyncRecord) -> Cursor {
        self.last_cursor = self.last_cursor.next();
        let cursor = self.last_cursor;
        self.records
            .insert(record.guid().clone(), RemoteRecord { cursor, record });
        cursor
    }
}

impl Clone for MockRemote {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockRemote {
    async fn authenticate(&self, credentials: &SyncCredentials) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_auth.take() {
            return Err(TransportError::AuthInvalid(error));
        }
        if credentials.token != inner.token {
            return Err(TransportError::AuthInvalid("unknown token".into()));
        }
        Ok(())
    }

    async fn fetch_changes(
        &self,
        since: Cursor,
        limit: u32,
    ) -> Result<FetchedChanges, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_calls += 1;

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(TransportError::Network(error));
        }

        let mut pending: Vec<&RemoteRecord> = inner
            .records
            .values()
            .filter(|r| r.cursor > since)
            .collect();
        pending.sort_by_key(|r| r.cursor);

        let limit = limit.max(1) as usize;
        let has_more = pending.len() > limit;
        let records = pending.into_iter().take(limit).cloned().collect();

        Ok(FetchedChanges {
            records,
            has_more,
            max_cursor: inner.last_cursor,
        })
    }

    async fn push_changes(&self, records: Vec<SyncRecord>) -> Result<PushAck, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_push.take() {
            return Err(TransportError::Network(error));
        }

        inner.pushed.push(records.clone());
        let accepted = records.len() as u32;
        for record in records {
            inner.store(record);
        }

        Ok(PushAck {
            accepted,
            max_cursor: inner.last_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginstore_types::{Login, LoginFields};

    fn login(guid: &str) -> SyncRecord {
        SyncRecord::Login(Login::with_guid(
            guid,
            LoginFields::for_realm("https://a.example", "realm", "u", "p"),
        ))
    }

    // ===========================================
    // Authentication Tests
    // ===========================================

    #[tokio::test]
    async fn accepts_matching_token() {
        let remote = MockRemote::new("secret");
        remote
            .authenticate(&SyncCredentials::new("secret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_wrong_token() {
        let remote = MockRemote::new("secret");
        let result = remote.authenticate(&SyncCredentials::new("nope")).await;
        assert!(matches!(result, Err(TransportError::AuthInvalid(_))));
    }

    #[tokio::test]
    async fn forced_auth_failure_is_one_shot() {
        let remote = MockRemote::new("t");
        remote.fail_next_auth("revoked");
        let creds = SyncCredentials::new("t");

        assert!(remote.authenticate(&creds).await.is_err());
        assert!(remote.authenticate(&creds).await.is_ok());
    }

    // ===========================================
    // Fetch Tests
    // ===========================================

    #[tokio::test]
    async fn fetch_pages_by_cursor() {
        let remote = MockRemote::new("t");
        for guid in ["a", "b", "c"] {
            remote.insert(login(guid));
        }

        let first = remote.fetch_changes(Cursor::zero(), 2).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.max_cursor, Cursor::new(3));

        let last_seen = first.records.last().unwrap().cursor;
        let second = remote.fetch_changes(last_seen, 2).await.unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(!second.has_more);
        assert_eq!(second.records[0].guid().as_str(), "c");
        assert_eq!(remote.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn fetch_returns_latest_version_only() {
        let remote = MockRemote::new("t");
        remote.insert(login("a"));
        remote.insert(SyncRecord::Tombstone {
            guid: Guid::from("a"),
            deleted_at: 5,
        });

        let page = remote.fetch_changes(Cursor::zero(), 10).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.records[0].record.is_tombstone());
        assert_eq!(page.records[0].cursor, Cursor::new(2));
    }

    #[tokio::test]
    async fn forced_fetch_failure() {
        let remote = MockRemote::new("t");
        remote.fail_next_fetch("reset by peer");

        let result = remote.fetch_changes(Cursor::zero(), 10).await;
        assert!(matches!(result, Err(TransportError::Network(_))));
        assert!(remote.fetch_changes(Cursor::zero(), 10).await.is_ok());
    }

    // ===========================================
    // Push Tests
    // ===========================================

    #[tokio::test]
    async fn push_assigns_cursors_and_records_batches() {
        let remote = MockRemote::new("t");
        let ack = remote
            .push_changes(vec![login("a"), login("b")])
            .await
            .unwrap();

        assert_eq!(ack.accepted, 2);
        assert_eq!(ack.max_cursor, Cursor::new(2));
        assert_eq!(remote.len(), 2);
        assert_eq!(remote.pushed().len(), 1);
        assert!(remote.record(&Guid::from("b")).is_some());
    }

    #[tokio::test]
    async fn forced_push_failure_stores_nothing() {
        let remote = MockRemote::new("t");
        remote.fail_next_push("timeout");

        assert!(remote.push_changes(vec![login("a")]).await.is_err());
        assert!(remote.is_empty());
        assert!(remote.pushed().is_empty());
    }

    #[tokio::test]
    async fn clones_share_collection() {
        let remote = MockRemote::new("t");
        let other = remote.clone();
        other.insert(login("a"));
        assert_eq!(remote.len(), 1);
        assert_eq!(remote.max_cursor(), Cursor::new(1));
    }
}
