//! End-to-end store and sync behaviour against on-disk databases and a
//! shared in-memory remote.

use loginstore_client::{
    Argon2Params, MockRemote, Store, StoreConfig, StoreError, SyncCredentials, SyncEngine,
};
use loginstore_types::{Guid, Login, LoginChanges, LoginFields, SyncRecord};
use tempfile::TempDir;

const TOKEN: &str = "device-token";

fn config() -> StoreConfig {
    StoreConfig::default().with_kdf(Argon2Params::new(1, 1, 1))
}

fn fields(host: &str, password: &str) -> LoginFields {
    LoginFields::for_form(host, &format!("{}/login", host), "alice", password)
}

// =============================================================================
// Opening
// =============================================================================

#[tokio::test]
async fn reopen_with_same_key_reads_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logins.db");

    let added = {
        let store = Store::open(&path, "key-one", &config()).await.unwrap();
        store.add(Login::new(fields("https://a.com", "p"))).await.unwrap()
    };

    let store = Store::open(&path, "key-one", &config()).await.unwrap();
    assert_eq!(store.get(&added.guid).await.unwrap(), Some(added));
}

#[tokio::test]
async fn reopen_with_wrong_key_is_invalid_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logins.db");
    {
        let store = Store::open(&path, "right", &config()).await.unwrap();
        store.add(Login::new(fields("https://a.com", "p"))).await.unwrap();
    }

    let result = Store::open(&path, "wrong", &config()).await;
    assert!(matches!(result, Err(StoreError::InvalidKey)));
}

#[tokio::test]
async fn non_database_file_is_invalid_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, vec![b'x'; 4096]).unwrap();

    let result = Store::open(&path, "any", &config()).await;
    assert!(matches!(result, Err(StoreError::InvalidKey)));
}

#[tokio::test]
async fn rekey_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logins.db");
    let added = {
        let store = Store::open(&path, "old", &config()).await.unwrap();
        let added = store.add(Login::new(fields("https://a.com", "p"))).await.unwrap();
        store.rekey("new").await.unwrap();
        added
    };

    assert!(matches!(
        Store::open(&path, "old", &config()).await,
        Err(StoreError::InvalidKey)
    ));
    let store = Store::open(&path, "new", &config()).await.unwrap();
    assert_eq!(store.get(&added.guid).await.unwrap(), Some(added));
}

// =============================================================================
// Sync between devices
// =============================================================================

#[tokio::test]
async fn two_devices_converge() {
    let remote = MockRemote::new(TOKEN);
    let creds = SyncCredentials::new(TOKEN);

    let laptop = Store::open_in_memory("laptop", &config()).await.unwrap();
    let phone = Store::open_in_memory("phone", &config()).await.unwrap();
    let laptop_engine = SyncEngine::new(laptop.clone(), config().sync);
    let phone_engine = SyncEngine::new(phone.clone(), config().sync);

    let shared = laptop
        .add(Login::new(fields("https://mail.com", "first")))
        .await
        .unwrap();
    laptop_engine.sync(&remote, &creds).await.unwrap();
    phone_engine.sync(&remote, &creds).await.unwrap();
    assert_eq!(phone.get(&shared.guid).await.unwrap().unwrap().fields.password, "first");

    phone
        .update(&shared.guid, LoginChanges::new().password("second"))
        .await
        .unwrap();
    phone_engine.sync(&remote, &creds).await.unwrap();
    laptop_engine.sync(&remote, &creds).await.unwrap();
    assert_eq!(
        laptop.get(&shared.guid).await.unwrap().unwrap().fields.password,
        "second"
    );

    laptop.delete(&shared.guid).await.unwrap();
    laptop_engine.sync(&remote, &creds).await.unwrap();
    phone_engine.sync(&remote, &creds).await.unwrap();
    assert!(phone.get(&shared.guid).await.unwrap().is_none());
    assert!(remote.record(&shared.guid).unwrap().is_tombstone());
}

#[tokio::test]
async fn later_remote_edit_wins_over_earlier_local_edit() {
    let remote = MockRemote::new(TOKEN);
    let store = Store::open_in_memory("k", &config()).await.unwrap();
    let local = store
        .add(Login::with_guid("g", fields("https://a.com", "local")))
        .await
        .unwrap();

    let newer_modified = local.meta.time_last_modified + 10;
    let mut newer = Login::with_guid("g", fields("https://a.com", "remote"));
    newer.meta.time_created = local.meta.time_created;
    newer.meta.time_last_modified = newer_modified;
    newer.meta.time_password_changed = newer_modified;
    remote.insert(SyncRecord::Login(newer));

    SyncEngine::new(store.clone(), config().sync)
        .sync(&remote, &SyncCredentials::new(TOKEN))
        .await
        .unwrap();

    let stored = store.get(&Guid::from("g")).await.unwrap().unwrap();
    assert_eq!(stored.fields.password, "remote");
    assert_eq!(stored.meta.time_last_modified, newer_modified);
}

#[tokio::test]
async fn interrupt_before_sync_is_not_sticky() {
    let remote = MockRemote::new(TOKEN);
    let store = Store::open_in_memory("k", &config()).await.unwrap();
    store.interrupt_handle().interrupt();

    // Operations begun after the request run normally.
    store.add(Login::new(fields("https://a.com", "p"))).await.unwrap();
    let summary = SyncEngine::new(store, config().sync)
        .sync(&remote, &SyncCredentials::new(TOKEN))
        .await
        .unwrap();
    assert_eq!(summary.uploaded, 1);
}
