//! Bulk maintenance: wipe and rekey.

use anyhow::Result;
use loginstore_bridge::LoginStore;

/// Delete every login.
///
/// Without `local` the deletions are recorded as tombstones and reach the
/// remote on the next sync. With `local` the database is emptied and its
/// sync history reset, leaving the remote untouched.
pub async fn wipe(store: &LoginStore, local: bool) -> Result<()> {
    if local {
        store.wipe_local().await?;
        println!("Local data removed; the next sync starts from scratch.");
    } else {
        let removed = store.wipe().await?;
        println!("Deleted {} logins.", removed);
    }
    Ok(())
}

/// Re-encrypt the database under a new key.
pub async fn rekey(store: &LoginStore, new_key: &str) -> Result<()> {
    if new_key.is_empty() {
        anyhow::bail!("New key must not be empty");
    }
    store.rekey(new_key).await?;
    println!("Database re-encrypted. Use the new key from now on.");
    Ok(())
}
