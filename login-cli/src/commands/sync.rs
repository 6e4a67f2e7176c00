//! Sync with a remote collection file.

use anyhow::{Context, Result};
use loginstore_bridge::{ErrorKind, LoginStore, SyncResult};
use loginstore_client::{SyncCredentials, Transport};
use std::path::Path;
use std::sync::Arc;

use crate::remote::FileRemote;

/// Run one sync pass. Ctrl-C interrupts the pass; the next run resumes.
pub async fn run(store: LoginStore, remote: &Path, token: &str) -> Result<SyncResult> {
    let remote = FileRemote::open(remote)
        .await
        .with_context(|| format!("Failed to open remote {}", remote.display()))?;
    let remote = Arc::new(remote);
    let store = Arc::new(store.with_remote(Arc::clone(&remote) as Arc<dyn Transport>));

    let watcher = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupting sync...");
                store.interrupt();
            }
        })
    };
    let outcome = store.sync(&SyncCredentials::new(token)).await;
    watcher.abort();

    let result = match outcome {
        Ok(result) => result,
        Err(err) if err.kind() == ErrorKind::Interrupted => {
            anyhow::bail!("Sync interrupted; run it again to resume")
        }
        Err(err) if err.kind() == ErrorKind::AuthInvalid => {
            anyhow::bail!("Remote rejected the token: {}", err.message())
        }
        Err(err) => return Err(err).context("Sync failed"),
    };

    println!("Fetched:  {}", result.fetched);
    println!("Applied:  {}", result.applied);
    if result.skipped > 0 {
        println!("Skipped:  {} (not stored, see log)", result.skipped);
    }
    println!("Uploaded: {}", result.uploaded);
    println!("Marker:   {}", result.marker);
    println!("Remote:   {} records", remote.len().await);
    Ok(result)
}
