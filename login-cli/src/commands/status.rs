//! Show store status.

use anyhow::Result;
use loginstore_bridge::{LoginStore, SyncState};
use std::path::Path;

/// Run the status command.
pub async fn run(store: &LoginStore, db_path: &Path) -> Result<()> {
    let count = store.count().await?;
    let marker = store.sync_marker().await?;
    let status = store.status();

    println!("=== loginstore status ===");
    println!();
    println!("Database: {}", db_path.display());
    println!("Logins:   {}", count);
    println!();
    println!("Sync:");
    println!("  State:  {}", state_label(status.state));
    if marker == 0 {
        println!("  Marker: never synced");
    } else {
        println!("  Marker: {}", marker);
    }
    if let Some(err) = status.last_error {
        println!("  Last error: {}", err);
    }

    Ok(())
}

fn state_label(state: SyncState) -> &'static str {
    match state {
        SyncState::Idle => "idle",
        SyncState::Syncing => "syncing",
    }
}
