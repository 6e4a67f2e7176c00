//! Configuration and store setup for loginstore-cli.

use anyhow::{Context, Result};
use loginstore_bridge::{ErrorKind, LoginStore};
use loginstore_client::StoreConfig;
use std::path::{Path, PathBuf};

/// Default database location in the per-user data directory.
pub fn default_db_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "loginstore")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().join("logins.db"))
}

/// Load the store configuration, falling back to defaults.
pub fn load_store_config(path: Option<&Path>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(StoreConfig::default()),
    }
}

/// Open the store, translating a bad key into a readable message.
pub async fn open_store(path: &Path, key: &str, config: &StoreConfig) -> Result<LoginStore> {
    let existed = path.exists();
    match LoginStore::open(path, key, config).await {
        Ok(store) => {
            if !existed {
                set_file_permissions_0600(path).await?;
            }
            Ok(store)
        }
        Err(err) if err.kind() == ErrorKind::InvalidKey => Err(anyhow::anyhow!(
            "Wrong key, or {} is not a login database",
            path.display()
        )),
        Err(err) => Err(err).context("Failed to open store"),
    }
}

/// Prompt for a secret with echo suppression.
pub fn prompt_secret(prompt: &str) -> Result<String> {
    let secret = rpassword::prompt_password(prompt).context("Failed to read input")?;
    if secret.is_empty() {
        anyhow::bail!("Input must not be empty");
    }
    Ok(secret)
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast_config() -> StoreConfig {
        StoreConfig::default().with_kdf(loginstore_client::Argon2Params::new(1, 1, 1))
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = load_store_config(None).unwrap();
        assert_eq!(config.sync.page_size, 100);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_store_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[tokio::test]
    async fn wrong_key_message() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logins.db");
        open_store(&path, "right", &fast_config()).await.unwrap();

        let err = open_store(&path, "wrong", &fast_config()).await.unwrap_err();
        assert!(err.to_string().contains("Wrong key"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn new_database_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("logins.db");
        open_store(&path, "k", &fast_config()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
