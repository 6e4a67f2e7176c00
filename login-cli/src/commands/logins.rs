//! Login record commands.

use anyhow::{Context, Result};
use loginstore_bridge::LoginStore;
use loginstore_core::now_millis;
use loginstore_types::{Guid, Login, LoginChanges, LoginFields};
use std::path::Path;

/// Fields for a new login as given on the command line.
#[derive(Debug, Default)]
pub struct NewLogin {
    pub guid: Option<String>,
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub form_url: Option<String>,
    pub realm: Option<String>,
}

impl NewLogin {
    fn into_login(self) -> Login {
        let fields = LoginFields {
            hostname: self.hostname,
            username: self.username,
            password: self.password,
            form_submit_url: self.form_url,
            http_realm: self.realm,
            ..LoginFields::default()
        };
        match self.guid {
            Some(guid) => Login::with_guid(guid, fields),
            None => Login::new(fields),
        }
    }
}

/// Field changes for `update`. `None` leaves a field as it is.
#[derive(Debug, Default)]
pub struct LoginEdit {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub form_url: Option<String>,
    pub realm: Option<String>,
}

impl LoginEdit {
    fn into_changes(self) -> LoginChanges {
        let mut changes = LoginChanges::new();
        if let Some(hostname) = &self.hostname {
            changes = changes.hostname(hostname);
        }
        if let Some(username) = &self.username {
            changes = changes.username(username);
        }
        if let Some(password) = &self.password {
            changes = changes.password(password);
        }
        // A login is either a form login or an HTTP auth login.
        if let Some(url) = &self.form_url {
            changes = changes.form_submit_url(Some(url.as_str())).http_realm(None);
        }
        if let Some(realm) = &self.realm {
            changes = changes.http_realm(Some(realm.as_str())).form_submit_url(None);
        }
        changes
    }
}

/// Add a login and print its guid.
pub async fn add(store: &LoginStore, new: NewLogin) -> Result<()> {
    let login = store.add(new.into_login()).await?;
    println!("{}", login.guid);
    Ok(())
}

/// Print one login as JSON.
pub async fn get(store: &LoginStore, guid: &str) -> Result<()> {
    let login = store
        .get(&Guid::from(guid))
        .await?
        .with_context(|| format!("No login with guid {}", guid))?;
    println!("{}", serde_json::to_string_pretty(&login)?);
    Ok(())
}

/// Print a table of logins. Passwords are never shown.
pub async fn list(store: &LoginStore, hostname: Option<&str>) -> Result<()> {
    let logins = match hostname {
        Some(hostname) => store.get_by_hostname(hostname).await?,
        None => store.list().await?,
    };

    if logins.is_empty() {
        println!("No logins.");
        return Ok(());
    }

    let now = now_millis();
    println!("{:<36}  {:<32}  {:<20}  MODIFIED", "GUID", "HOSTNAME", "USERNAME");
    for login in &logins {
        println!(
            "{:<36}  {:<32}  {:<20}  {}",
            login.guid,
            login.fields.hostname,
            login.fields.username,
            format_age(now, login.modified())
        );
    }
    Ok(())
}

/// Change fields of a login.
pub async fn update(store: &LoginStore, guid: &str, edit: LoginEdit) -> Result<()> {
    let changes = edit.into_changes();
    if changes.is_empty() {
        anyhow::bail!("Nothing to update");
    }
    let login = store.update(&Guid::from(guid), changes).await?;
    println!("Updated {}", login.guid);
    Ok(())
}

/// Record a use of a login.
pub async fn touch(store: &LoginStore, guid: &str) -> Result<()> {
    let login = store.touch(&Guid::from(guid)).await?;
    println!("{} used {} times", login.guid, login.meta.times_used);
    Ok(())
}

/// Delete a login.
pub async fn delete(store: &LoginStore, guid: &str) -> Result<()> {
    if store.delete(&Guid::from(guid)).await? {
        println!("Deleted {}", guid);
    } else {
        println!("No login with guid {}", guid);
    }
    Ok(())
}

/// Import a JSON array of logins.
pub async fn import(store: &LoginStore, file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let logins: Vec<Login> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of logins", file.display()))?;

    let metrics = store.import(logins).await?;
    println!(
        "Imported {} of {} ({} invalid, {} duplicate)",
        metrics.imported, metrics.total, metrics.invalid, metrics.duplicates
    );
    Ok(())
}

/// Format the age of a millisecond timestamp relative to `now`.
fn format_age(now: i64, ts: i64) -> String {
    let diff = now.saturating_sub(ts).max(0) / 1000;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
