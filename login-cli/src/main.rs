//! # loginstore-cli
//!
//! Command-line tool for an encrypted loginstore database.
//!
//! ## Commands
//!
//! - `add`, `get`, `list`, `update`, `touch`, `delete`: record CRUD
//! - `import`: bulk import from a JSON file
//! - `sync`: sync with a remote collection kept in a JSON file
//! - `status`: show record count, sync marker and last error
//! - `wipe`: delete every record (`--local` to skip syncing the deletion)
//! - `rekey`: re-encrypt the database under a new key
//!
//! ## Example
//!
//! ```bash
//! # Add a login (prompts for the store key)
//! loginstore add https://example.com --username alice --password s3cret \
//!     --form-url https://example.com/login
//!
//! # Sync two databases through a shared remote file
//! loginstore --db laptop.db sync --remote remote.json --token abc
//! loginstore --db phone.db sync --remote remote.json --token abc
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod remote;

use commands::{logins, maintenance, status, sync};

/// Command-line tool for an encrypted login store.
#[derive(Parser, Debug)]
#[command(name = "loginstore")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Store configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store key (prompted for if not given)
    #[arg(long, global = true, env = "LOGINSTORE_KEY", hide_env_values = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a login
    Add {
        /// Origin the login belongs to
        hostname: String,

        /// Username
        #[arg(long, short, default_value = "")]
        username: String,

        /// Password (prompted for if not given)
        #[arg(long, short)]
        password: Option<String>,

        /// Form submission URL
        #[arg(long, conflicts_with = "realm")]
        form_url: Option<String>,

        /// HTTP authentication realm
        #[arg(long)]
        realm: Option<String>,

        /// Use this guid instead of a generated one
        #[arg(long)]
        guid: Option<String>,
    },

    /// Show one login as JSON
    Get {
        /// Record guid
        guid: String,
    },

    /// List logins
    List {
        /// Only logins for this hostname
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Change fields of a login
    Update {
        /// Record guid
        guid: String,

        /// New hostname
        #[arg(long)]
        hostname: Option<String>,

        /// New username
        #[arg(long, short)]
        username: Option<String>,

        /// New password
        #[arg(long, short)]
        password: Option<String>,

        /// New form submission URL
        #[arg(long)]
        form_url: Option<String>,

        /// New HTTP realm
        #[arg(long)]
        realm: Option<String>,
    },

    /// Record a use of a login
    Touch {
        /// Record guid
        guid: String,
    },

    /// Delete a login
    Delete {
        /// Record guid
        guid: String,
    },

    /// Import logins from a JSON array
    Import {
        /// File to import
        file: PathBuf,
    },

    /// Sync with a remote collection file
    Sync {
        /// Remote collection (JSON file, created if missing)
        #[arg(long)]
        remote: PathBuf,

        /// Sync token
        #[arg(long)]
        token: String,
    },

    /// Show store status
    Status,

    /// Delete every login
    Wipe {
        /// Remove local data only, without syncing the deletion
        #[arg(long)]
        local: bool,
    },

    /// Re-encrypt the database under a new key
    Rekey {
        /// New key (prompted for if not given)
        #[arg(long)]
        new_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => config::default_db_path()?,
    };
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create data directory")?;
    }
    let store_config = config::load_store_config(cli.config.as_deref())?;
    let key = match cli.key {
        Some(key) => key,
        None => config::prompt_secret("Store key: ")?,
    };

    let store = config::open_store(&db_path, &key, &store_config).await?;

    match cli.command {
        Commands::Add {
            hostname,
            username,
            password,
            form_url,
            realm,
            guid,
        } => {
            let password = match password {
                Some(password) => password,
                None => config::prompt_secret("Password: ")?,
            };
            let new = logins::NewLogin {
                guid,
                hostname,
                username,
                password,
                form_url,
                realm,
            };
            logins::add(&store, new).await?;
        }
        Commands::Get { guid } => {
            logins::get(&store, &guid).await?;
        }
        Commands::List { hostname } => {
            logins::list(&store, hostname.as_deref()).await?;
        }
        Commands::Update {
            guid,
            hostname,
            username,
            password,
            form_url,
            realm,
        } => {
            let edit = logins::LoginEdit {
                hostname,
                username,
                password,
                form_url,
                realm,
            };
            logins::update(&store, &guid, edit).await?;
        }
        Commands::Touch { guid } => {
            logins::touch(&store, &guid).await?;
        }
        Commands::Delete { guid } => {
            logins::delete(&store, &guid).await?;
        }
        Commands::Import { file } => {
            logins::import(&store, &file).await?;
        }
        Commands::Sync { remote, token } => {
            sync::run(store, &remote, &token).await?;
        }
        Commands::Status => {
            status::run(&store, &db_path).await?;
        }
        Commands::Wipe { local } => {
            maintenance::wipe(&store, local).await?;
        }
        Commands::Rekey { new_key } => {
            let new_key = match new_key {
                Some(key) => key,
                None => config::prompt_secret("New store key: ")?,
            };
            maintenance::rekey(&store, &new_key).await?;
        }
    }

    Ok(())
}
