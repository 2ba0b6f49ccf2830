use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use gather::config::Config;
use gather::service::{spawn_fetch_worker, FeedsService, FetchQueue};
use gather::storage::{ConnectorType, Database, DatabaseError, ProxySetting};

/// Get the config directory path (~/.config/gather/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("gather"))
}

#[derive(Parser, Debug)]
#[command(name = "gather", version, about = "Feed subscriptions backed by a local page store")]
struct Args {
    /// Config file (default: ~/.config/gather/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overriding the config file
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what a feed URL contains without subscribing
    Preview { url: String },
    /// Subscribe to a feed URL
    Follow { url: String },
    /// List connectors
    List,
    /// List the stored pages of a connector
    Pages { id: i64 },
    /// Show or change the settings of a feed
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Delete a feed and all of its pages
    Delete { id: i64 },
    /// Manage folders
    Folder {
        #[command(subcommand)]
        action: FolderCommand,
    },
    /// Manage the global HTTP proxy
    Proxy {
        #[command(subcommand)]
        action: ProxyCommand,
    },
    /// Subscribe to every feed in an OPML file
    Import { file: PathBuf },
    /// Write all feed subscriptions to an OPML file
    Export { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show {
        id: i64,
    },
    Set {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        crawl_full_content: Option<bool>,
        /// Folder id; 0 removes the feed from its folder
        #[arg(long)]
        folder: Option<i64>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        interval_minutes: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum FolderCommand {
    Create { name: String },
    Rename { id: i64, name: String },
    Delete { id: i64 },
    List,
}

#[derive(Subcommand, Debug)]
enum ProxyCommand {
    Set { host: String, port: u16 },
    Clear,
    Show,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(service: &FeedsService, command: Command) -> Result<()> {
    let db = service.database();

    match command {
        Command::Preview { url } => print_json(&service.preview_feeds(&url).await?)?,
        Command::Follow { url } => print_json(&service.follow_feed(&url).await?)?,
        Command::List => print_json(&db.list_connectors(None).await?)?,
        Command::Pages { id } => print_json(&db.get_pages_for_connector(id).await?)?,
        Command::Settings { action } => match action {
            SettingsCommand::Show { id } => print_json(&service.get_feeds_setting(id).await?)?,
            SettingsCommand::Set {
                id,
                name,
                enabled,
                crawl_full_content,
                folder,
                url,
                interval_minutes,
            } => {
                let mut setting = service.get_feeds_setting(id).await?;
                if let Some(name) = name {
                    setting.name = Some(name);
                }
                if let Some(enabled) = enabled {
                    setting.enabled = enabled;
                }
                if let Some(crawl) = crawl_full_content {
                    setting.crawl_full_content = crawl;
                }
                if let Some(folder) = folder {
                    setting.folder_id = Some(folder);
                }
                if let Some(url) = url {
                    setting.subscribe_url = Some(url);
                }
                if let Some(minutes) = interval_minutes {
                    setting.fetch_interval_minutes = minutes;
                }
                print_json(&service.update_feeds_setting(&setting).await?)?;
            }
        },
        Command::Delete { id } => {
            service.delete(id).await?;
            println!("Deleted feed {id}");
        }
        Command::Folder { action } => match action {
            FolderCommand::Create { name } => {
                let id = db.create_folder(&name).await?;
                println!("Created folder {id}");
            }
            FolderCommand::Rename { id, name } => db.rename_folder(id, &name).await?,
            FolderCommand::Delete { id } => db.delete_folder(id).await?,
            FolderCommand::List => print_json(&db.get_folders().await?)?,
        },
        Command::Proxy { action } => match action {
            ProxyCommand::Set { host, port } => {
                db.set_proxy_setting(Some(&ProxySetting { host, port }))
                    .await?
            }
            ProxyCommand::Clear => db.set_proxy_setting(None).await?,
            ProxyCommand::Show => print_json(&db.get_proxy_setting().await?)?,
        },
        Command::Import { file } => {
            let summary = service
                .import_opml(&file)
                .await
                .with_context(|| format!("Failed to import {}", file.display()))?;
            print_json(&summary)?;
        }
        Command::Export { file } => {
            let count = service
                .export_opml(&file)
                .await
                .with_context(|| format!("Failed to export to {}", file.display()))?;
            let feeds = db.list_connectors(Some(ConnectorType::Rss)).await?.len();
            println!("Exported {count} of {feeds} feeds to {}", file.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Owner-only: the database lives here.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("gather.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database is in use by another gather process.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let (queue, rx) = FetchQueue::channel(config.fetch_queue_capacity);
    let worker = spawn_fetch_worker(db.clone(), config.clone(), rx);
    let service = FeedsService::new(db, config, queue);

    let result = run(&service, args.command).await;

    // Dropping the last queue handle lets the worker finish pending fetches and exit.
    drop(service);
    if let Err(e) = worker.await {
        tracing::warn!(error = %e, "Fetch worker panicked");
    }

    result
}
