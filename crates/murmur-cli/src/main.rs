mod command;
mod config;
mod microphone;
mod session;

use std::sync::Arc;

use murmur_compose::ObjectUrlRegistry;
use murmur_store::SqliteStore;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::command::Command;
use crate::config::Settings;
use crate::microphone::NoMicrophone;
use crate::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "murmur=debug".into()),
        )
        .init();

    // Config
    let settings = Settings::from_env()?;
    let users = match &settings.users_path {
        Some(path) => config::load_users(path)?,
        None => Vec::new(),
    };

    // Init store
    let store = SqliteStore::open(&settings.db_path)?;

    info!(
        "Composer ready for user {} ({} directory entries)",
        settings.user_id,
        users.len()
    );

    let mut session = Session::new(
        settings.composer,
        settings.user_id,
        Arc::new(users),
        Arc::new(ObjectUrlRegistry::default()),
        NoMicrophone,
        Arc::new(store),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", json!({ "error": e.to_string() }));
                continue;
            }
        };
        let quit = command == Command::Quit;

        match session.execute(command).await {
            Ok(out) => println!("{}", out),
            Err(e) => {
                warn!("Command failed: {:#}", e);
                println!("{}", json!({ "error": format!("{:#}", e) }));
            }
        }

        if quit {
            break;
        }
    }

    info!("Session for {} closed", session.user_id());
    Ok(())
}
