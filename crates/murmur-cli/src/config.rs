use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use murmur_types::config::ComposerConfig;
use murmur_types::models::{DirectoryUser, StyleTag, UserId};
use uuid::Uuid;

/// Runtime settings for the driver, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub composer: ComposerConfig,
    pub db_path: PathBuf,
    pub users_path: Option<PathBuf>,
    pub user_id: UserId,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut composer = ComposerConfig::default();

        if let Some(v) = var("MURMUR_MAX_LENGTH") {
            composer.max_length = v.parse().context("MURMUR_MAX_LENGTH")?;
        }
        if let Some(v) = var("MURMUR_MAX_RECENT") {
            composer.max_recent = v.parse().context("MURMUR_MAX_RECENT")?;
        }
        if let Some(v) = var("MURMUR_ENABLED_STYLES") {
            composer.enabled_styles = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| StyleTag::parse(s).with_context(|| format!("unknown style {:?}", s.trim())))
                .collect::<Result<_>>()?;
        }
        if let Some(v) = var("MURMUR_ENABLE_MENTIONS") {
            composer.enable_mentions = parse_flag(&v).context("MURMUR_ENABLE_MENTIONS")?;
        }
        if let Some(v) = var("MURMUR_ENABLE_VOICE") {
            composer.enable_voice = parse_flag(&v).context("MURMUR_ENABLE_VOICE")?;
        }
        if let Some(v) = var("MURMUR_PLACEHOLDER") {
            composer.placeholder = v;
        }

        let db_path = var("MURMUR_DB_PATH").unwrap_or_else(|| "murmur.db".into());
        let user_id = match var("MURMUR_USER_ID") {
            Some(v) => v.parse().context("MURMUR_USER_ID")?,
            None => Uuid::new_v4(),
        };

        Ok(Self {
            composer,
            db_path: PathBuf::from(db_path),
            users_path: var("MURMUR_USERS").map(PathBuf::from),
            user_id,
        })
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}

/// Load the mention directory: a JSON array of `{ id, name, handle }`.
pub fn load_users(path: &Path) -> Result<Vec<DirectoryUser>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let users = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(users)
}
