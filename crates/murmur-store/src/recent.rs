use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::KeyValueStore;

/// Storage key holding the JSON array of recent emojis, most recent first.
pub const RECENT_EMOJIS_KEY: &str = "recentEmojis";

/// Bounded most-recent-first emoji list persisted in a [`KeyValueStore`].
///
/// Nothing is read from the backend until the first `load` or `record`.
/// Every `record` re-reads the persisted list before writing, so two pickers
/// sharing a backend converge on last-write-wins.
pub struct RecentEmojiStore {
    backend: Arc<dyn KeyValueStore>,
    max_recent: usize,
    emojis: Vec<String>,
    loaded: bool,
}

impl RecentEmojiStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, max_recent: usize) -> Self {
        Self {
            backend,
            max_recent,
            emojis: Vec::new(),
            loaded: false,
        }
    }

    /// Read the persisted list. A missing or unreadable value loads as empty.
    pub fn load(&mut self) -> Result<()> {
        let raw = self.backend.get(RECENT_EMOJIS_KEY)?;
        self.emojis = match raw {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => normalize(list, self.max_recent),
                Err(e) => {
                    warn!("Discarding corrupt recent emoji list: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.loaded = true;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string(&self.emojis)?;
        self.backend.set(RECENT_EMOJIS_KEY, &json)
    }

    /// Move `emoji` to the front (or prepend it), truncate, and persist.
    pub fn record(&mut self, emoji: &str) -> Result<()> {
        self.load()?;

        if let Some(pos) = self.emojis.iter().position(|e| e == emoji) {
            self.emojis.remove(pos);
        }
        self.emojis.insert(0, emoji.to_string());
        self.emojis.truncate(self.max_recent);

        debug!("Recorded recent emoji {} ({} total)", emoji, self.emojis.len());
        self.save()
    }

    pub fn list(&self) -> &[String] {
        &self.emojis
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn max_recent(&self) -> usize {
        self.max_recent
    }
}

/// Drop duplicates (keeping the first occurrence) and enforce the cap.
fn normalize(list: Vec<String>, max_recent: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(list.len().min(max_recent));
    for emoji in list {
        if out.len() == max_recent {
            break;
        }
        if !out.contains(&emoji) {
            out.push(emoji);
        }
    }
    out
}
