use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::StyleTag;

/// Recognized composer options. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Maximum message length, in characters.
    pub max_length: usize,
    /// Capacity of the recent-emoji list.
    pub max_recent: usize,
    pub enabled_styles: BTreeSet<StyleTag>,
    pub enable_mentions: bool,
    pub enable_voice: bool,
    /// Text inserted between wrappers when formatting a collapsed cursor.
    pub placeholder: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_length: 2000,
            max_recent: 20,
            enabled_styles: StyleTag::ALL.into_iter().collect(),
            enable_mentions: true,
            enable_voice: true,
            placeholder: String::new(),
        }
    }
}

impl ComposerConfig {
    pub fn style_enabled(&self, style: StyleTag) -> bool {
        self.enabled_styles.contains(&style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ComposerConfig =
            serde_json::from_str(r#"{ "max_length": 10, "enabled_styles": ["bold", "code"] }"#).unwrap();
        assert_eq!(config.max_length, 10);
        assert_eq!(config.max_recent, 20);
        assert!(config.style_enabled(StyleTag::Code));
        assert!(!config.style_enabled(StyleTag::Italic));
        assert!(config.enable_mentions);
    }
}
