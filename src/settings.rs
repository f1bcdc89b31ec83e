//! Bridge settings
//!
//! Stored as `settings.json` in the user config directory. Environment
//! variables take precedence over the file; CLI flags are applied on top by
//! the binary.

use crate::similarity::Strategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_MESSAGES_DB: &str = "MESSAGE_BRIDGE_MESSAGES_DB";
pub const ENV_ADDRESSBOOK_DIR: &str = "MESSAGE_BRIDGE_ADDRESSBOOK_DIR";
pub const ENV_CACHE_TTL: &str = "MESSAGE_BRIDGE_CACHE_TTL";
pub const ENV_MATCH_THRESHOLD: &str = "MESSAGE_BRIDGE_MATCH_THRESHOLD";

/// Address-book source databases, relative to the address-book directory.
const ADDRESSBOOK_SOURCES: &str = "Sources/*/AddressBook-v22.abcddb";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Message store (None = ~/Library/Messages/chat.db)
    #[serde(default)]
    pub messages_db_path: Option<PathBuf>,
    /// Address-book directory (None = ~/Library/Application Support/AddressBook)
    #[serde(default)]
    pub addressbook_dir: Option<PathBuf>,
    #[serde(default = "default_cache_ttl")]
    pub contacts_cache_ttl_secs: u64,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    /// Fallback similarity for names that are neither equal nor substrings
    #[serde(default)]
    pub match_strategy: Strategy,
    #[serde(default = "default_max_listed_matches")]
    pub max_listed_matches: usize,
    #[serde(default = "default_message_limit")]
    pub message_limit: u32,
    #[serde(default = "default_self_label")]
    pub self_label: String,
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_match_threshold() -> f64 {
    0.6
}

fn default_max_listed_matches() -> usize {
    10
}

fn default_message_limit() -> u32 {
    100
}

fn default_self_label() -> String {
    "You".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            messages_db_path: None,
            addressbook_dir: None,
            contacts_cache_ttl_secs: default_cache_ttl(),
            match_threshold: default_match_threshold(),
            match_strategy: Strategy::default(),
            max_listed_matches: default_max_listed_matches(),
            message_limit: default_message_limit(),
            self_label: default_self_label(),
        }
    }
}

/// `<config dir>/message-bridge/settings.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("message-bridge").join("settings.json"))
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

impl Settings {
    /// Load settings from disk, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("ignoring malformed settings {}: {}", path.display(), e);
                Settings::default()
            }),
            Err(e) => {
                log::warn!("cannot read settings {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Settings file (if any) plus environment overrides.
    pub fn resolve() -> Self {
        let settings = default_config_path()
            .map(|path| Self::load(&path))
            .unwrap_or_default();
        settings.with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup. Empty and unparsable
    /// values are ignored.
    pub fn with_env<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        if let Some(path) = get(ENV_MESSAGES_DB) {
            self.messages_db_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get(ENV_ADDRESSBOOK_DIR) {
            self.addressbook_dir = Some(PathBuf::from(dir));
        }
        if let Some(ttl) = get(ENV_CACHE_TTL) {
            match ttl.trim().parse() {
                Ok(secs) => self.contacts_cache_ttl_secs = secs,
                Err(_) => log::warn!("ignoring {}={}", ENV_CACHE_TTL, ttl),
            }
        }
        if let Some(threshold) = get(ENV_MATCH_THRESHOLD) {
            match threshold.trim().parse::<f64>() {
                Ok(t) if (0.0..=1.0).contains(&t) => self.match_threshold = t,
                _ => log::warn!("ignoring {}={}", ENV_MATCH_THRESHOLD, threshold),
            }
        }
        self
    }

    pub fn messages_db(&self) -> PathBuf {
        self.messages_db_path
            .clone()
            .unwrap_or_else(|| home().join("Library/Messages/chat.db"))
    }

    pub fn addressbook_root(&self) -> PathBuf {
        self.addressbook_dir
            .clone()
            .unwrap_or_else(|| home().join("Library/Application Support/AddressBook"))
    }

    /// Glob matching every address-book source database.
    pub fn addressbook_glob(&self) -> String {
        self.addressbook_root()
            .join(ADDRESSBOOK_SOURCES)
            .to_string_lossy()
            .into_owned()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.contacts_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache_ttl(), Duration::from_secs(300));
        assert_eq!(settings.self_label, "You");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"match_threshold": 0.75, "match_strategy": "jaro_winkler", "messages_db_path": "/tmp/chat.db"}"#,
        )
        .unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.match_threshold, 0.75);
        assert_eq!(settings.match_strategy, Strategy::JaroWinkler);
        assert_eq!(settings.messages_db(), PathBuf::from("/tmp/chat.db"));
        assert_eq!(settings.message_limit, 100);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_MESSAGES_DB, "/data/chat.db"),
            (ENV_ADDRESSBOOK_DIR, "/data/ab"),
            (ENV_CACHE_TTL, "60"),
            (ENV_MATCH_THRESHOLD, "1.5"),
        ]
        .into_iter()
        .collect();
        let settings = Settings {
            match_threshold: 0.7,
            ..Settings::default()
        }
        .with_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.messages_db(), PathBuf::from("/data/chat.db"));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
        // out of range threshold is ignored
        assert_eq!(settings.match_threshold, 0.7);
        assert_eq!(
            settings.addressbook_glob(),
            "/data/ab/Sources/*/AddressBook-v22.abcddb"
        );
    }
}
