//! Application configuration
//!
//! Layers, later ones winning: built-in defaults, the TOML file
//! (`~/.config/ginger/config.toml` or `$GINGER_CONFIG`), then `GINGER_*`
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::history::HistoryPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "GINGER";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, preference blob)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum number of history entries retained per chapter
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Width of the wall-clock minute bucket used to merge rapid edits
    #[serde(default = "default_history_bucket_minutes")]
    pub history_bucket_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_limit: default_history_limit(),
            history_bucket_minutes: default_history_bucket_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (GINGER_DATA_DIR, GINGER_HISTORY_LIMIT,
    ///    GINGER_HISTORY_BUCKET_MINUTES)
    /// 2. Config file (~/.config/ginger/config.toml or GINGER_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay `GINGER_*` environment variables
    ///
    /// Numeric values that fail to parse leave the current value alone.
    fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(limit) = env_var("HISTORY_LIMIT").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.history_limit = limit;
        }
        if let Some(minutes) = env_var("HISTORY_BUCKET_MINUTES").and_then(|v| v.trim().parse::<u32>().ok()) {
            self.history_bucket_minutes = minutes;
        }
    }

    /// Get the config file path
    ///
    /// Can be overridden with GINGER_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ginger")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("ginger.db")
    }

    /// Get the path to the preference blob
    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join("ginger-memory.json")
    }

    /// Build the history retention policy from this configuration
    pub fn history_policy(&self) -> HistoryPolicy {
        HistoryPolicy::new(self.history_limit, self.history_bucket_minutes)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}

/// `<local data dir>/ginger`
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ginger")
}

fn default_history_limit() -> usize {
    HistoryPolicy::DEFAULT_MAX_ENTRIES
}

fn default_history_bucket_minutes() -> u32 {
    HistoryPolicy::DEFAULT_BUCKET_MINUTES
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "GINGER_DATA_DIR",
        "GINGER_HISTORY_LIMIT",
        "GINGER_HISTORY_BUCKET_MINUTES",
        "GINGER_CONFIG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.history_bucket_minutes, 5);
        assert!(config.data_dir.ends_with("ginger"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();

        assert!(config.sqlite_path().ends_with("ginger.db"));
        assert!(config.memory_path().ends_with("ginger-memory.json"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("GINGER_DATA_DIR", "/tmp/ginger-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ginger-test"));
    }

    #[test]
    fn test_env_override_history_limit() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("GINGER_HISTORY_LIMIT", "25");
        config.apply_env_overrides();
        assert_eq!(config.history_limit, 25);

        // Garbage keeps the previous value
        env::set_var("GINGER_HISTORY_LIMIT", "lots");
        env::set_var("GINGER_HISTORY_BUCKET_MINUTES", " 15 ");
        config.apply_env_overrides();
        assert_eq!(config.history_limit, 25);
        assert_eq!(config.history_bucket_minutes, 15);
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/ginger"),
            history_limit: 3,
            history_bucket_minutes: 15,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("history_limit"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.history_limit, 3);
        assert_eq!(parsed.history_bucket_minutes, 15);
    }

    #[test]
    fn test_load_from_str_fills_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str(r#"data_dir = "/custom/data""#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.history_bucket_minutes, 5);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_path(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.history_limit, 10);
    }

    #[test]
    fn test_history_policy_clamps_zero() {
        let config = Config {
            history_limit: 0,
            history_bucket_minutes: 0,
            ..Config::default()
        };

        let policy = config.history_policy();
        assert_eq!(policy.max_entries(), 1);
        assert_eq!(policy.bucket_minutes(), 1);
    }
}
