//! Application configuration
//!
//! Built-in defaults, overlaid by `config.toml`, overlaid by `PAGEMARK_*`
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::deletion::DEFAULT_DELETION_DELAY;
use crate::models::PageRange;

/// Overrides the config file location
const CONFIG_ENV: &str = "PAGEMARK_CONFIG";
const DATA_DIR_ENV: &str = "PAGEMARK_DATA_DIR";
const DELETION_DELAY_ENV: &str = "PAGEMARK_DELETION_DELAY_MS";
const PAGE_COUNT_ENV: &str = "PAGEMARK_PAGE_COUNT";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the bookmark store, settings and verse text
    pub data_dir: PathBuf,

    /// Delay before a scheduled deletion is committed, in milliseconds
    pub deletion_delay_ms: u64,

    /// Number of pages in the mushaf; valid last pages are 1..=page_count
    pub page_count: u32,

    /// Debug log file (defaults to `<data_dir>/debug.log`)
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pagemark"),
            deletion_delay_ms: DEFAULT_DELETION_DELAY.as_millis() as u64,
            page_count: PageRange::default().last,
            log_file: None,
        }
    }
}

impl Config {
    /// Load from the config file (see [`Config::config_file_path`]), then
    /// apply `PAGEMARK_*` overrides and create the data directory
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Like [`Config::load`] with an explicit file; a missing file means defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        };

        config.apply_env_overrides();
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Cannot create data directory {}", config.data_dir.display())
        })?;
        Ok(config)
    }

    /// Parse TOML and apply environment overrides, without touching the disk
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config = Self::parse(toml_content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Config is not valid TOML")
    }

    fn apply_env_overrides(&mut self) {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = env_number(DELETION_DELAY_ENV) {
            self.deletion_delay_ms = ms;
        }
        if let Some(count) = env_number(PAGE_COUNT_ENV) {
            self.page_count = count;
        }
    }

    /// Write to the config file, creating its directory
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Cannot serialize config")?;
        std::fs::write(&path, content).with_context(|| format!("Cannot write {}", path.display()))
    }

    /// `$PAGEMARK_CONFIG`, or `config.toml` under the platform config dir
    pub fn config_file_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pagemark")
                .join("config.toml"),
        }
    }

    /// Bookmark and tag store
    pub fn bookmarks_path(&self) -> PathBuf {
        self.data_dir.join("bookmarks.json")
    }

    /// User preferences
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.toml")
    }

    /// Verse text used to hydrate verse bookmarks
    pub fn verses_path(&self) -> PathBuf {
        self.data_dir.join("verses.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    pub fn deletion_delay(&self) -> Duration {
        Duration::from_millis(self.deletion_delay_ms)
    }

    /// Valid last-read pages
    pub fn page_range(&self) -> PageRange {
        PageRange::new(1, self.page_count.max(1))
    }
}

/// Parse a numeric environment variable, ignoring (with a warning) bad values
fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let val = std::env::var(name).ok()?;
    val.trim()
        .parse()
        .map_err(|_| warn!("Ignoring {}={:?}: not a number", name, val))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 3] = [DATA_DIR_ENV, DELETION_DELAY_ENV, PAGE_COUNT_ENV];

    /// Holds the env lock with all overrides cleared; restores them on drop
    struct CleanEnv {
        _lock: MutexGuard<'static, ()>,
        saved: Vec<(&'static str, Option<std::ffi::OsString>)>,
    }

    fn clean_env() -> CleanEnv {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = ENV_VARS.map(|name| (name, env::var_os(name))).to_vec();
        for name in ENV_VARS {
            env::remove_var(name);
        }
        CleanEnv { _lock: lock, saved }
    }

    impl Drop for CleanEnv {
        fn drop(&mut self) {
            for (name, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.deletion_delay(), Duration::from_millis(4000));
        assert_eq!(config.page_range(), PageRange::new(1, 604));
        assert!(config.log_file.is_none());
        assert!(config.data_dir.ends_with("pagemark"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config {
            data_dir: PathBuf::from("/data/pagemark"),
            ..Config::default()
        };

        assert!(config.bookmarks_path().ends_with("bookmarks.json"));
        assert!(config.settings_path().ends_with("settings.toml"));
        assert!(config.verses_path().ends_with("verses.json"));
        assert_eq!(config.log_path(), PathBuf::from("/data/pagemark/debug.log"));

        let config = Config {
            log_file: Some(PathBuf::from("/tmp/pm.log")),
            ..config
        };
        assert_eq!(config.log_path(), PathBuf::from("/tmp/pm.log"));
    }

    #[test]
    fn test_env_overrides() {
        let _env = clean_env();
        let mut config = Config::default();

        env::set_var(DATA_DIR_ENV, "/tmp/pagemark-test");
        env::set_var(DELETION_DELAY_ENV, "250");
        env::set_var(PAGE_COUNT_ENV, "10");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/pagemark-test"));
        assert_eq!(config.deletion_delay(), Duration::from_millis(250));
        assert_eq!(config.page_range(), PageRange::new(1, 10));

        // Garbage is ignored
        env::set_var(DELETION_DELAY_ENV, "soon");
        config.apply_env_overrides();
        assert_eq!(config.deletion_delay_ms, 250);
    }

    #[test]
    fn test_zero_page_count_still_valid() {
        let config = Config {
            page_count: 0,
            ..Config::default()
        };
        assert_eq!(config.page_range(), PageRange::new(1, 1));
    }

    #[test]
    fn test_saved_config_reads_back() {
        let config = Config {
            data_dir: PathBuf::from("/data/pagemark"),
            deletion_delay_ms: 1500,
            page_count: 100,
            log_file: Some(PathBuf::from("/tmp/pagemark.log")),
        };

        let written = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&written).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(Config::parse("deletion_delay_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_load_from_str() {
        let _env = clean_env();

        let toml = r#"
            data_dir = "/custom/data"
            deletion_delay_ms = 1000
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.deletion_delay_ms, 1000);
        assert_eq!(config.page_count, 604);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _env = clean_env();
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var(DATA_DIR_ENV, temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.deletion_delay_ms, 4000);
        assert!(config.data_dir.exists());
    }
}
