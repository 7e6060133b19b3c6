use eyre::Result;
use serde::{Deserialize, Serialize};

#[cfg(not(test))]
use super::CONFIG;

use super::constants::{DEFAULT_ENDPOINT, LOG_FILE_PATH};
use super::defaults::*;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Configuration {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub verbose: bool,

    /// Language hint forwarded to the agent with every exchange.
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogConfig {
    #[serde(default = "log_level")]
    pub level: Option<String>,

    #[serde(default)]
    pub filters: Option<Vec<LogFilter>>,

    #[serde(default)]
    pub file: LogFile,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFilter {
    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFile {
    #[serde(default = "log_file_path")]
    pub path: String,

    #[serde(default)]
    pub append: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BackendConfig {
    #[serde(default = "endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub timeout_secs: Option<u16>,

    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default)]
    pub default_mode: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum StorageConfig {
    #[serde(rename = "sqlite")]
    Sqlite(SqliteStorage),
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SqliteStorage {
    pub path: Option<String>,
}

impl SqliteStorage {
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs
            .map(|secs| std::time::Duration::from_secs(secs as u64))
    }
}

impl Configuration {
    #[cfg(not(test))]
    pub fn instance() -> &'static Configuration {
        static FALLBACK: std::sync::OnceLock<Configuration> = std::sync::OnceLock::new();
        CONFIG
            .get()
            .unwrap_or_else(|| FALLBACK.get_or_init(Configuration::default))
    }

    #[cfg(not(test))]
    pub fn init(config: Configuration) -> Result<()> {
        CONFIG
            .set(config)
            .map_err(|_| eyre::eyre!("Config already initialized"))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn instance() -> &'static Configuration {
        use super::TEST_CONFIG;
        TEST_CONFIG.with(|config| *config.borrow())
    }

    #[cfg(test)]
    pub fn init(config: Configuration) -> Result<()> {
        use super::TEST_CONFIG;
        TEST_CONFIG.with(|test_config| {
            *test_config.borrow_mut() = Box::leak(Box::new(config));
        });
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_string()),
            file: LogFile::default(),
            filters: None,
        }
    }
}

impl Default for LogFile {
    fn default() -> Self {
        Self {
            path: LOG_FILE_PATH.to_string(),
            append: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: None,
            default_model: None,
            default_mode: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite(SqliteStorage::default())
    }
}
