//! Runtime settings from the environment
//!
//! Everything here is read once at startup, after `.env` has been loaded.

use anyhow::Result;
use porksync_core::CredentialDefaults;
use std::path::PathBuf;

/// Catalogue file or directory
pub const CONF_PATH_ENV: &str = "PORKSYNC_CONF_PATH";

/// Directory holding `porksync.log`
pub const LOG_PATH_ENV: &str = "PORKSYNC_LOG_PATH";

/// Log level (trace, debug, info, warn, error)
pub const LOG_LEVEL_ENV: &str = "PORKSYNC_LOG_LEVEL";

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "porksync.log";

const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone)]
pub struct Settings {
    /// Catalogue file or directory
    pub conf_path: PathBuf,

    /// Log file, opened in append mode
    pub log_file: PathBuf,

    /// Lower-cased log level
    pub log_level: String,

    /// `PORKSYNC_SK` / `PORKSYNC_PK` fallback for catalogues without keys
    pub credentials: CredentialDefaults,
}

impl Settings {
    /// Read settings through a variable lookup (normally `std::env::var`)
    ///
    /// # Parameters
    ///
    /// - `lookup`: Environment variable lookup
    /// - `conf_override`: Catalogue path from the command line, wins over
    ///   the environment
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        conf_override: Option<PathBuf>,
    ) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let conf_path = conf_override
            .or_else(|| non_empty(CONF_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(default_conf_path);

        let log_file = non_empty(LOG_PATH_ENV)
            .map(|dir| PathBuf::from(dir).join(LOG_FILE_NAME))
            .unwrap_or_else(default_log_file);

        let log_level = non_empty(LOG_LEVEL_ENV)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .trim()
            .to_lowercase();

        Self {
            conf_path,
            log_file,
            log_level,
            credentials: CredentialDefaults::from_lookup(&lookup),
        }
    }

    /// Read settings from the process environment
    pub fn from_env(conf_override: Option<PathBuf>) -> Self {
        Self::from_lookup(|name| std::env::var(name).ok(), conf_override)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            anyhow::bail!(
                "{} '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                LOG_LEVEL_ENV,
                self.log_level
            );
        }

        if let Some(parent) = self.log_file.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "Log directory does not exist: {}. \
                Create it first or set {}",
                parent.display(),
                LOG_PATH_ENV
            );
        }

        Ok(())
    }
}

fn default_conf_path() -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from("/etc/porksync/")
    } else {
        PathBuf::from("./porksync/")
    }
}

fn default_log_file() -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from("/var/log").join(LOG_FILE_NAME)
    } else {
        PathBuf::from(".").join(LOG_FILE_NAME)
    }
}
