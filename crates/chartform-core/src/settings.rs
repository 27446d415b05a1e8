//! Runtime settings shared by every component
//!
//! Settings are plain data passed to constructors. Nothing reads or writes
//! process-wide state after [`Settings::from_env`] returns.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

pub const ENV_REPOSITORY_CONFIG: &str = "CHARTFORM_REPOSITORY_CONFIG";
pub const ENV_REPOSITORY_CACHE: &str = "CHARTFORM_REPOSITORY_CACHE";
pub const ENV_NAMESPACE: &str = "CHARTFORM_NAMESPACE";
pub const ENV_LOCK_TIMEOUT: &str = "CHARTFORM_LOCK_TIMEOUT";
pub const ENV_DEPENDENCY_UPDATE: &str = "CHARTFORM_DEPENDENCY_UPDATE";

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Repository file (YAML list of `{name, url}`)
    pub repository_config: PathBuf,

    /// Directory holding `<name>-index.yaml` caches
    pub repository_cache: PathBuf,

    /// Namespace used when a request does not name one
    pub namespace: String,

    /// Maximum wait for the repository file lock
    pub lock_timeout: Duration,

    /// Delay between lock attempts
    pub lock_poll_interval: Duration,

    /// Bound on every single network fetch
    pub fetch_timeout: Duration,

    /// Download missing chart dependencies instead of failing
    pub dependency_update: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            repository_config: config_dir.join("chartform").join("repositories.yaml"),
            repository_cache: cache_dir.join("chartform").join("repository"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            dependency_update: false,
        }
    }
}

impl Settings {
    /// Default settings with the repository file and cache under `home`
    pub fn with_home(home: &Path) -> Self {
        Self {
            repository_config: home.join("repositories.yaml"),
            repository_cache: home.join("repository"),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `CHARTFORM_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup` onto these settings
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup(ENV_REPOSITORY_CONFIG) {
            self.repository_config = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_REPOSITORY_CACHE) {
            self.repository_cache = PathBuf::from(path);
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            self.namespace = namespace;
        }
        if let Some(secs) = lookup(ENV_LOCK_TIMEOUT) {
            let secs: u64 = secs.trim().parse().map_err(|_| CoreError::Config {
                message: format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_LOCK_TIMEOUT, secs
                ),
            })?;
            self.lock_timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = lookup(ENV_DEPENDENCY_UPDATE) {
            self.dependency_update = parse_bool(ENV_DEPENDENCY_UPDATE, &flag)?;
        }

        Ok(self)
    }

    /// Cache file for a repository's index
    pub fn index_cache_path(&self, repo_name: &str) -> PathBuf {
        self.repository_cache.join(format!("{}-index.yaml", repo_name))
    }

    /// Namespace to render into: the requested one, else the configured one
    pub fn resolve_namespace<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.trim().is_empty() {
            &self.namespace
        } else {
            requested
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::Config {
            message: format!("{} must be a boolean, got '{}'", key, raw),
        }),
    }
}
