//! Configuration management for the backup run.
//!
//! Loads configuration from an optional TOML file, then applies overrides
//! from a `.env` file and the process environment. The resulting [`Config`]
//! is validated once and treated as immutable for the rest of the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::utils::errors::{BackupError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub notify: NotifyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the tree to back up
    pub dir: PathBuf,

    /// Exclude patterns (filename globs, path globs, or `dir/` prefixes)
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket location (a directory for the filesystem object store)
    pub bucket: PathBuf,

    /// Key prefix prepended to every relative path
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Propagate local deletions to the bucket
    pub sync_delete: bool,

    /// Remote objects older than this many days are pruned (<= 0 disables)
    pub retention_days: i64,

    /// Duplicate-avoidance strategy for files that already exist remotely
    pub metadata_strategy: MetadataStrategy,

    /// Where the manifest is persisted between runs
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Send a run summary at the end of the run
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// How the reconciler decides that an existing remote object is already current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStrategy {
    /// Always re-upload.
    None,
    /// Skip when the remote byte size equals the local size.
    #[default]
    Basic,
    /// Skip when the companion `.meta` object reports the same checksum.
    Full,
}

impl MetadataStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataStrategy::None => "none",
            MetadataStrategy::Basic => "basic",
            MetadataStrategy::Full => "full",
        }
    }
}

impl fmt::Display for MetadataStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataStrategy {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(MetadataStrategy::None),
            "basic" => Ok(MetadataStrategy::Basic),
            "full" => Ok(MetadataStrategy::Full),
            other => Err(BackupError::Config(format!(
                "unknown metadata strategy '{}' (expected none, basic or full)",
                other
            ))),
        }
    }
}

// Default values
const DEFAULT_PREFIX: &str = "backups/";
const DEFAULT_STATE_PATH: &str = "/var/backup/state.json";

fn default_retention_days() -> i64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: PathBuf::new(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_delete: false,
            retention_days: default_retention_days(),
            metadata_strategy: MetadataStrategy::default(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Read the TOML file if one is given, otherwise start from defaults
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Build the run configuration: file (if any), then `.env` and process
    /// environment overrides, then normalization and validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_dotenv();
        Self::from_optional_file(path)?.finish(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides, logging the rejected ones, then
    /// normalize and validate.
    pub fn finish<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for rejected in self.apply_env(lookup) {
            tracing::warn!("{}", rejected);
        }
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Unset variables leave the current value untouched. A value that cannot
    /// be parsed keeps the current value and is described in the returned list.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rejected = Vec::new();

        if let Some(dir) = lookup("SOURCE_DIR") {
            self.source.dir = PathBuf::from(dir);
        }
        if let Some(patterns) = lookup("EXCLUDE_PATTERNS") {
            self.source.exclude = split_patterns(&patterns);
        }
        if let Some(bucket) = lookup("BUCKET").or_else(|| lookup("B2_BUCKET_NAME")) {
            self.storage.bucket = PathBuf::from(bucket);
        }
        if let Some(prefix) = lookup("BACKUP_PREFIX") {
            self.storage.prefix = prefix;
        }
        if let Some(flag) = lookup("SYNC_DELETE") {
            self.sync.sync_delete = flag == "true";
        }
        if let Some(days) = lookup("RETENTION_DAYS") {
            match days.trim().parse() {
                Ok(days) => self.sync.retention_days = days,
                Err(_) => rejected.push(format!(
                    "Ignoring RETENTION_DAYS='{}': not a whole number of days, keeping {}",
                    days, self.sync.retention_days
                )),
            }
        }
        if let Some(strategy) = lookup("METADATA_STRATEGY") {
            match strategy.parse() {
                Ok(strategy) => self.sync.metadata_strategy = strategy,
                Err(e) => rejected.push(format!(
                    "Ignoring METADATA_STRATEGY: {}, keeping {}",
                    e, self.sync.metadata_strategy
                )),
            }
        }
        if let Some(path) = lookup("LOCAL_STATE_PATH") {
            self.sync.state_path = PathBuf::from(path);
        }
        if let Some(flag) =
            lookup("ENABLE_NOTIFICATION").or_else(|| lookup("ENABLE_EMAIL_NOTIFICATION"))
        {
            self.notify.enabled = flag == "true";
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log.level = level;
        }

        rejected
    }

    /// Fill in defaults for empty values and give the prefix its trailing slash.
    pub fn normalize(&mut self) {
        if self.storage.prefix.is_empty() {
            self.storage.prefix = DEFAULT_PREFIX.to_string();
        } else if !self.storage.prefix.ends_with('/') {
            self.storage.prefix.push('/');
        }

        if self.sync.state_path.as_os_str().is_empty() {
            self.sync.state_path = PathBuf::from(DEFAULT_STATE_PATH);
        }

        self.source.exclude = self
            .source
            .exclude
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
    }

    /// Reject configurations missing required settings.
    pub fn validate(&self) -> Result<()> {
        if self.source.dir.as_os_str().is_empty() {
            return Err(BackupError::Config(
                "source directory is not set (SOURCE_DIR or [source] dir)".to_string(),
            ));
        }
        if self.storage.bucket.as_os_str().is_empty() {
            return Err(BackupError::Config(
                "bucket is not set (BUCKET or [storage] bucket)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a `.env` file from the working directory into the process
/// environment. Returns its path, or `None` when there is none.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
