//! # tmfs-config
//!
//! Configuration management for tmfs.
//!
//! Loads configuration from:
//! 1. `~/.tmfs/config.toml` (global)
//! 2. `.tmfs/config.toml` (local, overrides global)
//! 3. Environment variables (highest priority)
//!
//! Command-line flags are applied on top by the CLI.

pub mod logging;
pub mod testing;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding `backup.hfs_root`.
pub const ENV_HFS_ROOT: &str = "TMFS_HFS_ROOT";
/// Environment variable overriding `backup.hostname`.
pub const ENV_HOSTNAME: &str = "TMFS_HOSTNAME";
/// Environment variable overriding `mount.mountpoint`.
pub const ENV_MOUNTPOINT: &str = "TMFS_MOUNTPOINT";
/// Environment variable holding a log filter (takes precedence over `RUST_LOG`).
pub const ENV_LOG: &str = "TMFS_LOG";

/// Errors raised while loading configuration or validating the backup volume.
///
/// Every variant is fatal at startup; none is produced once the mount is serving.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required option: {name}")]
    MissingOption { name: &'static str },
    #[error("cannot read HFS+ root {}: {source}", path.display())]
    HfsRootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no HFS+ private directory found under {}", hfs_root.display())]
    MissingPrivateDir { hfs_root: PathBuf },
    #[error("snapshot not found: {}", path.display())]
    MissingSnapshot { path: PathBuf },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupConfig,
    pub mount: MountConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config (~/.tmfs/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::load_from(&global_path)?;
            }
        }

        // 2. Local config (.tmfs/config.toml) - overrides global
        let local_path = Self::local_config_path();
        if local_path.exists() {
            debug!("Loading local config from {:?}", local_path);
            let local = Self::load_from(&local_path)?;
            config.merge(local);
        }

        // 3. Environment
        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse a single config file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.tmfs/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".tmfs/config.toml"))
    }

    /// Local config path: .tmfs/config.toml
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".tmfs/config.toml")
    }

    /// Merge another config on top of this one. Only values that are set (or
    /// differ from the defaults) in `other` win.
    pub fn merge(&mut self, other: Config) {
        if other.backup.hfs_root.is_some() {
            self.backup.hfs_root = other.backup.hfs_root;
        }
        if other.backup.hostname.is_some() {
            self.backup.hostname = other.backup.hostname;
        }
        if other.mount.mountpoint.is_some() {
            self.mount.mountpoint = other.mount.mountpoint;
        }
        let defaults = MountConfig::default();
        if other.mount.fsname != defaults.fsname {
            self.mount.fsname = other.mount.fsname;
        }
        self.mount.allow_other |= other.mount.allow_other;
        self.mount.auto_unmount |= other.mount.auto_unmount;
        if other.log.level != LogConfig::default().level {
            self.log.level = other.log.level;
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ENV_HFS_ROOT) {
            self.backup.hfs_root = Some(PathBuf::from(root));
        }
        if let Some(host) = lookup(ENV_HOSTNAME) {
            self.backup.hostname = Some(host);
        }
        if let Some(mnt) = lookup(ENV_MOUNTPOINT) {
            self.mount.mountpoint = Some(PathBuf::from(mnt));
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log.level = level;
        }
    }

    /// The HFS+ root and hostname, both of which must be present before a
    /// snapshot can be opened.
    pub fn backup_settings(&self) -> Result<(PathBuf, String), ConfigError> {
        let hfs_root = self
            .backup
            .hfs_root
            .clone()
            .ok_or(ConfigError::MissingOption { name: "hfs_root" })?;
        let hostname = self
            .backup
            .hostname
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingOption { name: "hostname" })?;
        Ok((hfs_root, hostname))
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Which backup volume and host snapshot to expose
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Root of the mounted HFS+ Time Machine volume
    pub hfs_root: Option<PathBuf>,
    /// Host whose `Latest` snapshot is exposed
    pub hostname: Option<String>,
}

/// FUSE mount options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub mountpoint: Option<PathBuf>,
    /// Filesystem name shown in the mount table
    pub fsname: String,
    pub allow_other: bool,
    pub auto_unmount: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            mountpoint: None,
            fsname: "tmfs".to_string(),
            allow_other: false,
            auto_unmount: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level filter when neither `TMFS_LOG` nor `RUST_LOG` is set
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
