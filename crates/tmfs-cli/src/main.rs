//! # tmfs CLI
//!
//! Mounts the latest Time Machine snapshot of a host as a read-only
//! filesystem, and offers a few commands to inspect path translation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tmfs_config::logging::{init_logging, LogLevel};
use tmfs_config::Config;
use tmfs_fuse::{ReadOnlyVfs, TimeMachineFs};
use tmfs_resolver::{BackupRoot, PathResolver};

mod mount;

/// tmfs - browse an HFS+ Time Machine backup as a plain directory tree
#[derive(Parser)]
#[command(name = "tmfs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level used when TMFS_LOG and RUST_LOG are unset
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the latest snapshot read-only (blocks until unmounted)
    Mount(mount::MountArgs),

    /// Print the real path backing a path inside the snapshot
    Resolve {
        /// Path as seen through the mount, e.g. /Users/me/Documents
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[command(flatten)]
        backup: BackupArgs,
    },

    /// List a directory of the snapshot without mounting it
    Ls {
        #[arg(value_name = "PATH", default_value = "/")]
        path: PathBuf,

        #[command(flatten)]
        backup: BackupArgs,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
}

/// Which volume and host to open; overrides config file and environment
#[derive(Args, Debug, Clone, Default)]
pub struct BackupArgs {
    /// Root of the mounted HFS+ Time Machine volume
    #[arg(long = "hfs-path", value_name = "DIR")]
    pub hfs_path: Option<PathBuf>,

    /// Host whose latest snapshot is exposed
    #[arg(long)]
    pub hostname: Option<String>,
}

impl BackupArgs {
    /// Apply the flags on top of `config` and validate the volume.
    pub fn open(&self, config: &mut Config) -> Result<BackupRoot> {
        if let Some(path) = &self.hfs_path {
            config.backup.hfs_root = Some(path.clone());
        }
        if let Some(host) = &self.hostname {
            config.backup.hostname = Some(host.clone());
        }
        let (hfs_root, hostname) = config.backup_settings()?;
        let root = BackupRoot::open(&hfs_root, &hostname)
            .with_context(|| format!("Not a usable Time Machine volume: {}", hfs_root.display()))?;
        Ok(root)
    }
}

fn main() -> Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;

    let level = cli
        .log_level
        .unwrap_or_else(|| config.log.level.parse().unwrap_or(LogLevel::Warn));
    init_logging(level);

    match cli.command {
        Commands::Mount(args) => mount::run(args, &mut config),
        Commands::Resolve { path, backup } => {
            let resolver = PathResolver::new(backup.open(&mut config)?);
            let real = resolver
                .resolve(&path)
                .with_context(|| format!("Cannot resolve {}", path.display()))?;
            println!("{}", real.display());
            Ok(())
        }
        Commands::Ls { path, backup } => cmd_ls(&path, backup.open(&mut config)?),
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!(
                    "{}",
                    toml::to_string_pretty(&config).context("Failed to render config")?
                );
                Ok(())
            }
            ConfigCommands::Path => {
                match Config::global_config_path() {
                    Some(p) => println!("Global: {}", p.display()),
                    None => println!("Global: (no home directory)"),
                }
                println!("Local:  {}", Config::local_config_path().display());
                Ok(())
            }
        },
    }
}

fn cmd_ls(path: &Path, root: BackupRoot) -> Result<()> {
    let vfs = TimeMachineFs::from_root(root);
    let mut entries = vfs
        .readdir(path)
        .with_context(|| format!("Cannot list {}", path.display()))?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    for entry in entries {
        println!("{}", entry.name.to_string_lossy());
    }
    Ok(())
}
