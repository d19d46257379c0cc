use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;
use tmfs_config::{log_cli_info, Config, ConfigError};
use tmfs_fuse::{MountOptions, TimeMachineFs, TimeMachineMount};

use crate::BackupArgs;

#[derive(Args, Debug)]
pub struct MountArgs {
    /// Mount point directory (falls back to `mount.mountpoint` in the config)
    #[arg(value_name = "MOUNTPOINT")]
    mountpoint: Option<PathBuf>,

    #[command(flatten)]
    backup: BackupArgs,

    /// Filesystem name shown in the mount table
    #[arg(long)]
    fsname: Option<String>,

    /// Let other users access the mount (needs user_allow_other in /etc/fuse.conf)
    #[arg(long)]
    allow_other: bool,

    /// Unmount when the process exits (requires --allow-other)
    #[arg(long)]
    auto_unmount: bool,
}

/// Execute the mount command
pub fn run(args: MountArgs, config: &mut Config) -> Result<()> {
    let root = args.backup.open(config)?;

    let mountpoint = args
        .mountpoint
        .or_else(|| config.mount.mountpoint.clone())
        .ok_or(ConfigError::MissingOption { name: "mountpoint" })?;

    if let Some(fsname) = args.fsname {
        config.mount.fsname = fsname;
    }
    config.mount.allow_other |= args.allow_other;
    config.mount.auto_unmount |= args.auto_unmount;

    // Ensure mountpoint exists
    if !mountpoint.exists() {
        fs::create_dir_all(&mountpoint)
            .with_context(|| format!("Failed to create mountpoint: {}", mountpoint.display()))?;
    }

    log_cli_info!("Mounting Time Machine snapshot...");
    log_cli_info!(
        "snapshot",
        hostname = root.hostname(),
        path = tracing::field::display(root.snapshot_base().display()),
    );
    log_cli_info!(
        "private directory",
        path = tracing::field::display(root.private_dir().display()),
    );
    log_cli_info!(
        "mountpoint",
        path = tracing::field::display(mountpoint.display()),
        mode = "read-only",
    );

    let vfs = TimeMachineFs::from_root(root);
    let options = MountOptions::from(&config.mount);

    // This will block until unmounted
    TimeMachineMount::new(vfs, options).mount(&mountpoint)
}
