//! Structured logging utilities for tmfs components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use tmfs_config::logging::*;
//!
//! log_vfs_debug!("getattr", path = tracing::field::display(path.display()));
//! log_resolve_error!("placeholder points at a non-directory", link_count = 137u64);
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const RESOLVE: &'static str = "RESOLVE";
    pub const VFS: &'static str = "VFS";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

// === RESOLVE logging macros ===

#[macro_export]
macro_rules! log_resolve_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "RESOLVE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_resolve_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "RESOLVE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_resolve_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "RESOLVE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_resolve_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = "RESOLVE", $($key = $value,)* $msg)
    };
}

// === VFS logging macros ===

#[macro_export]
macro_rules! log_vfs_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "VFS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "VFS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "VFS", $($key = $value,)* $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CLI", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup.
///
/// `TMFS_LOG` wins over `RUST_LOG`, which wins over `level`.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env(crate::ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    // A second call (e.g. from tests) leaves the first subscriber in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
