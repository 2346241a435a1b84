//! Configuration loading and config directory resolution
//!
//! Two layers of configuration live under one directory:
//! 1. **Bootstrap** (`dorothy.toml`): logging and mainloop timing
//! 2. **Node configs** (`<plugin>/<node>.toml`): one table per node type,
//!    keyed by instance name (handled by the daemon's node factory)
//!
//! Missing bootstrap files are not fatal: the daemon falls back to defaults
//! and says so once logging is initialised. A file that exists but cannot be
//! parsed is always an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "DOROTHY_CONFIG_DIR";

/// Name of the bootstrap file inside the config directory
pub const BOOTSTRAP_FILE_NAME: &str = "dorothy.toml";

/// Config directory resolution, highest priority first:
/// 1. Command-line argument
/// 2. `DOROTHY_CONFIG_DIR` environment variable
/// 3. OS-dependent config directory (`~/.config/dorothy` on Linux)
/// 4. `./dorothy_config` when the platform reports no config directory
pub fn resolve_config_dir(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_DIR_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    default_config_dir()
}

/// OS-dependent default config directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dorothy"))
        .unwrap_or_else(|| PathBuf::from("./dorothy_config"))
}

// ============================================================================
// Bootstrap configuration
// ============================================================================

/// Bootstrap configuration loaded from `dorothy.toml`
///
/// Read once at start-up; changes need a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Interval between song-completion polls of every channel
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load `dorothy.toml` from `config_dir`
    ///
    /// Returns `Ok(None)` when the file is absent so the caller can fall back
    /// to the defaults once logging is up. A malformed file, or a zero
    /// `poll_interval_ms`, is an error.
    pub fn load(config_dir: &Path) -> Result<Option<Self>> {
        let path = config_dir.join(BOOTSTRAP_FILE_NAME);
        let Some(table) = read_toml_table(&path)? else {
            return Ok(None);
        };

        let config: TomlConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
        Ok(Some(config))
    }

    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero");
        }
        Ok(())
    }
}

// ============================================================================
// TOML utilities
// ============================================================================

/// Read a TOML document as a table
///
/// Returns `Ok(None)` when the file does not exist, so callers can tell a
/// first run apart from a corrupt file.
pub fn read_toml_table(path: &Path) -> Result<Option<toml::Table>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };

    let table = content
        .parse::<toml::Table>()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(table))
}

/// Write a TOML document atomically
///
/// Writes to `<target>.tmp` then renames over the target, so readers never
/// observe a half-written file. Parent directories are created as needed.
pub fn write_toml_atomic<T: Serialize>(value: &T, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let rendered = toml::to_string_pretty(value)?;

    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, rendered)?;
    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_dir_is_named_after_daemon() {
        let dir = default_config_dir();
        assert!(dir.ends_with("dorothy") || dir.ends_with("dorothy_config"));
    }

    #[test]
    fn test_cli_arg_wins() {
        let dir = resolve_config_dir(Some(Path::new("/tmp/dorothy-cli")));
        assert_eq!(dir, PathBuf::from("/tmp/dorothy-cli"));
    }

    #[test]
    fn test_toml_config_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_config_partial_logging_section() {
        let config: TomlConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
        assert_eq!(config.poll_interval_ms, 500);
    }
}
