//! Configuration loading and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or broken default config file is not an error: compiled defaults
//! are used and the fallback is reported through [`ConfigSource::log`]. An
//! explicitly requested file must exist and parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "FDS_ROOT";

/// Tie-break seed used when neither the command line nor the config names one
pub const DEFAULT_SEED: u64 = 18;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding `data/<dataset>_dataset` directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Estimator defaults (optional)
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Estimator defaults
///
/// Algorithm and tie-break are kept as strings here and parsed by the
/// aggregation crate, so an unknown value is reported where it is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// One of `MV`, `DS`, `FDS`, `H` (or the long names)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Convergence threshold on the total change in class marginals
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Class marginal change at which the hybrid algorithm switches to hard mode
    #[serde(default = "default_switch_tolerance")]
    pub switch_tolerance: f64,

    /// Hard cap on EM iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Seed for the tie-break random source
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// `random` or `lowest-index`
    #[serde(default = "default_tie_break")]
    pub tie_break: String,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            tolerance: default_tolerance(),
            switch_tolerance: default_switch_tolerance(),
            max_iterations: default_max_iterations(),
            seed: default_seed(),
            tie_break: default_tie_break(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_algorithm() -> String {
    "FDS".to_string()
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_switch_tolerance() -> f64 {
    5e-3
}

fn default_max_iterations() -> usize {
    100
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_tie_break() -> String {
    "random".to_string()
}

/// Platform config file location: `<config_dir>/fds/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fds").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// File named on the command line or in `FDS_CONFIG`
    Explicit(PathBuf),
    /// Platform default file
    Default(PathBuf),
    /// No file at the platform default location
    MissingDefault(PathBuf),
    /// Platform config directory unknown
    NoConfigDir,
    /// Default file present but unreadable or unparsable
    Unreadable { path: PathBuf, error: String },
}

impl ConfigSource {
    /// Whether compiled defaults were used in place of a file
    pub fn is_fallback(&self) -> bool {
        !matches!(self, ConfigSource::Explicit(_) | ConfigSource::Default(_))
    }

    /// Report the outcome; fallbacks are warnings
    ///
    /// Call once logging is installed, since resolution happens before it.
    pub fn log(&self) {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Default(path) => {
                info!("Loaded configuration from {}", path.display())
            }
            ConfigSource::MissingDefault(path) => {
                warn!("No config file at {}, using built-in defaults", path.display())
            }
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using built-in defaults")
            }
            ConfigSource::Unreadable { path, error } => warn!(
                "Ignoring unreadable config file {}, using built-in defaults: {}",
                path.display(),
                error
            ),
        }
    }
}

/// Configuration together with how it was found
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

/// Resolve the effective TOML configuration
///
/// An explicit path must load. Without one, the platform default file is used
/// when present; a missing or broken default file degrades to compiled defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    resolve_config_from(explicit, default_config_path())
}

/// [`resolve_config`] with the default location supplied by the caller
pub fn resolve_config_from(
    explicit: Option<&Path>,
    default_path: Option<PathBuf>,
) -> Result<ResolvedConfig> {
    if let Some(path) = explicit {
        return Ok(ResolvedConfig {
            config: load_toml_config(path)?,
            source: ConfigSource::Explicit(path.to_path_buf()),
        });
    }

    let Some(path) = default_path else {
        return Ok(ResolvedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::NoConfigDir,
        });
    };

    if !path.exists() {
        return Ok(ResolvedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::MissingDefault(path),
        });
    }

    let resolved = match load_toml_config(&path) {
        Ok(config) => ResolvedConfig {
            config,
            source: ConfigSource::Default(path),
        },
        Err(e) => ResolvedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::Unreadable {
                path,
                error: e.to_string(),
            },
        },
    };
    Ok(resolved)
}

/// Root folder resolution: CLI argument, then `env_var_name`, then TOML, then
/// the current directory.
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    PathBuf::from(".")
}

/// Write a TOML config atomically (temp file + rename)
///
/// On Unix the file is created with 0600 permissions.
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, target) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_defaults() {
        let config = EstimatorConfig::default();
        assert_eq!(config.algorithm, "FDS");
        assert_eq!(config.tolerance, 1e-4);
        assert_eq!(config.switch_tolerance, 5e-3);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.tie_break, "random");
        assert_eq!(config.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [estimator]
            algorithm = "DS"
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.estimator.algorithm, "DS");
        assert_eq!(config.estimator.seed, 7);
        assert_eq!(config.estimator.max_iterations, 100);
        assert_eq!(config.logging.level, "info");
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.estimator.seed, 18);
    }
}
