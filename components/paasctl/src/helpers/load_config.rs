// External crates
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// Prefix of the structured environment overrides, e.g.
/// `PAASCTL__TIMEOUTS__STAGING_MINUTES=20`.
const ENV_PREFIX: &str = "PAASCTL";
const ENV_SEPARATOR: &str = "__";

/// Legacy overrides, whole minutes. Values outside `1..=MAX_TIMEOUT_MINUTES`
/// are ignored.
pub const STAGING_TIMEOUT_ENV: &str = "CF_STAGING_TIMEOUT";
pub const STARTUP_TIMEOUT_ENV: &str = "CF_STARTUP_TIMEOUT";

/// One week.
pub const MAX_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;
/// One day.
pub const MAX_TOKEN_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("Invalid configuration: {field} = {value} is outside 1..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Name used in help text and tips, e.g. "Use 'paasctl logs ...'".
    pub binary_name: String,
    pub token_refresh_interval_secs: u64,
    pub target: TargetConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}

/// Org, space and user the commands act as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub org: String,
    pub space: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub staging_minutes: u64,
    pub startup_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory of the daily rolling diagnostics file.
    pub directory: PathBuf,
    /// Default filter when `PAASCTL_LOG` is not set.
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary_name: "paasctl".to_string(),
            token_refresh_interval_secs: 240,
            target: TargetConfig {
                org: "system".to_string(),
                space: "development".to_string(),
                user: "admin".to_string(),
            },
            timeouts: TimeoutConfig {
                staging_minutes: 15,
                startup_minutes: 5,
            },
            logging: LoggingConfig {
                directory: default_log_directory(),
                level: "info".to_string(),
            },
        }
    }
}

impl TimeoutConfig {
    pub fn staging(&self) -> Duration {
        minutes(self.staging_minutes)
    }

    pub fn startup(&self) -> Duration {
        minutes(self.startup_minutes)
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.min(MAX_TIMEOUT_MINUTES).saturating_mul(60))
}

impl Config {
    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.token_refresh_interval_secs
                .min(MAX_TOKEN_REFRESH_INTERVAL_SECS),
        )
    }

    /// Load from the process environment. An explicit `path` must exist; the
    /// default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        match path {
            Some(path) => Self::load_from(Some(path), true, &env),
            None => Self::load_from(default_config_path().as_deref(), false, &env),
        }
    }

    /// Layer defaults, the TOML file, `PAASCTL__` overrides, then the legacy
    /// timeout variables, reading variables from `env`.
    #[instrument(
        name = "config_loader",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load_from(
        path: Option<&Path>,
        required: bool,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            tracing::trace!(
                configuration_file_path = %path.display(),
                required,
                "Layering paasctl configuration file"
            );
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(required));
        }

        let overrides: config::Map<String, String> = env
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        builder = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(Some(overrides)),
            )
            .set_override_option(
                "timeouts.staging_minutes",
                legacy_minutes(env, STAGING_TIMEOUT_ENV),
            )?
            .set_override_option(
                "timeouts.startup_minutes",
                legacy_minutes(env, STARTUP_TIMEOUT_ENV),
            )?;

        let config = match builder.build().and_then(|c| c.try_deserialize::<Config>()) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load paasctl configuration");
                return Err(e.into());
            }
        };
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Rejecting paasctl configuration");
            return Err(e);
        }

        tracing::trace!(config = ?config, "paasctl configuration loaded successfully");
        Ok(config)
    }

    /// Durations are later added to `Instant::now()`, so they must stay small.
    fn validate(&self) -> Result<(), ConfigError> {
        in_range(
            "timeouts.staging_minutes",
            self.timeouts.staging_minutes,
            MAX_TIMEOUT_MINUTES,
        )?;
        in_range(
            "timeouts.startup_minutes",
            self.timeouts.startup_minutes,
            MAX_TIMEOUT_MINUTES,
        )?;
        in_range(
            "token_refresh_interval_secs",
            self.token_refresh_interval_secs,
            MAX_TOKEN_REFRESH_INTERVAL_SECS,
        )
    }

    /// Effective configuration as TOML, for `paasctl config`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn in_range(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, max })
    }
}

fn legacy_minutes(env: &HashMap<String, String>, var: &str) -> Option<i64> {
    let value = env.get(var).filter(|value| !value.is_empty())?;
    match value.parse::<u64>() {
        Ok(minutes) if (1..=MAX_TIMEOUT_MINUTES).contains(&minutes) => i64::try_from(minutes).ok(),
        _ => {
            tracing::warn!(variable = var, value = %value, "Ignoring invalid timeout override");
            None
        }
    }
}

/// `$XDG_CONFIG_HOME/paasctl/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paasctl").join("config.toml"))
}

fn default_log_directory() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("paasctl")
}
