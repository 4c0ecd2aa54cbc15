use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sla::SlaPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sla: SlaConfig,
    pub notifications: NotificationConfig,
    pub sweep: SweepConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlaConfig {
    pub emergency_high_hours: i64,
    pub emergency_medium_hours: i64,
    pub routine_high_days: i64,
    pub default_days: i64,
}

impl SlaConfig {
    pub fn policy(&self) -> SlaPolicy {
        SlaPolicy {
            emergency_high_hours: self.emergency_high_hours,
            emergency_medium_hours: self.emergency_medium_hours,
            routine_high_days: self.routine_high_days,
            default_days: self.default_days,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Role names (directory spelling) alerted on SLA breaches.
    pub sla_breach_roles: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SweepConfig {
    pub interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://fieldops.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            sla: SlaConfig {
                emergency_high_hours: 4,
                emergency_medium_hours: 8,
                routine_high_days: 1,
                default_days: 3,
            },
            notifications: NotificationConfig {
                enabled: true,
                sla_breach_roles: vec![
                    "Administrator".to_string(),
                    "Department Head".to_string(),
                ],
            },
            sweep: SweepConfig { interval_secs: 300 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    sla: Option<SlaPatch>,
    notifications: Option<NotificationPatch>,
    sweep: Option<SweepPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlaPatch {
    emergency_high_hours: Option<i64>,
    emergency_medium_hours: Option<i64>,
    routine_high_days: Option<i64>,
    default_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    enabled: Option<bool>,
    sla_breach_roles: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SweepPatch {
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fieldops.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(sla) = patch.sla {
            if let Some(hours) = sla.emergency_high_hours {
                self.sla.emergency_high_hours = hours;
            }
            if let Some(hours) = sla.emergency_medium_hours {
                self.sla.emergency_medium_hours = hours;
            }
            if let Some(days) = sla.routine_high_days {
                self.sla.routine_high_days = days;
            }
            if let Some(days) = sla.default_days {
                self.sla.default_days = days;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(roles) = notifications.sla_breach_roles {
                self.notifications.sla_breach_roles = roles;
            }
        }

        if let Some(sweep) = patch.sweep {
            if let Some(interval_secs) = sweep.interval_secs {
                self.sweep.interval_secs = interval_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FIELDOPS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FIELDOPS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("FIELDOPS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FIELDOPS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FIELDOPS_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_bool("FIELDOPS_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_SWEEP_INTERVAL_SECS") {
            self.sweep.interval_secs = parse_u64("FIELDOPS_SWEEP_INTERVAL_SECS", &value)?;
        }

        let log_level =
            read_env("FIELDOPS_LOGGING_LEVEL").or_else(|| read_env("FIELDOPS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FIELDOPS_LOGGING_FORMAT").or_else(|| read_env("FIELDOPS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications.enabled = enabled;
        }
        if let Some(interval_secs) = overrides.sweep_interval_secs {
            self.sweep.interval_secs = interval_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        let sqlite_url =
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
        if !sqlite_url {
            return Err(ConfigError::Validation(
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    .to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        if self.database.timeout_secs == 0 || self.database.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "database.timeout_secs must be in range 1..=300".to_string(),
            ));
        }

        for (name, value) in [
            ("sla.emergency_high_hours", self.sla.emergency_high_hours),
            ("sla.emergency_medium_hours", self.sla.emergency_medium_hours),
            ("sla.routine_high_days", self.sla.routine_high_days),
            ("sla.default_days", self.sla.default_days),
        ] {
            if value <= 0 {
                return Err(ConfigError::Validation(format!("{name} must be positive")));
            }
        }

        if self.notifications.enabled && self.notifications.sla_breach_roles.is_empty() {
            return Err(ConfigError::Validation(
                "notifications.sla_breach_roles must name at least one role when notifications are enabled"
                    .to_string(),
            ));
        }

        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "sweep.interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fieldops.toml"), PathBuf::from("config/fieldops.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
