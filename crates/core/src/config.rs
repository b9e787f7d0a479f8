use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub workflow: WorkflowConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Whether overdue open requests are swept into `expired`. The source
    /// system only reported them as overdue; expiry stays opt-in.
    pub auto_expire_overdue_requests: bool,
    /// Base URL rendered into credential payloads: `{base}/verify/{token}`.
    pub verification_base_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    logging: RawLogging,
    #[serde(default)]
    workflow: RawWorkflow,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawServer {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawWorkflow {
    auto_expire_overdue_requests: Option<bool>,
    verification_base_url: Option<String>,
}

const DEFAULT_CONFIG_PATH: &str = "portgate.toml";

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let raw = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
            toml::from_str(&contents)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?
        } else if options.require_file {
            return Err(ConfigError::MissingConfigFile(path));
        } else {
            RawConfig::default()
        };

        let mut config = Self::from_raw(raw);
        let overrides: Vec<(String, String)> = ENV_OVERRIDE_KEYS
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| ((*key).to_owned(), value)))
            .collect();
        apply_env_overrides(&mut config, &overrides)?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Self {
        Self {
            database: DatabaseConfig {
                url: raw.database.url.unwrap_or_else(|| "sqlite://portgate.db".to_owned()),
                max_connections: raw.database.max_connections.unwrap_or(5),
                timeout_secs: raw.database.timeout_secs.unwrap_or(30),
            },
            server: ServerConfig {
                bind_address: raw.server.bind_address.unwrap_or_else(|| "127.0.0.1".to_owned()),
                port: raw.server.port.unwrap_or(8080),
            },
            logging: LoggingConfig {
                level: raw.logging.level.unwrap_or_else(|| "info".to_owned()),
                format: raw.logging.format.unwrap_or(LogFormat::Compact),
            },
            workflow: WorkflowConfig {
                auto_expire_overdue_requests: raw
                    .workflow
                    .auto_expire_overdue_requests
                    .unwrap_or(false),
                verification_base_url: raw
                    .workflow
                    .verification_base_url
                    .unwrap_or_else(|| "http://127.0.0.1:8080".to_owned()),
            },
        }
    }
}

const ENV_OVERRIDE_KEYS: &[&str] = &[
    "PORTGATE_DATABASE_URL",
    "PORTGATE_DB_MAX_CONNECTIONS",
    "PORTGATE_BIND_ADDRESS",
    "PORTGATE_PORT",
    "PORTGATE_LOG_LEVEL",
    "PORTGATE_LOG_FORMAT",
    "PORTGATE_AUTO_EXPIRE_OVERDUE",
    "PORTGATE_VERIFICATION_BASE_URL",
];

fn apply_env_overrides(
    config: &mut AppConfig,
    overrides: &[(String, String)],
) -> Result<(), ConfigError> {
    for (key, value) in overrides {
        match key.as_str() {
            "PORTGATE_DATABASE_URL" => config.database.url = value.clone(),
            "PORTGATE_DB_MAX_CONNECTIONS" => {
                config.database.max_connections = parse_override(key, value)?;
            }
            "PORTGATE_BIND_ADDRESS" => config.server.bind_address = value.clone(),
            "PORTGATE_PORT" => config.server.port = parse_override(key, value)?,
            "PORTGATE_LOG_LEVEL" => config.logging.level = value.clone(),
            "PORTGATE_LOG_FORMAT" => {
                config.logging.format = match value.as_str() {
                    "compact" => LogFormat::Compact,
                    "pretty" => LogFormat::Pretty,
                    "json" => LogFormat::Json,
                    _ => {
                        return Err(ConfigError::InvalidEnvOverride {
                            key: key.clone(),
                            value: value.clone(),
                        })
                    }
                };
            }
            "PORTGATE_AUTO_EXPIRE_OVERDUE" => {
                config.workflow.auto_expire_overdue_requests = match value.as_str() {
                    "1" | "true" | "yes" => true,
                    "0" | "false" | "no" => false,
                    _ => {
                        return Err(ConfigError::InvalidEnvOverride {
                            key: key.clone(),
                            value: value.clone(),
                        })
                    }
                };
            }
            "PORTGATE_VERIFICATION_BASE_URL" => {
                config.workflow.verification_base_url = value.clone();
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}
