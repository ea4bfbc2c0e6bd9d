//! Configuration loading and representation.
//!
//! Everything comes from environment variables:
//!
//! | variable                        | values             | default |
//! |---------------------------------|--------------------|---------|
//! | `COURSEWISE_LOG_FORMAT`         | `json` / `pretty`  | `json`  |
//! | `COURSEWISE_SERIALIZE_PROGRESS` | `true` / `false`   | `true`  |
//! | `COURSEWISE_TEMPLATES_PATH`     | path to JSON array | unset   |

use std::path::{Path, PathBuf};

use thiserror::Error;

use coursewise_achievements::AchievementTemplate;
use coursewise_core::DomainError;
use coursewise_observability::LogFormat;

pub const LOG_FORMAT_VAR: &str = "COURSEWISE_LOG_FORMAT";
pub const SERIALIZE_PROGRESS_VAR: &str = "COURSEWISE_SERIALIZE_PROGRESS";
pub const TEMPLATES_PATH_VAR: &str = "COURSEWISE_TEMPLATES_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("cannot read templates file {path}: {source}")]
    TemplatesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("templates file {path} is not a JSON array of templates: {source}")]
    TemplatesFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid template '{name}': {source}")]
    InvalidTemplate {
        name: String,
        #[source]
        source: DomainError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_format: LogFormat,
    /// Serialise achievement evaluation per learner.
    pub serialize_progress: bool,
    pub templates_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            serialize_progress: true,
            templates_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get(LOG_FORMAT_VAR) {
            Some(v) => v.parse::<LogFormat>().map_err(|_| ConfigError::InvalidValue {
                key: LOG_FORMAT_VAR,
                value: v,
            })?,
            None => defaults.log_format,
        };

        let serialize_progress = match get(SERIALIZE_PROGRESS_VAR) {
            Some(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue {
                key: SERIALIZE_PROGRESS_VAR,
                value: v,
            })?,
            None => defaults.serialize_progress,
        };

        Ok(Self {
            log_format,
            serialize_progress,
            templates_path: get(TEMPLATES_PATH_VAR).map(PathBuf::from),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read and validate a templates file (a JSON array of templates).
pub fn load_templates(path: &Path) -> Result<Vec<AchievementTemplate>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::TemplatesIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_templates(&raw).map_err(|e| match e {
        ConfigError::TemplatesFormat { source, .. } => ConfigError::TemplatesFormat {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

fn parse_templates(raw: &str) -> Result<Vec<AchievementTemplate>, ConfigError> {
    let templates: Vec<AchievementTemplate> =
        serde_json::from_str(raw).map_err(|source| ConfigError::TemplatesFormat {
            path: PathBuf::new(),
            source,
        })?;
    for template in &templates {
        template
            .validate()
            .map_err(|source| ConfigError::InvalidTemplate {
                name: template.name.clone(),
                source,
            })?;
    }
    Ok(templates)
}
