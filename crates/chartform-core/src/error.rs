//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid chart: {message}")]
    InvalidChart { message: String },

    #[error("Invalid values: {message}")]
    InvalidValues { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid override '{input}': {message}")]
    InvalidOverride { input: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),
}

impl CoreError {
    pub(crate) fn invalid_override(input: &str, message: impl Into<String>) -> Self {
        CoreError::InvalidOverride {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
