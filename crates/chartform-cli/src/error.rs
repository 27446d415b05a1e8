//! CLI error types with exit code handling
//!
//! Library errors pass through with their diagnostics intact; each one maps
//! to an exit code from [`exit_codes`](crate::exit_codes).

use chartform_repo::RepoError;
use chartform_transform::TransformError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    #[diagnostic(code(chartform::cli::repository))]
    Repository(#[from] RepoError),

    /// Some repositories could not be refreshed
    #[error("{failed} of {total} repositories could not be updated")]
    #[diagnostic(
        code(chartform::cli::update),
        help("Fix or re-add the failing repositories, then run `chartform repo update` again")
    )]
    UpdateIncomplete { failed: usize, total: usize },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(chartform::cli::config))]
    Config { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(chartform::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Transform(err) => transform_exit_code(err),
            CliError::Repository(err) => repo_exit_code(err),
            CliError::UpdateIncomplete { .. } => exit_codes::REPOSITORY_ERROR,
            CliError::Config { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

fn repo_exit_code(err: &RepoError) -> i32 {
    match err {
        RepoError::LockTimeout { .. } => exit_codes::LOCK_TIMEOUT,
        RepoError::InvalidRepositoryUrl { .. } | RepoError::InvalidRepositoryName { .. } => {
            exit_codes::USAGE_ERROR
        }
        RepoError::Io(_) | RepoError::Filesystem { .. } => exit_codes::IO_ERROR,
        _ => exit_codes::REPOSITORY_ERROR,
    }
}

fn transform_exit_code(err: &TransformError) -> i32 {
    match err {
        TransformError::InvalidOverrideSyntax { .. } => exit_codes::USAGE_ERROR,
        TransformError::RepositoryRegistrationFailed { source, .. }
        | TransformError::IndexRefreshFailed { source, .. } => repo_exit_code(source),
        TransformError::ChartNotFound { .. }
        | TransformError::ChartNotInstallable { .. }
        | TransformError::InvalidChartValues { .. }
        | TransformError::HaOverrideUnreadable { .. }
        | TransformError::UnsatisfiedDependencies { .. }
        | TransformError::DependencyUpdateFailed { .. } => exit_codes::CHART_ERROR,
        TransformError::RenderFailed { .. } => exit_codes::TEMPLATE_ERROR,
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
