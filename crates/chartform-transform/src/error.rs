//! Pipeline error types
//!
//! Every failure names the repository and chart the run was working on, so a
//! caller rendering many charts can tell them apart.

use chartform_core::CoreError;
use chartform_engine::EngineError;
use chartform_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

/// Failure inside a [`ChartEngine`](crate::ChartEngine) implementation
#[derive(Error, Debug, Diagnostic)]
pub enum ChartEngineError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a transformation run stopped
#[derive(Error, Debug, Diagnostic)]
pub enum TransformError {
    #[error("Invalid override for chart '{chart}': {source}")]
    #[diagnostic(
        code(chartform::transform::invalid_override),
        help("Overrides use key=value pairs separated by commas, e.g. image.tag=1.2,replicas[0]=3")
    )]
    InvalidOverrideSyntax {
        repo: String,
        chart: String,
        source: CoreError,
    },

    #[error("Failed to register repository '{repo}' ({url}) for chart '{chart}'")]
    #[diagnostic(code(chartform::transform::repository))]
    RepositoryRegistrationFailed {
        repo: String,
        url: String,
        chart: String,
        source: RepoError,
    },

    #[error("Failed to refresh repository indexes while rendering '{chart}'")]
    #[diagnostic(
        code(chartform::transform::refresh),
        help("Check the URLs with `chartform repo list`; every configured repository must be reachable")
    )]
    IndexRefreshFailed {
        repo: String,
        chart: String,
        source: RepoError,
    },

    #[error("Chart '{chart}' not found in repository '{repo}'")]
    #[diagnostic(code(chartform::transform::chart_not_found))]
    ChartNotFound {
        repo: String,
        chart: String,
        source: ChartEngineError,
    },

    #[error("Chart '{chart}' from '{repo}' has type '{chart_type}' and cannot be rendered")]
    #[diagnostic(
        code(chartform::transform::not_installable),
        help("Only application charts (type empty or 'application') produce manifests")
    )]
    ChartNotInstallable {
        repo: String,
        chart: String,
        chart_type: String,
    },

    #[error("Default values of chart '{chart}' from '{repo}' are invalid")]
    #[diagnostic(code(chartform::transform::invalid_values))]
    InvalidChartValues {
        repo: String,
        chart: String,
        source: CoreError,
    },

    #[error("High-availability values of chart '{chart}' from '{repo}' could not be read")]
    #[diagnostic(code(chartform::transform::ha_values))]
    HaOverrideUnreadable {
        repo: String,
        chart: String,
        source: CoreError,
    },

    #[error("Chart '{chart}' from '{repo}' is missing dependencies: {}", .missing.join(", "))]
    #[diagnostic(
        code(chartform::transform::dependencies),
        help("Enable dependency updates (CHARTFORM_DEPENDENCY_UPDATE=true) to download them")
    )]
    UnsatisfiedDependencies {
        repo: String,
        chart: String,
        missing: Vec<String>,
    },

    #[error("Failed to update dependencies of chart '{chart}' from '{repo}'")]
    #[diagnostic(code(chartform::transform::dependency_update))]
    DependencyUpdateFailed {
        repo: String,
        chart: String,
        source: ChartEngineError,
    },

    #[error("Failed to render chart '{chart}' from '{repo}'")]
    #[diagnostic(code(chartform::transform::render))]
    RenderFailed {
        repo: String,
        chart: String,
        #[diagnostic_source]
        source: ChartEngineError,
    },
}

impl TransformError {
    /// Repository the failed run was using
    pub fn repo(&self) -> &str {
        match self {
            Self::InvalidOverrideSyntax { repo, .. }
            | Self::RepositoryRegistrationFailed { repo, .. }
            | Self::IndexRefreshFailed { repo, .. }
            | Self::ChartNotFound { repo, .. }
            | Self::ChartNotInstallable { repo, .. }
            | Self::InvalidChartValues { repo, .. }
            | Self::HaOverrideUnreadable { repo, .. }
            | Self::UnsatisfiedDependencies { repo, .. }
            | Self::DependencyUpdateFailed { repo, .. }
            | Self::RenderFailed { repo, .. } => repo,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
