//! The transformation pipeline
//!
//! A run moves through a fixed sequence of states and stops at the first
//! failure:
//!
//! ```text
//! Start -> RepoRegistered -> IndexesRefreshed -> ChartLocated -> ValuesMerged
//!       -> DependenciesSatisfied -> Rendered -> Done
//! ```
//!
//! Override arguments are parsed in `Start`, before anything touches the
//! network. Nothing is returned unless every state succeeded.

use std::fmt;
use std::sync::Arc;

use chartform_core::{ReleaseInfo, Settings, Values};
use chartform_repo::{Getter, HttpGetter, IndexRefresher, Registry};

use crate::chart_engine::{ChartEngine, ChartHandle, LocalChartEngine};
use crate::error::{ChartEngineError, Result, TransformError};
use crate::profile::ChartProfile;
use crate::request::{RenderResult, TransformRequest};

/// Pipeline state, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Start,
    RepoRegistered,
    IndexesRefreshed,
    ChartLocated,
    ValuesMerged,
    DependenciesSatisfied,
    Rendered,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "Start",
            PipelineState::RepoRegistered => "RepoRegistered",
            PipelineState::IndexesRefreshed => "IndexesRefreshed",
            PipelineState::ChartLocated => "ChartLocated",
            PipelineState::ValuesMerged => "ValuesMerged",
            PipelineState::DependenciesSatisfied => "DependenciesSatisfied",
            PipelineState::Rendered => "Rendered",
            PipelineState::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Render `request` with the HTTP getter, the local chart engine and every
/// value layer enabled
pub async fn transform(settings: &Settings, request: &TransformRequest) -> Result<RenderResult> {
    let getter: Arc<dyn Getter> = Arc::new(HttpGetter::from_settings(settings).map_err(|source| {
        TransformError::RepositoryRegistrationFailed {
            repo: request.repo_name.clone(),
            url: request.repo_url.clone(),
            chart: request.chart_name.clone(),
            source,
        }
    })?);
    let engine = Arc::new(LocalChartEngine::new(settings, getter.clone()));

    Transformer::new(settings.clone(), getter, engine, ChartProfile::full())
        .run(request)
        .await
}

/// Runs the pipeline against a set of collaborators
pub struct Transformer {
    settings: Settings,
    getter: Arc<dyn Getter>,
    engine: Arc<dyn ChartEngine>,
    profile: ChartProfile,
    registry: Registry,
    refresher: IndexRefresher,
}

impl Transformer {
    pub fn new(
        settings: Settings,
        getter: Arc<dyn Getter>,
        engine: Arc<dyn ChartEngine>,
        profile: ChartProfile,
    ) -> Self {
        Self {
            registry: Registry::new(&settings, getter.clone()),
            refresher: IndexRefresher::new(&settings, getter.clone()),
            settings,
            getter,
            engine,
            profile,
        }
    }

    pub fn profile(&self) -> ChartProfile {
        self.profile
    }

    /// Execute one run
    pub async fn run(&self, request: &TransformRequest) -> Result<RenderResult> {
        let repo = request.repo_name.as_str();
        let chart = request.chart_name.as_str();

        enter(request, PipelineState::Start);
        let overrides = self.override_layers(request)?;

        self.registry
            .add(request.repository())
            .await
            .map_err(|source| TransformError::RepositoryRegistrationFailed {
                repo: repo.to_string(),
                url: request.repo_url.clone(),
                chart: chart.to_string(),
                source,
            })?;
        enter(request, PipelineState::RepoRegistered);

        self.refresher
            .refresh_all()
            .await
            .map_err(|source| TransformError::IndexRefreshFailed {
                repo: repo.to_string(),
                chart: chart.to_string(),
                source,
            })?;
        enter(request, PipelineState::IndexesRefreshed);

        let mut handle = self
            .engine
            .locate_chart(repo, chart, request.version.as_deref())
            .await
            .map_err(|source| TransformError::ChartNotFound {
                repo: repo.to_string(),
                chart: chart.to_string(),
                source,
            })?;
        if !handle.chart().metadata.is_installable() {
            return Err(TransformError::ChartNotInstallable {
                repo: repo.to_string(),
                chart: chart.to_string(),
                chart_type: handle.chart().metadata.chart_type().to_string(),
            });
        }
        enter(request, PipelineState::ChartLocated);

        let values = self.merge_values(request, &handle, &overrides)?;
        enter(request, PipelineState::ValuesMerged);

        self.satisfy_dependencies(request, &mut handle).await?;
        enter(request, PipelineState::DependenciesSatisfied);

        let namespace = self.settings.resolve_namespace(&request.namespace);
        let release = ReleaseInfo::for_install(&request.release_name, namespace);
        let result = self
            .engine
            .render(&handle, &values, &release)
            .map_err(|source| TransformError::RenderFailed {
                repo: repo.to_string(),
                chart: chart.to_string(),
                source,
            })?;
        enter(request, PipelineState::Rendered);

        enter(request, PipelineState::Done);
        Ok(result)
    }

    fn override_layers(&self, request: &TransformRequest) -> Result<Vec<Values>> {
        if !self.profile.needs_override_args {
            if !request.override_args.is_empty() {
                tracing::warn!(
                    chart = %request.chart_name,
                    "profile renders chart defaults only; override arguments are ignored"
                );
            }
            return Ok(Vec::new());
        }

        request
            .override_layers()
            .map_err(|source| TransformError::InvalidOverrideSyntax {
                repo: request.repo_name.clone(),
                chart: request.chart_name.clone(),
                source,
            })
    }

    fn merge_values(
        &self,
        request: &TransformRequest,
        handle: &ChartHandle,
        overrides: &[Values],
    ) -> Result<Values> {
        let chart = handle.chart();
        let defaults = chart
            .default_values()
            .map_err(|source| TransformError::InvalidChartValues {
                repo: request.repo_name.clone(),
                chart: request.chart_name.clone(),
                source,
            })?;

        let mut layers = Vec::with_capacity(overrides.len() + 1);
        if request.high_availability && self.profile.needs_ha_merge {
            match chart.ha_values() {
                Ok(Some(ha)) => layers.push(ha),
                Ok(None) => {
                    tracing::debug!(
                        chart = %request.chart_name,
                        "no high-availability values in chart"
                    );
                }
                Err(source) => {
                    return Err(TransformError::HaOverrideUnreadable {
                        repo: request.repo_name.clone(),
                        chart: request.chart_name.clone(),
                        source,
                    });
                }
            }
        }
        layers.extend(overrides.iter().cloned());

        Ok(Values::merge_layers(&defaults, &layers))
    }

    async fn satisfy_dependencies(
        &self,
        request: &TransformRequest,
        handle: &mut ChartHandle,
    ) -> Result<()> {
        let update_failed = |source: ChartEngineError| TransformError::DependencyUpdateFailed {
            repo: request.repo_name.clone(),
            chart: request.chart_name.clone(),
            source,
        };

        let mut status = self.engine.check_dependencies(handle).map_err(update_failed)?;

        if !status.is_satisfied() && self.settings.dependency_update {
            tracing::debug!(
                chart = %request.chart_name,
                missing = ?status.missing,
                "downloading missing dependencies"
            );
            let repositories = self
                .registry
                .list()
                .map_err(|e| update_failed(e.into()))?;
            self.getter
                .download_dependencies(handle.chart(), &repositories)
                .await
                .map_err(|e| update_failed(e.into()))?;
            handle.reload().map_err(update_failed)?;
            status = self.engine.check_dependencies(handle).map_err(update_failed)?;
        }

        if status.is_satisfied() {
            Ok(())
        } else {
            Err(TransformError::UnsatisfiedDependencies {
                repo: request.repo_name.clone(),
                chart: request.chart_name.clone(),
                missing: status.missing,
            })
        }
    }
}

fn enter(request: &TransformRequest, state: PipelineState) {
    tracing::debug!(
        state = %state,
        repo = %request.repo_name,
        chart = %request.chart_name,
        release = %request.release_name,
        "pipeline state"
    );
}
