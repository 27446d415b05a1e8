//! Locating, checking and rendering charts
//!
//! [`ChartEngine`] is the seam between the pipeline and chart storage. The
//! bundled [`LocalChartEngine`] resolves charts through the cached repository
//! indexes, unpacks them into a private temporary directory and renders them
//! with [`chartform_engine::Engine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chartform_core::archive::{expand_subchart_archives, extract_chart_archive};
use chartform_core::{DependencyStatus, LoadedChart, ReleaseInfo, Settings, Values};
use chartform_engine::Engine;
use chartform_repo::{Getter, IndexCache, RepoError, RepositoryFile};
use tempfile::TempDir;

use crate::error::ChartEngineError;
use crate::request::RenderResult;

/// A located chart, unpacked on disk
///
/// When the chart was unpacked into a temporary directory the handle owns it;
/// dropping the handle removes the files.
#[derive(Debug)]
pub struct ChartHandle {
    repo: String,
    chart: LoadedChart,
    _workdir: Option<TempDir>,
}

impl ChartHandle {
    /// Handle to a chart directory the caller owns
    ///
    /// Packaged subcharts (`charts/*.tgz`) are unpacked in place so they are
    /// both counted by the dependency check and rendered.
    pub fn from_dir(repo: impl Into<String>, path: &Path) -> Result<Self, ChartEngineError> {
        let chart = LoadedChart::load(path)?;
        expand_subchart_archives(&chart.charts_dir)?;
        Ok(Self {
            repo: repo.into(),
            chart,
            _workdir: None,
        })
    }

    fn unpacked(repo: &str, root: PathBuf, workdir: TempDir) -> Result<Self, ChartEngineError> {
        Ok(Self {
            repo: repo.to_string(),
            chart: LoadedChart::load(root)?,
            _workdir: Some(workdir),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn chart(&self) -> &LoadedChart {
        &self.chart
    }

    /// Reload the chart from disk after its `charts/` changed
    pub fn reload(&mut self) -> Result<(), ChartEngineError> {
        self.chart = LoadedChart::load(&self.chart.root)?;
        Ok(())
    }
}

/// Chart storage and rendering used by the pipeline
#[async_trait]
pub trait ChartEngine: Send + Sync {
    /// Find `chart` in `repo` and make it available on disk
    ///
    /// `version` is an exact version or a semver range; `None` picks the
    /// latest stable version.
    async fn locate_chart(
        &self,
        repo: &str,
        chart: &str,
        version: Option<&str>,
    ) -> Result<ChartHandle, ChartEngineError>;

    /// Compare declared dependencies with the vendored ones
    fn check_dependencies(
        &self,
        chart: &ChartHandle,
    ) -> Result<DependencyStatus, ChartEngineError> {
        Ok(chart.chart().check_dependencies()?)
    }

    /// Render the chart without contacting a cluster
    fn render(
        &self,
        chart: &ChartHandle,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<RenderResult, ChartEngineError>;
}

/// Chart engine backed by the local index cache and a [`Getter`]
pub struct LocalChartEngine {
    config_path: PathBuf,
    cache: IndexCache,
    getter: Arc<dyn Getter>,
    engine: Engine,
}

impl LocalChartEngine {
    pub fn new(settings: &Settings, getter: Arc<dyn Getter>) -> Self {
        Self {
            config_path: settings.repository_config.clone(),
            cache: IndexCache::new(&settings.repository_cache),
            getter,
            engine: Engine::default(),
        }
    }

    /// Use a differently configured template engine
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }
}

#[async_trait]
impl ChartEngine for LocalChartEngine {
    async fn locate_chart(
        &self,
        repo: &str,
        chart: &str,
        version: Option<&str>,
    ) -> Result<ChartHandle, ChartEngineError> {
        let entry = RepositoryFile::load(&self.config_path)?
            .get(repo)
            .cloned()
            .ok_or_else(|| RepoError::RepositoryNotFound { name: repo.to_string() })?;

        let index = self.cache.load(repo)?;
        let chart_version = index.resolve(repo, chart, version)?;
        let data = self.getter.download_chart(&entry, chart_version).await?;

        let workdir = tempfile::Builder::new().prefix("chartform-").tempdir()?;
        let root = extract_chart_archive(&data, workdir.path())?;

        tracing::debug!(
            repo = %repo,
            chart = %chart,
            version = %chart_version.version,
            path = %root.display(),
            "chart unpacked"
        );
        ChartHandle::unpacked(repo, root, workdir)
    }

    fn render(
        &self,
        chart: &ChartHandle,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<RenderResult, ChartEngineError> {
        let rendered = self.engine.render_chart(chart.chart(), values, release)?;
        Ok(RenderResult {
            manifest: rendered.manifest,
            notes: rendered.notes,
        })
    }
}
