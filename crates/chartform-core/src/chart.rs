//! Chart definition and on-disk layout
//!
//! A chart directory contains:
//!
//! ```text
//! Chart.yaml        metadata and declared dependencies
//! values.yaml       default values
//! values-ha.yaml    optional high-availability overrides
//! templates/        manifest templates
//! charts/           vendored dependency charts
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::values::Values;

/// File name of the chart's embedded high-availability value layer
pub const HA_VALUES_FILE: &str = "values-ha.yaml";

/// Chart metadata (`Chart.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (`v1` or `v2`)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    pub name: String,

    /// Chart version (SemVer)
    pub version: String,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Chart type: `application` (default) or `library`
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,

    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Declared dependencies
    #[serde(default)]
    pub dependencies: Vec<ChartDependency>,

    /// Annotations
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,
}

fn default_api_version() -> String {
    "v2".to_string()
}

impl ChartMetadata {
    /// Parse `Chart.yaml` content
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let metadata: Self = serde_yaml::from_str(yaml)?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.api_version.as_str(), "v1" | "v2") {
            return Err(CoreError::InvalidChart {
                message: format!(
                    "Unsupported apiVersion: {}. Expected v1 or v2",
                    self.api_version
                ),
            });
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: "Chart.yaml: name is required".to_string(),
            });
        }
        if self.version.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: format!("Chart.yaml for '{}': version is required", self.name),
            });
        }
        Ok(())
    }

    /// Effective chart type (missing means `application`)
    pub fn chart_type(&self) -> &str {
        match self.chart_type.as_deref() {
            None | Some("") => "application",
            Some(t) => t,
        }
    }

    /// Whether the chart can be rendered as a release
    ///
    /// Only application charts can; library charts provide helpers only.
    pub fn is_installable(&self) -> bool {
        self.chart_type() == "application"
    }

    /// Parse the version as semver
    pub fn parsed_version(&self) -> Result<semver::Version> {
        Ok(semver::Version::parse(&self.version)?)
    }
}

/// A dependency declared in `Chart.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDependency {
    /// Dependency chart name
    pub name: String,

    /// Version constraint (semver range or exact version)
    #[serde(default)]
    pub version: String,

    /// Repository URL the dependency is fetched from
    #[serde(default)]
    pub repository: String,

    /// Values path that enables or disables the dependency at render time
    #[serde(default)]
    pub condition: Option<String>,

    /// Alias name (values and templates see the dependency under this name)
    #[serde(default)]
    pub alias: Option<String>,
}

impl ChartDependency {
    /// Get the effective name (alias if set, otherwise name)
    #[inline]
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether the dependency takes part in rendering with these values
    ///
    /// Conditions may list several comma separated paths; the first path
    /// that resolves to a boolean decides. No resolvable path means enabled.
    pub fn is_enabled(&self, values: &Values) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };

        for path in condition.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(serde_json::Value::Bool(enabled)) = values.get(path) {
                return *enabled;
            }
        }
        true
    }
}

/// Result of checking declared dependencies against `charts/`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyStatus {
    /// Names of declared dependencies with no matching chart in `charts/`
    pub missing: Vec<String>,
}

impl DependencyStatus {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Loaded chart with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedChart {
    /// Chart metadata
    pub metadata: ChartMetadata,

    /// Root directory of the chart
    pub root: PathBuf,

    /// Templates directory
    pub templates_dir: PathBuf,

    /// Default values file path
    pub values_path: PathBuf,

    /// Vendored dependencies directory
    pub charts_dir: PathBuf,
}

impl LoadedChart {
    /// Load a chart from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let chart_file = root.join("Chart.yaml");
        if !chart_file.exists() {
            return Err(CoreError::InvalidChart {
                message: format!("Chart.yaml not found in {}", root.display()),
            });
        }

        let content = std::fs::read_to_string(&chart_file)?;
        let metadata = ChartMetadata::from_yaml(&content)?;

        Ok(Self {
            metadata,
            templates_dir: root.join("templates"),
            values_path: root.join("values.yaml"),
            charts_dir: root.join("charts"),
            root,
        })
    }

    /// Chart name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Default values (`values.yaml`); a missing file is empty values
    pub fn default_values(&self) -> Result<Values> {
        if self.values_path.exists() {
            Values::from_file(&self.values_path)
        } else {
            Ok(Values::new())
        }
    }

    /// Path of the high-availability value layer
    pub fn ha_values_path(&self) -> PathBuf {
        self.root.join(HA_VALUES_FILE)
    }

    /// High-availability value layer (`values-ha.yaml`), `None` when absent
    pub fn ha_values(&self) -> Result<Option<Values>> {
        let path = self.ha_values_path();
        if !path.exists() {
            return Ok(None);
        }
        Values::from_file(&path).map(Some)
    }

    /// Get list of template files, sorted
    pub fn template_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.templates_dir.exists() {
            return Ok(files);
        }

        for entry in walkdir::WalkDir::new(&self.templates_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if matches!(ext.as_str(), "yaml" | "yml" | "tpl" | "j2" | "txt" | "json") {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Load vendored subcharts (directories under `charts/` with a `Chart.yaml`)
    pub fn subcharts(&self) -> Result<Vec<LoadedChart>> {
        let mut subcharts = Vec::new();

        if !self.charts_dir.is_dir() {
            return Ok(subcharts);
        }

        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.charts_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir() && p.join("Chart.yaml").exists())
            .collect();
        dirs.sort();

        for dir in dirs {
            subcharts.push(LoadedChart::load(&dir)?);
        }
        Ok(subcharts)
    }

    /// Check declared dependencies against the charts vendored in `charts/`
    ///
    /// A dependency is present only when an unpacked subchart with exactly
    /// the same chart name exists. Archives must be expanded first (see
    /// [`crate::archive::expand_subchart_archives`]) since the renderer only
    /// walks subchart directories.
    pub fn check_dependencies(&self) -> Result<DependencyStatus> {
        let present: Vec<String> = self
            .subcharts()?
            .into_iter()
            .map(|c| c.metadata.name)
            .collect();

        let missing = self
            .metadata
            .dependencies
            .iter()
            .filter(|dep| !present.iter().any(|n| n == &dep.name))
            .map(|dep| dep.name.clone())
            .collect();

        Ok(DependencyStatus { missing })
    }
}
