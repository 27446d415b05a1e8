//! Repository index types
//!
//! Helm-compatible `index.yaml`: every chart name maps to the list of
//! published versions.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{RepoError, Result};

/// Repository index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartIndex {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// When this index was generated, as published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,

    /// Charts indexed by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartVersion>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn compare_versions(a: &ChartVersion, b: &ChartVersion) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

impl ChartIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let index: Option<Self> =
            serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
                message: e.to_string(),
            })?;
        index.ok_or_else(|| RepoError::IndexParseError {
            message: "index is empty".to_string(),
        })
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Get all versions of a chart
    pub fn get(&self, name: &str) -> Option<&Vec<ChartVersion>> {
        self.entries.get(name)
    }

    /// Get the latest stable version of a chart
    ///
    /// Pre-releases are only chosen when nothing else is published.
    pub fn get_latest(&self, name: &str) -> Option<&ChartVersion> {
        let versions = self.entries.get(name)?;
        versions
            .iter()
            .filter(|v| v.parsed_version().is_some_and(|p| p.pre.is_empty()))
            .max_by(|a, b| compare_versions(a, b))
            .or_else(|| versions.iter().max_by(|a, b| compare_versions(a, b)))
    }

    /// Get a specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartVersion> {
        let wanted = version.trim_start_matches('v');
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version.trim_start_matches('v') == wanted)
    }

    /// Find versions matching a semver constraint
    pub fn find_matching(&self, name: &str, constraint: &str) -> Result<Vec<&ChartVersion>> {
        let entries = self.entries.get(name).ok_or_else(|| RepoError::ChartNotFound {
            name: name.to_string(),
            repo: "unknown".to_string(),
        })?;

        let req =
            semver::VersionReq::parse(constraint).map_err(|e| RepoError::UnsatisfiableConstraint {
                name: name.to_string(),
                constraint: constraint.to_string(),
                available: format!("invalid constraint: {}", e),
            })?;

        Ok(entries
            .iter()
            .filter(|e| e.parsed_version().map(|v| req.matches(&v)).unwrap_or(false))
            .collect())
    }

    /// Find the highest version matching a constraint
    pub fn find_best_match(&self, name: &str, constraint: &str) -> Result<&ChartVersion> {
        let matching = self.find_matching(name, constraint)?;

        matching
            .into_iter()
            .max_by(|a, b| compare_versions(a, b))
            .ok_or_else(|| RepoError::UnsatisfiableConstraint {
                name: name.to_string(),
                constraint: constraint.to_string(),
                available: self
                    .entries
                    .get(name)
                    .map(|v| v.iter().map(|e| e.version.as_str()).collect::<Vec<_>>().join(", "))
                    .unwrap_or_else(|| "none".to_string()),
            })
    }

    /// Resolve a chart in repository `repo`
    ///
    /// No version selects the latest stable release; an exact version must be
    /// published; anything else is treated as a semver range.
    pub fn resolve(&self, repo: &str, name: &str, version: Option<&str>) -> Result<&ChartVersion> {
        if !self.entries.contains_key(name) {
            return Err(RepoError::ChartNotFound {
                name: name.to_string(),
                repo: repo.to_string(),
            });
        }

        let Some(version) = version.map(str::trim).filter(|v| !v.is_empty()) else {
            return self.get_latest(name).ok_or_else(|| RepoError::ChartNotFound {
                name: name.to_string(),
                repo: repo.to_string(),
            });
        };

        if Version::parse(version.trim_start_matches('v')).is_ok() {
            return self.get_version(name, version).ok_or_else(|| RepoError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
                repo: repo.to_string(),
            });
        }

        self.find_best_match(name, version)
    }

    /// List all chart names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Add an entry to the index
    pub fn add_entry(&mut self, entry: ChartVersion) {
        self.entries.entry(entry.name.clone()).or_default().push(entry);
    }
}

/// One published chart version
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    /// Chart name
    pub name: String,

    /// Chart version (semver)
    pub version: String,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// URLs to download the chart archive, absolute or relative to the repository
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,

    /// Deprecated flag
    #[serde(default)]
    pub deprecated: bool,

    /// Chart type (application or library)
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,

    /// Declared dependencies
    #[serde(default)]
    pub dependencies: Vec<IndexDependency>,
}

impl ChartVersion {
    /// Get the primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    /// Parse version as semver
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(self.version.trim_start_matches('v')).ok()
    }
}

/// Dependency in an index entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDependency {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> ChartIndex {
        let yaml = r#"
apiVersion: v1
generated: "2024-01-01T00:00:00Z"
entries:
  linkerd-control-plane:
    - name: linkerd-control-plane
      version: "1.16.11"
      appVersion: stable-2.14.10
      urls:
        - linkerd-control-plane-1.16.11.tgz
      digest: "sha256:abc123"
    - name: linkerd-control-plane
      version: "1.15.0"
      appVersion: stable-2.13.7
      urls:
        - https://example.com/charts/linkerd-control-plane-1.15.0.tgz
    - name: linkerd-control-plane
      version: "1.17.0-edge"
      urls:
        - linkerd-control-plane-1.17.0-edge.tgz
  consul:
    - name: consul
      version: "1.3.0"
      description: Consul service mesh
      urls:
        - https://example.com/charts/consul-1.3.0.tgz
"#;
        ChartIndex::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_parse_index() {
        let index = sample_index();
        assert_eq!(index.names(), vec!["consul", "linkerd-control-plane"]);
        assert_eq!(index.generated.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_latest_skips_prereleases() {
        let index = sample_index();
        assert_eq!(index.get_latest("linkerd-control-plane").unwrap().version, "1.16.11");
    }

    #[test]
    fn test_find_best_match() {
        let index = sample_index();
        let best = index.find_best_match("linkerd-control-plane", "~1.15").unwrap();
        assert_eq!(best.version, "1.15.0");

        let err = index.find_best_match("linkerd-control-plane", ">=2.0.0").unwrap_err();
        assert!(matches!(err, RepoError::UnsatisfiableConstraint { .. }));
    }

    #[test]
    fn test_resolve() {
        let index = sample_index();

        assert_eq!(index.resolve("l5d", "linkerd-control-plane", None).unwrap().version, "1.16.11");
        assert_eq!(
            index.resolve("l5d", "linkerd-control-plane", Some("1.15.0")).unwrap().version,
            "1.15.0"
        );
        assert_eq!(
            index.resolve("l5d", "linkerd-control-plane", Some("^1.15")).unwrap().version,
            "1.16.11"
        );

        assert!(matches!(
            index.resolve("l5d", "linkerd-control-plane", Some("9.9.9")),
            Err(RepoError::VersionNotFound { .. })
        ));
        assert!(matches!(
            index.resolve("l5d", "nginx", None),
            Err(RepoError::ChartNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_index() {
        assert!(matches!(
            ChartIndex::from_yaml("entries: [not, a, map]"),
            Err(RepoError::IndexParseError { .. })
        ));
        assert!(matches!(ChartIndex::from_yaml(""), Err(RepoError::IndexParseError { .. })));
    }
}
