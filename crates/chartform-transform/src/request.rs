//! Transformation inputs and outputs

use std::collections::BTreeMap;

use chartform_core::overrides::{parse_set, parse_set_file, parse_values_files};
use chartform_core::{CoreError, Values};
use chartform_repo::RepositoryEntry;

/// Override argument key for `--set` assignments
pub const SET_ARG: &str = "--set";

/// Override argument key for `--set-file` assignments
pub const SET_FILE_ARG: &str = "--set-file";

/// Override argument key for comma separated values files
pub const VALUES_ARG: &str = "--values";

/// What to render, and from where
///
/// A request is immutable for the duration of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformRequest {
    pub chart_name: String,
    pub release_name: String,

    /// Namespace to render into; empty falls back to the configured default
    pub namespace: String,

    pub repo_name: String,
    pub repo_url: String,

    /// Override layers keyed by flag (`--values`, `--set`, `--set-file`)
    pub override_args: BTreeMap<String, String>,

    /// Layer the chart's `values-ha.yaml` over its defaults
    pub high_availability: bool,

    /// Exact version or semver range; latest when absent
    pub version: Option<String>,
}

impl TransformRequest {
    pub fn new(
        chart_name: impl Into<String>,
        release_name: impl Into<String>,
        repo_name: impl Into<String>,
        repo_url: impl Into<String>,
    ) -> Self {
        Self {
            chart_name: chart_name.into(),
            release_name: release_name.into(),
            repo_name: repo_name.into(),
            repo_url: repo_url.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Add an override argument, appending to any existing value for `flag`
    pub fn with_override(mut self, flag: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.override_args
            .entry(flag.to_string())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
        self
    }

    pub fn with_high_availability(mut self, enabled: bool) -> Self {
        self.high_availability = enabled;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Repository entry registered before the chart is located
    pub fn repository(&self) -> RepositoryEntry {
        RepositoryEntry::new(self.repo_name.clone(), self.repo_url.clone())
    }

    /// Parse the override arguments into layers, lowest precedence first
    ///
    /// Values files come first, then `--set`, then `--set-file`. Unknown keys
    /// are rejected.
    pub fn override_layers(&self) -> Result<Vec<Values>, CoreError> {
        if let Some(unknown) = self
            .override_args
            .keys()
            .find(|k| ![VALUES_ARG, SET_ARG, SET_FILE_ARG].contains(&k.as_str()))
        {
            return Err(CoreError::InvalidOverride {
                input: unknown.clone(),
                message: format!(
                    "unknown override argument (expected {}, {} or {})",
                    VALUES_ARG, SET_ARG, SET_FILE_ARG
                ),
            });
        }

        let mut layers = Vec::new();
        if let Some(files) = self.override_args.get(VALUES_ARG) {
            layers.push(parse_values_files(files)?);
        }
        if let Some(set) = self.override_args.get(SET_ARG) {
            layers.push(parse_set(set)?);
        }
        if let Some(set_file) = self.override_args.get(SET_FILE_ARG) {
            layers.push(parse_set_file(set_file)?);
        }
        Ok(layers)
    }
}

/// A rendered chart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderResult {
    /// All rendered documents as one multi-document YAML string
    pub manifest: String,

    /// Rendered `NOTES.txt`, never part of the manifest
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layers_follow_flag_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let values_file = dir.path().join("prod.yaml");
        std::fs::write(&values_file, "replicas: 2\nimage:\n  tag: file\n").unwrap();
        let tag_file = dir.path().join("tag.txt");
        std::fs::write(&tag_file, "from-file").unwrap();

        let request = TransformRequest::new("app", "rel", "repo", "https://example.com")
            .with_override(SET_FILE_ARG, format!("image.tag={}", tag_file.display()))
            .with_override(SET_ARG, "image.tag=set")
            .with_override(SET_ARG, "replicas=3")
            .with_override(VALUES_ARG, values_file.display().to_string());

        let layers = request.override_layers().unwrap();
        let merged = Values::merge_layers(&Values::new(), &layers);

        assert_eq!(layers.len(), 3);
        assert_eq!(merged.get("replicas"), Some(&json!(3)));
        assert_eq!(merged.get("image.tag"), Some(&json!("from-file")));
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let request = TransformRequest::new("app", "rel", "repo", "https://example.com")
            .with_override(SET_ARG, "a..b=1");

        assert!(matches!(request.override_layers(), Err(CoreError::InvalidOverride { .. })));
    }

    #[test]
    fn test_unknown_override_key_is_rejected() {
        let request = TransformRequest::new("app", "rel", "repo", "https://example.com")
            .with_override("--sett", "a=1");

        let err = request.override_layers().unwrap_err();
        assert!(err.to_string().contains("--sett"));
    }
}
