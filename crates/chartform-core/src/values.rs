//! Values handling with deep merge support
//!
//! A [`Values`] tree is a JSON object whose leaves are scalars or arrays.
//! Merging never touches its inputs: every merge returns a fresh tree.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    ///
    /// An empty document yields empty values. Anything other than a mapping
    /// at the top level is rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_json_value(value)
    }

    /// Wrap an existing JSON value, normalizing `null` to an empty tree
    pub fn from_json_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::InvalidValues {
                message: format!("expected a mapping at the top level, found {}", kind_of(&other)),
            }),
        }
    }

    /// Deep merge `overlay` on top of these values, returning a new tree
    ///
    /// Rules:
    /// - Objects: recursive merge
    /// - Scalars: overlay replaces base
    /// - Arrays: overlay replaces base (not appended)
    /// - Type mismatch: overlay replaces base
    #[must_use]
    pub fn merge(&self, overlay: &Values) -> Values {
        let mut merged = self.0.clone();
        deep_merge(&mut merged, &overlay.0);
        Values(merged)
    }

    /// Merge layers left-to-right on top of `base`
    ///
    /// Later layers win. Neither `base` nor any layer is modified.
    #[must_use]
    pub fn merge_layers<'a, I>(base: &Values, layers: I) -> Values
    where
        I: IntoIterator<Item = &'a Values>,
    {
        let mut merged = base.0.clone();
        for layer in layers {
            deep_merge(&mut merged, &layer.0);
        }
        Values(merged)
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: JsonValue) {
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Mutable access for parsers that build trees in place
    pub(crate) fn inner_mut(&mut self) -> &mut JsonValue {
        &mut self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Scope values for a subchart
    ///
    /// A subchart sees `global.*` as-is and the parent's `<subchart>.*`
    /// subtree as its root values.
    pub fn scope_for_subchart(&self, subchart_name: &str) -> Values {
        let mut scoped = serde_json::Map::new();

        if let JsonValue::Object(parent_obj) = &self.0 {
            if let Some(global) = parent_obj.get("global") {
                scoped.insert("global".to_string(), global.clone());
            }

            if let Some(JsonValue::Object(subchart_obj)) = parent_obj.get(subchart_name) {
                for (k, v) in subchart_obj {
                    scoped.insert(k.clone(), v.clone());
                }
            }
        }

        Values(JsonValue::Object(scoped))
    }

    /// Subchart value resolution: the subchart's own defaults, overlaid with
    /// the values the parent scoped to it
    pub fn for_subchart(
        subchart_defaults: &Values,
        parent_values: &Values,
        subchart_name: &str,
    ) -> Values {
        subchart_defaults.merge(&parent_values.scope_for_subchart(subchart_name))
    }
}

impl From<JsonValue> for Values {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Set a nested value by path, replacing non-object intermediates
fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = value {
        let entry = map
            .entry((*key).to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        set_nested(entry, remaining, new_value);
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}
