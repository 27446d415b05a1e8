//! Release information handed to templates

use serde::{Deserialize, Serialize};

/// Service name reported to templates as `release.service`
pub const RELEASE_SERVICE: &str = "chartform";

/// Release information for templates
///
/// Rendering is always a client-only dry run, so every release is a first
/// install at revision 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    pub is_install: bool,

    pub is_upgrade: bool,

    /// Service (always "chartform")
    pub service: String,
}

impl ReleaseInfo {
    /// Create release info for a new install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: RELEASE_SERVICE.to_string(),
        }
    }
}
