//! Chart profiles
//!
//! Chart families differ only in which value layers they accept. A profile
//! switches those layers on or off for one pipeline.

use std::fmt;
use std::str::FromStr;

/// Which value layers a pipeline applies on top of chart defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartProfile {
    /// Apply `--values`, `--set` and `--set-file` layers
    pub needs_override_args: bool,

    /// Apply `values-ha.yaml` when high availability is requested
    pub needs_ha_merge: bool,
}

impl Default for ChartProfile {
    fn default() -> Self {
        Self::full()
    }
}

impl ChartProfile {
    /// Names accepted by [`ChartProfile::from_name`]
    pub const NAMES: [&'static str; 4] = ["full", "defaults-only", "linkerd", "consul"];

    /// Every layer
    pub const fn full() -> Self {
        Self {
            needs_override_args: true,
            needs_ha_merge: true,
        }
    }

    /// Chart defaults only
    pub const fn defaults_only() -> Self {
        Self {
            needs_override_args: false,
            needs_ha_merge: false,
        }
    }

    /// Linkerd charts ship `values-ha.yaml` and take overrides
    pub const fn linkerd() -> Self {
        Self::full()
    }

    /// Consul charts render from their defaults
    pub const fn consul() -> Self {
        Self::defaults_only()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "full" => Some(Self::full()),
            "defaults-only" | "defaults_only" => Some(Self::defaults_only()),
            "linkerd" => Some(Self::linkerd()),
            "consul" => Some(Self::consul()),
            _ => None,
        }
    }
}

impl FromStr for ChartProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!("unknown profile '{}' (expected one of: {})", s, Self::NAMES.join(", "))
        })
    }
}

impl fmt::Display for ChartProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "overrides={} ha={}",
            self.needs_override_args, self.needs_ha_merge
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_profiles() {
        assert_eq!(ChartProfile::from_name("linkerd"), Some(ChartProfile::full()));
        assert_eq!(ChartProfile::from_name("consul"), Some(ChartProfile::defaults_only()));
        assert!(ChartProfile::from_name("istio").is_none());

        for name in ChartProfile::NAMES {
            assert!(name.parse::<ChartProfile>().is_ok(), "{name}");
        }
    }

    #[test]
    fn test_unknown_profile_lists_choices() {
        let err = "istio".parse::<ChartProfile>().unwrap_err();
        assert!(err.contains("defaults-only"));
    }
}
