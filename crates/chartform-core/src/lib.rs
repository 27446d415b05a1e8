//! chartform core - shared types for rendering charts into manifests
//!
//! This crate provides the foundational types used throughout chartform:
//! - `Values`: configuration trees with non-mutating deep merge
//! - `overrides`: `--set`, `--set-file` and `--values` parsing
//! - `LoadedChart`: an unpacked chart directory
//! - `TemplateContext` / `ReleaseInfo`: what templates see
//! - `Settings`: paths, timeouts and defaults passed to every component

pub mod archive;
pub mod chart;
pub mod context;
pub mod error;
pub mod overrides;
pub mod release;
pub mod settings;
pub mod values;

pub use chart::{ChartDependency, ChartMetadata, DependencyStatus, HA_VALUES_FILE, LoadedChart};
pub use context::TemplateContext;
pub use error::{CoreError, Result};
pub use overrides::OverrideKind;
pub use release::ReleaseInfo;
pub use settings::Settings;
pub use values::Values;
