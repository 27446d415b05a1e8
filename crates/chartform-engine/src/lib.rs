//! chartform engine - Jinja2 templating for chart manifests
//!
//! This crate provides a MiniJinja-based template engine with:
//! - Kubernetes-specific filters (toyaml, b64encode, nindent, ...)
//! - Diagnostics that point at the failing template line
//! - Subchart rendering with scoped values and dependency conditions

pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;

pub use engine::{Engine, EngineBuilder, RenderedChart};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
