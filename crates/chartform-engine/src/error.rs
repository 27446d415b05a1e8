//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("Template error in {}", .0.name)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] chartform_core::CoreError),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    InvalidOperation,
    Other,
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(chartform::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Template the error occurred in (`<chart>/templates/<file>`)
    pub name: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a template error from a MiniJinja error
    pub fn from_minijinja(
        err: minijinja::Error,
        template_name: &str,
        template_source: &str,
    ) -> Self {
        let kind = match err.kind() {
            minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
            minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
            minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
            minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
            minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
            _ => TemplateErrorKind::Other,
        };

        let message = err
            .detail()
            .map(|d| format!("{}: {}", err.kind(), d))
            .unwrap_or_else(|| err.to_string());
        let span = err.line().and_then(|line| calculate_span(template_source, line));

        Self {
            message,
            name: template_name.to_string(),
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion: suggestion_for(kind),
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn suggestion_for(kind: TemplateErrorKind) -> Option<String> {
    match kind {
        TemplateErrorKind::UndefinedVariable => Some(
            "Templates see `values`, `release`, `chart`, `capabilities` and `template`; \
             check the key exists in values.yaml or guard it with `is defined`"
                .to_string(),
        ),
        TemplateErrorKind::UnknownFilter => Some(
            "Available filters include toyaml, tojson, quote, nindent, indent, b64encode, required"
                .to_string(),
        ),
        TemplateErrorKind::SyntaxError => {
            Some("Chart templates use Jinja2 syntax: {{ expr }}, {% if %}, {% for %}".to_string())
        }
        _ => None,
    }
}

/// Calculate the source span covering a 1-based line
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, line) in source.lines().enumerate() {
        if index + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

pub type Result<T> = std::result::Result<T, EngineError>;
