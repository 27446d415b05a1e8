//! Template engine based on MiniJinja

use minijinja::Environment;
use std::path::Path;

use chartform_core::{LoadedChart, ReleaseInfo, TemplateContext, Values};

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;

/// File name of the post-render notes template
const NOTES_FILE: &str = "NOTES.txt";

/// Result of rendering a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChart {
    /// Every rendered document, separated by `---` and headed by its source
    pub manifest: String,

    /// Rendered `NOTES.txt` of the top-level chart
    pub notes: Option<String>,
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: true }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create a configured MiniJinja environment
    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Chainable);
        }

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("empty", filters::empty);
        env.add_filter("haskey", filters::haskey);
        env.add_filter("sha256sum", filters::sha256sum);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("list", functions::list);
        env.add_function("get", functions::get);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);
        env.add_function("tostring", functions::tostring);
        env.add_function("printf", functions::printf);

        env
    }

    /// Render a single template string
    pub fn render_string(
        &self,
        template: &str,
        context: &TemplateContext,
        template_name: &str,
    ) -> Result<String> {
        let mut env = self.create_environment();
        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        let tmpl = env
            .get_template(template_name)
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        tmpl.render(context_value(context)).map_err(|e| {
            EngineError::Template(TemplateError::from_minijinja(e, template_name, template))
        })
    }

    /// Render a chart and its enabled subcharts into one manifest
    ///
    /// Documents are ordered by source path. Templates whose name starts with
    /// `_` only provide helpers and produce no output; blank output is
    /// dropped.
    pub fn render_chart(
        &self,
        chart: &LoadedChart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<RenderedChart> {
        let mut documents = Vec::new();
        let notes = self.render_tree(chart, values, release, chart.name(), true, &mut documents)?;

        documents.sort_by(|a, b| a.0.cmp(&b.0));
        let manifest = documents
            .iter()
            .map(|(source, body)| format!("---\n# Source: {}\n{}\n", source, body.trim_end()))
            .collect();

        Ok(RenderedChart { manifest, notes })
    }

    fn render_tree(
        &self,
        chart: &LoadedChart,
        values: &Values,
        release: &ReleaseInfo,
        prefix: &str,
        top_level: bool,
        documents: &mut Vec<(String, String)>,
    ) -> Result<Option<String>> {
        let notes = self.render_templates(chart, values, release, prefix, top_level, documents)?;

        for subchart in chart.subcharts()? {
            let dependency = chart
                .metadata
                .dependencies
                .iter()
                .find(|d| d.name == subchart.metadata.name);

            if let Some(dep) = dependency {
                if !dep.is_enabled(values) {
                    tracing::debug!(
                        chart = %chart.name(),
                        subchart = %dep.name,
                        "subchart disabled by condition"
                    );
                    continue;
                }
            }

            let scope = dependency.map(|d| d.effective_name()).unwrap_or(subchart.name());
            let sub_values = Values::for_subchart(&subchart.default_values()?, values, scope);
            let sub_prefix = format!("{}/charts/{}", prefix, scope);
            self.render_tree(&subchart, &sub_values, release, &sub_prefix, false, documents)?;
        }

        Ok(notes)
    }

    fn render_templates(
        &self,
        chart: &LoadedChart,
        values: &Values,
        release: &ReleaseInfo,
        prefix: &str,
        top_level: bool,
        documents: &mut Vec<(String, String)>,
    ) -> Result<Option<String>> {
        let template_files = chart.template_files()?;
        let templates_dir = &chart.templates_dir;
        let mut env = self.create_environment();
        let mut sources = Vec::with_capacity(template_files.len());

        // Load everything first so helpers can be imported by name
        for file_path in &template_files {
            let name = relative_name(file_path, templates_dir);
            let content = std::fs::read_to_string(file_path)?;
            let source_name = format!("{}/templates/{}", prefix, name);
            env.add_template_owned(name.clone(), content.clone())
                .map_err(|e| TemplateError::from_minijinja(e, &source_name, &content))?;
            sources.push((name, content));
        }

        let base = TemplateContext::new(values, release.clone(), &chart.metadata);
        let mut notes = None;

        for (name, content) in &sources {
            let file_name = name.rsplit('/').next().unwrap_or(name);
            if file_name.starts_with('_') {
                continue;
            }

            let is_notes = file_name.eq_ignore_ascii_case(NOTES_FILE);
            if is_notes && !top_level {
                continue;
            }

            let source = format!("{}/templates/{}", prefix, name);
            let context = base.clone().with_template(&source, &format!("{}/templates", prefix));
            let tmpl = env
                .get_template(name)
                .map_err(|e| TemplateError::from_minijinja(e, &source, content))?;
            let rendered = tmpl
                .render(context_value(&context))
                .map_err(|e| TemplateError::from_minijinja(e, &source, content))?;

            if is_notes {
                notes = Some(rendered.trim().to_string());
                continue;
            }

            let trimmed = rendered.trim();
            if trimmed.is_empty() || trimmed == "---" {
                continue;
            }
            documents.push((source, rendered));
        }

        Ok(notes)
    }
}

fn relative_name(file_path: &Path, templates_dir: &Path) -> String {
    file_path
        .strip_prefix(templates_dir)
        .unwrap_or(file_path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn context_value(context: &TemplateContext) -> minijinja::Value {
    minijinja::context! {
        values => &context.values,
        release => &context.release,
        chart => &context.chart,
        capabilities => &context.capabilities,
        template => &context.template,
    }
}
