//! Render command - run the transformation pipeline for one chart

use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chartform_core::Settings;
use chartform_repo::{Getter, HttpGetter};
use chartform_transform::{
    ChartProfile, LocalChartEngine, SET_ARG, SET_FILE_ARG, TransformRequest, Transformer,
    VALUES_ARG,
};

use crate::error::Result;

pub struct RenderArgs {
    pub chart: String,
    pub release: String,
    pub repo_name: String,
    pub repo_url: String,
    pub namespace: String,
    pub high_availability: bool,
    pub set: Vec<String>,
    pub set_file: Vec<String>,
    pub values: Vec<PathBuf>,
    pub version: Option<String>,
    pub profile: ChartProfile,
    pub output_dir: Option<PathBuf>,
}

impl RenderArgs {
    fn request(&self) -> TransformRequest {
        let mut request =
            TransformRequest::new(&self.chart, &self.release, &self.repo_name, &self.repo_url)
                .with_namespace(&self.namespace)
                .with_high_availability(self.high_availability);

        for path in &self.values {
            request = request.with_override(VALUES_ARG, path.display().to_string());
        }
        for assignment in &self.set {
            request = request.with_override(SET_ARG, assignment);
        }
        for assignment in &self.set_file {
            request = request.with_override(SET_FILE_ARG, assignment);
        }
        if let Some(version) = &self.version {
            request = request.with_version(version);
        }
        request
    }
}

pub async fn run(settings: &Settings, args: RenderArgs) -> Result<()> {
    let getter: Arc<dyn Getter> = Arc::new(HttpGetter::from_settings(settings)?);
    let engine = Arc::new(LocalChartEngine::new(settings, getter.clone()));
    let transformer = Transformer::new(settings.clone(), getter, engine, args.profile);

    let result = transformer.run(&args.request()).await?;

    match &args.output_dir {
        Some(dir) => {
            let file_name = format!("{}.yaml", args.release);
            let manifest_path = write_output(dir, &file_name, &result.manifest)?;
            eprintln!(
                "{} Wrote {}",
                style("✓").green().bold(),
                manifest_path.display()
            );
            if let Some(notes) = &result.notes {
                write_output(dir, "NOTES.txt", notes)?;
            }
        }
        None => print!("{}", result.manifest),
    }

    Ok(())
}

fn write_output(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, content)?;
    Ok(path)
}
