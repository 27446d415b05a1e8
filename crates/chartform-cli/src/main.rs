//! chartform CLI - render Kubernetes manifests from chart repositories

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use chartform_core::Settings;
use chartform_transform::ChartProfile;

mod commands;
mod error;
mod exit_codes;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "chartform")]
#[command(author = "chartform Contributors")]
#[command(version)]
#[command(
    about = "Render Kubernetes manifests from chart repositories without a cluster",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Repository file
    #[arg(long, global = true, env = "CHARTFORM_REPOSITORY_CONFIG")]
    repository_config: Option<PathBuf>,

    /// Directory holding cached repository indexes
    #[arg(long, global = true, env = "CHARTFORM_REPOSITORY_CACHE")]
    repository_cache: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a chart from a repository
    #[command(disable_version_flag = true)]
    Render {
        /// Chart name
        chart: String,

        /// Release name
        #[arg(long)]
        release: String,

        /// Name to register the repository under
        #[arg(long)]
        repo_name: String,

        /// Repository URL
        #[arg(long)]
        repo_url: String,

        /// Target namespace
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Layer the chart's values-ha.yaml over its defaults
        #[arg(long)]
        ha: bool,

        /// Set values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Set values from files (key=path)
        #[arg(long = "set-file")]
        set_file: Vec<String>,

        /// Values file(s) to merge
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Chart version or semver range (latest if omitted)
        #[arg(long)]
        version: Option<String>,

        /// Value layers to apply: full, defaults-only, linkerd, consul
        #[arg(long, default_value = "full")]
        profile: ChartProfile,

        /// Download missing chart dependencies
        #[arg(long)]
        dependency_update: bool,

        /// Output directory (if not set, outputs to stdout)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Manage chart repositories
    #[command(subcommand)]
    Repo(RepoCommands),
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Register a repository
    Add {
        /// Repository name
        name: String,

        /// Repository URL
        url: String,
    },

    /// Refresh every repository index
    Update,

    /// List registered repositories
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code as u8)
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::from_env().map_err(|e| CliError::config(e.to_string()))?;
    if let Some(path) = &cli.repository_config {
        settings.repository_config = path.clone();
    }
    if let Some(path) = &cli.repository_cache {
        settings.repository_cache = path.clone();
    }
    Ok(settings)
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = settings(&cli)?;
    tracing::debug!(
        config = %settings.repository_config.display(),
        cache = %settings.repository_cache.display(),
        "settings loaded"
    );

    match cli.command {
        Commands::Render {
            chart,
            release,
            repo_name,
            repo_url,
            namespace,
            ha,
            set,
            set_file,
            values,
            version,
            profile,
            dependency_update,
            output_dir,
        } => {
            settings.dependency_update |= dependency_update;
            let args = commands::render::RenderArgs {
                chart,
                release,
                repo_name,
                repo_url,
                namespace,
                high_availability: ha,
                set,
                set_file,
                values,
                version,
                profile,
                output_dir,
            };
            commands::render::run(&settings, args).await
        }

        Commands::Repo(RepoCommands::Add { name, url }) => {
            commands::repo::add(&settings, &name, &url).await
        }
        Commands::Repo(RepoCommands::Update) => commands::repo::update(&settings).await,
        Commands::Repo(RepoCommands::List) => commands::repo::list(&settings),
    }
}
