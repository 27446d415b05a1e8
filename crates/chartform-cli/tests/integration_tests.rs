//! Integration tests for CLI commands
//!
//! Repositories are plain directories holding `index.yaml` and chart
//! archives, so no server is needed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chartform_core::archive::package_chart;
use tempfile::TempDir;

struct Env {
    home: TempDir,
    repo: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            home: tempfile::tempdir().unwrap(),
            repo: tempfile::tempdir().unwrap(),
        };
        publish_demo_chart(env.repo.path());
        env
    }

    fn repo_url(&self) -> String {
        self.repo.path().display().to_string()
    }

    /// Run chartform against this environment's repository file and cache
    fn chartform(&self, args: &[&str]) -> Output {
        let config = self.home.path().join("repositories.yaml");
        let cache = self.home.path().join("cache");
        Command::new(env!("CARGO_BIN_EXE_chartform"))
            .arg("--repository-config")
            .arg(&config)
            .arg("--repository-cache")
            .arg(&cache)
            .args(args)
            .env_remove("CHARTFORM_NAMESPACE")
            .env_remove("CHARTFORM_LOCK_TIMEOUT")
            .env_remove("CHARTFORM_DEPENDENCY_UPDATE")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute chartform")
    }

    fn render(&self, extra: &[&str]) -> Output {
        let repo_url = self.repo_url();
        let mut args = vec![
            "render",
            "demo",
            "--release",
            "web",
            "--repo-name",
            "local",
            "--repo-url",
            repo_url.as_str(),
        ];
        args.extend_from_slice(extra);
        self.chartform(&args)
    }
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn publish_demo_chart(repo: &Path) {
    let chart = tempfile::tempdir().unwrap();
    write(chart.path(), "Chart.yaml", "apiVersion: v2\nname: demo\nversion: 0.1.0\n");
    write(chart.path(), "values.yaml", "replicas: 1\nimage:\n  tag: stable\n");
    write(chart.path(), "values-ha.yaml", "replicas: 3\n");
    write(
        chart.path(),
        "templates/deployment.yaml",
        "kind: Deployment\nmetadata:\n  namespace: {{ release.namespace }}\nspec:\n  replicas: {{ values.replicas }}\n  image: demo:{{ values.image.tag }}\n",
    );
    write(chart.path(), "templates/NOTES.txt", "Thanks for rendering {{ chart.name }}");

    let archive = package_chart(chart.path()).unwrap();
    std::fs::write(repo.join("demo-0.1.0.tgz"), archive).unwrap();
    write(
        repo,
        "index.yaml",
        "apiVersion: v1\nentries:\n  demo:\n    - name: demo\n      version: 0.1.0\n      urls:\n        - demo-0.1.0.tgz\n",
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

mod repo_command {
    use super::*;

    #[test]
    fn test_list_without_repositories() {
        let env = Env::new();
        let output = env.chartform(&["repo", "list"]);

        assert!(output.status.success());
        assert!(stdout(&output).contains("No repositories configured"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let env = Env::new();
        let url = env.repo_url();

        let first = env.chartform(&["repo", "add", "local", &url]);
        assert!(first.status.success(), "{}", stderr(&first));
        assert!(stdout(&first).contains("has been added"));

        let second = env.chartform(&["repo", "add", "local", &url]);
        assert!(second.status.success(), "{}", stderr(&second));
        assert!(stdout(&second).contains("already exists"));

        let list = env.chartform(&["repo", "list"]);
        let listed = stdout(&list);
        assert_eq!(listed.lines().filter(|l| l.starts_with("local ")).count(), 1, "{listed}");
        assert!(listed.contains(&url));
    }

    #[test]
    fn test_add_invalid_url_is_a_usage_error() {
        let env = Env::new();
        let output = env.chartform(&["repo", "add", "local", "not-a-url"]);

        assert_eq!(output.status.code(), Some(2));
        assert!(!env.home.path().join("repositories.yaml").exists());
    }

    #[test]
    fn test_update_refreshes_every_repository() {
        let env = Env::new();
        let url = env.repo_url();
        assert!(env.chartform(&["repo", "add", "local", &url]).status.success());

        let output = env.chartform(&["repo", "update"]);

        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stdout(&output).contains("\"local\""));
        assert!(stdout(&output).contains("Update Complete"));
        assert!(env.home.path().join("cache/local-index.yaml").is_file());
    }

    #[test]
    fn test_update_without_repositories_fails() {
        let env = Env::new();
        let output = env.chartform(&["repo", "update"]);

        assert_eq!(output.status.code(), Some(3));
    }
}

mod render_command {
    use super::*;

    #[test]
    fn test_render_defaults() {
        let env = Env::new();
        let output = env.render(&[]);

        assert!(output.status.success(), "{}", stderr(&output));
        let manifest = stdout(&output);
        assert!(manifest.starts_with("---\n# Source: demo/templates/deployment.yaml\n"));
        assert!(manifest.contains("namespace: default"));
        assert!(manifest.contains("replicas: 1"));
        assert!(!manifest.contains("Thanks for rendering"));
    }

    #[test]
    fn test_render_ha_with_overrides() {
        let env = Env::new();
        let output = env.render(&["--ha", "-n", "prod", "--set", "image.tag=v2"]);

        assert!(output.status.success(), "{}", stderr(&output));
        let manifest = stdout(&output);
        assert!(manifest.contains("namespace: prod"));
        assert!(manifest.contains("replicas: 3"));
        assert!(manifest.contains("image: demo:v2"));
    }

    #[test]
    fn test_defaults_only_profile_ignores_ha() {
        let env = Env::new();
        let output = env.render(&["--ha", "--profile", "consul"]);

        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stdout(&output).contains("replicas: 1"));
    }

    #[test]
    fn test_malformed_override_fails_before_registration() {
        let env = Env::new();
        let output = env.render(&["--set", "a..b=1"]);

        assert_eq!(output.status.code(), Some(2));
        assert!(stderr(&output).contains("Invalid override"));
        assert!(!env.home.path().join("repositories.yaml").exists());
    }

    #[test]
    fn test_render_to_output_dir() {
        let env = Env::new();
        let out: PathBuf = env.home.path().join("out");
        let out_arg = out.display().to_string();

        let output = env.render(&["--output-dir", &out_arg]);

        assert!(output.status.success(), "{}", stderr(&output));
        let manifest = std::fs::read_to_string(out.join("web.yaml")).unwrap();
        assert!(manifest.contains("kind: Deployment"));
        let notes = std::fs::read_to_string(out.join("NOTES.txt")).unwrap();
        assert_eq!(notes, "Thanks for rendering demo");
    }

    #[test]
    fn test_unknown_chart_exit_code() {
        let env = Env::new();
        let repo_url = env.repo_url();
        let output = env.chartform(&[
            "render",
            "missing",
            "--release",
            "web",
            "--repo-name",
            "local",
            "--repo-url",
            &repo_url,
        ]);

        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let env = Env::new();
        let output = env.render(&["--profile", "istio"]);

        assert_eq!(output.status.code(), Some(2));
        assert!(stderr(&output).contains("unknown profile"));
    }
}
