//! Repository workflows against a real HTTP server

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chartform_core::archive::package_chart;
use chartform_core::{LoadedChart, Settings};
use chartform_repo::getter::compute_digest;
use chartform_repo::{
    AddOutcome, Getter, HttpGetter, IndexCache, IndexRefresher, Registry, RepoError,
    RepositoryEntry,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_chart(dir: &Path, chart_yaml: &str) {
    std::fs::create_dir_all(dir.join("templates")).unwrap();
    std::fs::write(dir.join("Chart.yaml"), chart_yaml).unwrap();
    std::fs::write(dir.join("values.yaml"), "enabled: true\n").unwrap();
}

fn redis_archive() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    write_chart(dir.path(), "apiVersion: v2\nname: redis\nversion: 17.1.0\n");
    package_chart(dir.path()).unwrap()
}

fn index_yaml(digest: &str) -> String {
    format!(
        r#"apiVersion: v1
entries:
  redis:
    - name: redis
      version: 17.1.0
      digest: "{digest}"
      urls:
        - charts/redis-17.1.0.tgz
    - name: redis
      version: 16.0.0
      urls:
        - charts/redis-16.0.0.tgz
"#
    )
}

async fn serve_repository(archive: &[u8], digest: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stable/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml(digest)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stable/charts/redis-17.1.0.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.to_vec()))
        .mount(&server)
        .await;
    server
}

fn settings(home: &Path) -> Settings {
    Settings {
        fetch_timeout: Duration::from_secs(10),
        ..Settings::with_home(home)
    }
}

#[tokio::test]
async fn add_then_refresh_caches_index() {
    let archive = redis_archive();
    let server = serve_repository(&archive, &compute_digest(&archive)).await;
    let home = tempfile::tempdir().unwrap();
    let settings = settings(home.path());
    let getter = Arc::new(HttpGetter::from_settings(&settings).unwrap());

    let registry = Registry::new(&settings, getter.clone());
    let outcome = registry
        .add(RepositoryEntry::new("stable", format!("{}/stable", server.uri())))
        .await
        .unwrap();
    assert_eq!(outcome, AddOutcome::Added);

    let report = IndexRefresher::new(&settings, getter).refresh_all().await.unwrap();
    assert_eq!(report.refreshed, vec!["stable"]);

    let index = IndexCache::new(&settings.repository_cache).load("stable").unwrap();
    assert_eq!(index.get_latest("redis").unwrap().version, "17.1.0");
}

#[tokio::test]
async fn add_unreachable_repository_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();
    let settings = settings(home.path());
    let getter = Arc::new(HttpGetter::from_settings(&settings).unwrap());
    let registry = Registry::new(&settings, getter);

    let err = registry
        .add(RepositoryEntry::new("broken", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, RepoError::UnreachableRepository { .. }));
    assert!(registry.list().unwrap().is_empty());
}

#[tokio::test]
async fn missing_dependencies_are_downloaded_and_unpacked() {
    let archive = redis_archive();
    let server = serve_repository(&archive, &compute_digest(&archive)).await;
    let chart_dir = tempfile::tempdir().unwrap();
    write_chart(
        chart_dir.path(),
        &format!(
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: \"^17.0.0\"\n    repository: {}/stable\n",
            server.uri()
        ),
    );

    let chart = LoadedChart::load(chart_dir.path()).unwrap();
    assert!(!chart.check_dependencies().unwrap().is_satisfied());

    let getter = HttpGetter::new(Duration::from_secs(10)).unwrap();
    let downloaded = getter.download_dependencies(&chart, &[]).await.unwrap();

    assert_eq!(downloaded, vec!["redis-17.1.0"]);
    assert!(chart_dir.path().join("charts/redis/Chart.yaml").is_file());
    assert!(chart.check_dependencies().unwrap().is_satisfied());
}

#[tokio::test]
async fn tampered_dependency_fails_integrity_check() {
    let archive = redis_archive();
    let server = serve_repository(&archive, "sha256:deadbeef").await;
    let chart_dir = tempfile::tempdir().unwrap();
    write_chart(
        chart_dir.path(),
        "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: 17.1.0\n    repository: \"@stable\"\n",
    );
    let known = vec![RepositoryEntry::new("stable", format!("{}/stable", server.uri()))];

    let chart = LoadedChart::load(chart_dir.path()).unwrap();
    let getter = HttpGetter::new(Duration::from_secs(10)).unwrap();
    let err = getter.download_dependencies(&chart, &known).await.unwrap_err();

    assert!(matches!(err, RepoError::IntegrityCheckFailed { .. }));
    assert!(!chart_dir.path().join("charts/redis").exists());
}
