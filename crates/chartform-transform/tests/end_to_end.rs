//! Full pipeline runs against a chart repository served over HTTP

use std::path::Path;
use std::time::Duration;

use chartform_core::Settings;
use chartform_core::archive::package_chart;
use chartform_repo::getter::compute_digest;
use chartform_transform::{SET_ARG, TransformError, TransformRequest, transform};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn mesh_archive() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "Chart.yaml",
        "apiVersion: v2\nname: mesh\nversion: 1.2.0\nappVersion: \"2.14\"\ndependencies:\n  - name: crds\n    version: \"^0.3.0\"\n    repository: \"@mesh\"\n    condition: crds.enabled\n",
    );
    write(
        root,
        "values.yaml",
        "controller:\n  replicas: 1\nenablePodDisruptionBudget: false\ncrds:\n  enabled: false\n",
    );
    write(
        root,
        "values-ha.yaml",
        "controller:\n  replicas: 3\nenablePodDisruptionBudget: true\n",
    );
    write(
        root,
        "templates/deployment.yaml",
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {{ release.name }}-controller\n  namespace: {{ release.namespace }}\nspec:\n  replicas: {{ values.controller.replicas }}\n",
    );
    write(
        root,
        "templates/pdb.yaml",
        "{% if values.enablePodDisruptionBudget -%}\napiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: {{ release.name }}-controller\nspec:\n  maxUnavailable: 1\n{% endif %}\n",
    );
    write(
        root,
        "templates/NOTES.txt",
        "{{ chart.name }} {{ chart.appVersion }} rendered for {{ release.name }}",
    );
    package_chart(root).unwrap()
}

fn crds_archive() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Chart.yaml", "apiVersion: v2\nname: crds\nversion: 0.3.1\n");
    write(
        dir.path(),
        "templates/crd.yaml",
        "apiVersion: apiextensions.k8s.io/v1\nkind: CustomResourceDefinition\nmetadata:\n  name: meshes.example.io\n",
    );
    package_chart(dir.path()).unwrap()
}

async fn serve_repository() -> MockServer {
    let mesh = mesh_archive();
    let crds = crds_archive();
    let index = format!(
        r#"apiVersion: v1
entries:
  mesh:
    - name: mesh
      version: 1.2.0
      appVersion: "2.14"
      digest: "{}"
      urls:
        - mesh-1.2.0.tgz
  crds:
    - name: crds
      version: 0.3.1
      digest: "{}"
      urls:
        - crds-0.3.1.tgz
"#,
        compute_digest(&mesh),
        compute_digest(&crds)
    );

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stable/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stable/mesh-1.2.0.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(mesh))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stable/crds-0.3.1.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(crds))
        .mount(&server)
        .await;
    server
}

fn settings(home: &Path) -> Settings {
    Settings {
        fetch_timeout: Duration::from_secs(10),
        dependency_update: true,
        ..Settings::with_home(home)
    }
}

fn request(server: &MockServer) -> TransformRequest {
    TransformRequest::new("mesh", "web", "mesh", format!("{}/stable", server.uri()))
        .with_namespace("mesh-system")
}

#[tokio::test]
async fn default_render() {
    let server = serve_repository().await;
    let home = tempfile::tempdir().unwrap();

    let result = transform(&settings(home.path()), &request(&server)).await.unwrap();

    insta::assert_snapshot!(result.manifest, @r"
    ---
    # Source: mesh/templates/deployment.yaml
    apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: web-controller
      namespace: mesh-system
    spec:
      replicas: 1
    ");
    assert_eq!(result.notes.as_deref(), Some("mesh 2.14 rendered for web"));
    assert!(home.path().join("repositories.yaml").is_file());
    assert!(home.path().join("repository/mesh-index.yaml").is_file());
}

#[tokio::test]
async fn high_availability_render() {
    let server = serve_repository().await;
    let home = tempfile::tempdir().unwrap();

    let result = transform(&settings(home.path()), &request(&server).with_high_availability(true))
        .await
        .unwrap();

    assert!(result.manifest.contains("replicas: 3"));
    assert!(result.manifest.contains("# Source: mesh/templates/pdb.yaml"));
    assert!(result.manifest.contains("kind: PodDisruptionBudget"));
}

#[tokio::test]
async fn explicit_overrides_beat_high_availability_values() {
    let server = serve_repository().await;
    let home = tempfile::tempdir().unwrap();
    let request = request(&server)
        .with_high_availability(true)
        .with_override(SET_ARG, "controller.replicas=5,crds.enabled=true");

    let result = transform(&settings(home.path()), &request).await.unwrap();

    assert!(result.manifest.contains("replicas: 5"));
    assert!(result.manifest.contains("# Source: mesh/charts/crds/templates/crd.yaml"));
}

#[tokio::test]
async fn malformed_override_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let err = transform(&settings(home.path()), &request(&server).with_override(SET_ARG, "a..b=1"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransformError::InvalidOverrideSyntax { .. }));
    assert!(!home.path().join("repositories.yaml").exists());
}

#[tokio::test]
async fn missing_dependencies_fail_without_update() {
    let server = serve_repository().await;
    let home = tempfile::tempdir().unwrap();
    let settings = Settings {
        dependency_update: false,
        ..settings(home.path())
    };

    let err = transform(&settings, &request(&server)).await.unwrap_err();

    match err {
        TransformError::UnsatisfiedDependencies { missing, chart, .. } => {
            assert_eq!(missing, vec!["crds"]);
            assert_eq!(chart, "mesh");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_chart_is_reported() {
    let server = serve_repository().await;
    let home = tempfile::tempdir().unwrap();
    let mut request = request(&server);
    request.chart_name = "gateway".to_string();

    let err = transform(&settings(home.path()), &request).await.unwrap_err();

    assert!(matches!(err, TransformError::ChartNotFound { ref chart, .. } if chart == "gateway"));
}

#[tokio::test]
async fn unreachable_repository_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let err = transform(&settings(home.path()), &request(&server)).await.unwrap_err();

    assert!(matches!(err, TransformError::RepositoryRegistrationFailed { .. }));
    assert_eq!(err.repo(), "mesh");
}
