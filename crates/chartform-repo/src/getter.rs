//! Fetching indexes and chart archives
//!
//! [`Getter`] is the seam between repository logic and the network. The
//! provided methods (chart download with digest verification, dependency
//! download) are written once on top of the two transport primitives.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use chartform_core::archive::expand_subchart_archives;
use chartform_core::{ChartDependency, LoadedChart, Settings};

use crate::config::{RepositoryEntry, RepositoryKind, write_atomic};
use crate::error::{RepoError, Result};
use crate::index::{ChartIndex, ChartVersion};

/// Transport for repository content
#[async_trait]
pub trait Getter: Send + Sync {
    /// Fetch and parse a repository's `index.yaml`
    async fn fetch_index(&self, repo: &RepositoryEntry) -> Result<ChartIndex>;

    /// Download raw bytes from an absolute URL or local path
    async fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Download a chart archive listed in `repo`'s index and verify its digest
    async fn download_chart(
        &self,
        repo: &RepositoryEntry,
        version: &ChartVersion,
    ) -> Result<Vec<u8>> {
        let url = version.download_url().ok_or_else(|| RepoError::ChartNotFound {
            name: format!("{}@{} (no download URL)", version.name, version.version),
            repo: repo.name.clone(),
        })?;
        let url = resolve_chart_url(&repo.url, url)?;

        tracing::debug!(
            chart = %version.name,
            version = %version.version,
            url = %url,
            "downloading chart"
        );
        let data = self.download(&url).await?;
        verify_digest(&version.name, version.digest.as_deref(), &data)?;
        Ok(data)
    }

    /// Download every dependency of `chart` missing from its `charts/`
    ///
    /// Each dependency is resolved against its repository's index (aliases
    /// such as `@stable` refer to `repositories`), downloaded, verified and
    /// unpacked into `charts/`. Returns `<name>-<version>` of each download.
    async fn download_dependencies(
        &self,
        chart: &LoadedChart,
        repositories: &[RepositoryEntry],
    ) -> Result<Vec<String>> {
        let status = chart.check_dependencies()?;
        if status.is_satisfied() {
            return Ok(Vec::new());
        }

        let mut downloaded = Vec::new();
        for dep in chart
            .metadata
            .dependencies
            .iter()
            .filter(|d| status.missing.contains(&d.name))
        {
            let repo = dependency_repository(dep, repositories)?;
            let index = self.fetch_index(&repo).await?;
            let version = index.resolve(&repo.name, &dep.name, Some(dep.version.as_str()))?;
            let data = self.download_chart(&repo, version).await?;

            let archive: PathBuf = chart
                .charts_dir
                .join(format!("{}-{}.tgz", version.name, version.version));
            write_atomic(&archive, &data)?;

            tracing::info!(
                chart = %chart.name(),
                dependency = %version.name,
                version = %version.version,
                "downloaded dependency"
            );
            downloaded.push(format!("{}-{}", version.name, version.version));
        }

        expand_subchart_archives(&chart.charts_dir)?;
        Ok(downloaded)
    }
}

/// Repository a dependency is fetched from
fn dependency_repository(
    dep: &ChartDependency,
    repositories: &[RepositoryEntry],
) -> Result<RepositoryEntry> {
    let reference = dep.repository.trim();

    if reference.is_empty() {
        return Err(RepoError::UnresolvableDependency {
            name: dep.name.clone(),
            reason: "no repository declared in Chart.yaml".to_string(),
        });
    }

    if let Some(alias) = reference.strip_prefix('@').or_else(|| reference.strip_prefix("alias:")) {
        return repositories
            .iter()
            .find(|r| r.name == alias)
            .cloned()
            .ok_or_else(|| RepoError::RepositoryNotFound {
                name: alias.to_string(),
            });
    }

    let normalized = reference.trim_end_matches('/');
    if let Some(known) = repositories
        .iter()
        .find(|r| r.url.trim_end_matches('/') == normalized)
    {
        return Ok(known.clone());
    }

    let entry = RepositoryEntry::new(dep.name.clone(), reference);
    entry.kind().map_err(|e| RepoError::UnresolvableDependency {
        name: dep.name.clone(),
        reason: e.to_string(),
    })?;
    Ok(entry)
}

/// Resolve a chart URL from an index against the repository URL
///
/// Index URLs may be absolute or relative to the repository.
pub fn resolve_chart_url(repo_url: &str, chart_url: &str) -> Result<String> {
    if url::Url::parse(chart_url).is_ok() || std::path::Path::new(chart_url).is_absolute() {
        return Ok(chart_url.to_string());
    }

    match RepositoryKind::detect(repo_url)? {
        RepositoryKind::Http => {
            let base = url::Url::parse(&format!("{}/", repo_url.trim_end_matches('/')))?;
            Ok(base.join(chart_url)?.to_string())
        }
        RepositoryKind::File => Ok(local_path(repo_url)?.join(chart_url).display().to_string()),
    }
}

/// Filesystem path behind a `file://` URL or plain path
fn local_path(url: &str) -> Result<PathBuf> {
    if url.starts_with("file://") {
        url::Url::parse(url)?
            .to_file_path()
            .map_err(|_| RepoError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: "not a local file URL".to_string(),
            })
    } else {
        Ok(PathBuf::from(url))
    }
}

/// Compute SHA256 digest of data
pub fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check if two digests match (with or without a `sha256:` prefix)
fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |d: &str| {
        d.trim()
            .to_lowercase()
            .replace("sha256:", "")
            .replace("sha256-", "")
    };
    normalize(expected) == normalize(actual)
}

/// Verify an archive against the digest published in the index, if any
pub fn verify_digest(name: &str, expected: Option<&str>, data: &[u8]) -> Result<()> {
    let Some(expected) = expected.filter(|d| !d.trim().is_empty()) else {
        return Ok(());
    };

    let actual = compute_digest(data);
    if digest_matches(expected, &actual) {
        Ok(())
    } else {
        Err(RepoError::IntegrityCheckFailed {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// HTTP(S) and local filesystem transport
#[derive(Debug, Clone)]
pub struct HttpGetter {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpGetter {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chartform/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self { client, timeout })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.fetch_timeout)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                RepoError::Timeout {
                    timeout: self.timeout,
                }
            } else {
                RepoError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RepoError::NetworkError {
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn read_local(&self, url: &str) -> Result<Vec<u8>> {
        let path = local_path(url)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| RepoError::filesystem(path, e))
    }
}

#[async_trait]
impl Getter for HttpGetter {
    async fn fetch_index(&self, repo: &RepositoryEntry) -> Result<ChartIndex> {
        let bytes = match repo.kind()? {
            RepositoryKind::Http => self.get_bytes(&repo.index_url()).await?,
            RepositoryKind::File => self.read_local(&repo.index_url()).await?,
        };
        ChartIndex::from_bytes(&bytes)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.get_bytes(url).await
        } else {
            self.read_local(url).await
        }
    }
}
