//! Concurrent index refresh
//!
//! One fetch runs per configured repository and every fetch completes before
//! the refresh returns. A failing repository never aborts the others: each
//! outcome is collected into a [`RefreshReport`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chartform_core::Settings;
use futures::future::join_all;

use crate::cache::IndexCache;
use crate::config::{RepositoryEntry, RepositoryFile};
use crate::error::{RepoError, Result};
use crate::getter::Getter;

/// A repository whose index could not be refreshed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub name: String,
    pub url: String,
    pub reason: String,
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.url, self.reason)
    }
}

/// Outcome of refreshing a set of repositories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Repositories whose index was fetched and cached
    pub refreshed: Vec<String>,

    /// Repositories that failed, with the reason
    pub failures: Vec<RefreshFailure>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct IndexRefresher {
    config_path: PathBuf,
    cache: IndexCache,
    fetch_timeout: Duration,
    getter: Arc<dyn Getter>,
}

impl IndexRefresher {
    pub fn new(settings: &Settings, getter: Arc<dyn Getter>) -> Self {
        Self {
            config_path: settings.repository_config.clone(),
            cache: IndexCache::new(&settings.repository_cache),
            fetch_timeout: settings.fetch_timeout,
            getter,
        }
    }

    /// Refresh every configured repository, failing if any one failed
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let report = self.refresh_report().await?;
        if report.is_complete() {
            Ok(report)
        } else {
            Err(RepoError::IndexRefreshFailed {
                failures: report.failures,
            })
        }
    }

    /// Refresh every configured repository, reporting failures per repository
    pub async fn refresh_report(&self) -> Result<RefreshReport> {
        let entries = RepositoryFile::load(&self.config_path)?.repositories;
        if entries.is_empty() {
            return Err(RepoError::NoRepositoriesConfigured);
        }
        Ok(self.refresh(&entries).await)
    }

    /// Refresh the given repositories concurrently
    pub async fn refresh(&self, entries: &[RepositoryEntry]) -> RefreshReport {
        let results = join_all(entries.iter().map(|entry| self.refresh_one(entry))).await;

        let mut report = RefreshReport::default();
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(()) => report.refreshed.push(entry.name.clone()),
                Err(e) => {
                    tracing::warn!(
                        repo = %entry.name,
                        url = %entry.url,
                        error = %e,
                        "failed to refresh repository index"
                    );
                    report.failures.push(RefreshFailure {
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            refreshed = report.refreshed.len(),
            failed = report.failures.len(),
            "repository refresh finished"
        );
        report
    }

    async fn refresh_one(&self, entry: &RepositoryEntry) -> Result<()> {
        let index = tokio::time::timeout(self.fetch_timeout, self.getter.fetch_index(entry))
            .await
            .map_err(|_| RepoError::Timeout {
                timeout: self.fetch_timeout,
            })??;
        self.cache.store(&entry.name, &index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGetter;

    fn write_repositories(settings: &Settings, entries: &[(&str, &str)]) {
        let mut file = RepositoryFile::default();
        for (name, url) in entries {
            file.upsert(RepositoryEntry::new(*name, *url));
        }
        file.save(&settings.repository_config).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_repository_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_home(dir.path());
        write_repositories(
            &settings,
            &[
                ("x", "https://x.example"),
                ("y", "https://y.example"),
                ("z", "https://z.example"),
            ],
        );
        let getter = Arc::new(
            FakeGetter::new()
                .with_repo("https://x.example", &["a"])
                .with_repo("https://y.example", &["b"])
                .with_repo("https://z.example", &["c"])
                .with_repo_delay("https://x.example", Duration::from_millis(30))
                .with_repo_delay("https://z.example", Duration::from_millis(15)),
        );

        let refresher = IndexRefresher::new(&settings, getter.clone());
        let report = refresher.refresh_all().await.unwrap();

        // Fetches finish out of order; the report keeps configuration order
        assert_eq!(getter.fetched(), vec!["x", "y", "z"]);
        assert_eq!(getter.completed(), vec!["y", "z", "x"]);
        assert_eq!(report.refreshed, vec!["x", "y", "z"]);
        for name in ["x", "y", "z"] {
            assert!(settings.index_cache_path(name).exists());
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_without_aborting_others() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_home(dir.path());
        write_repositories(
            &settings,
            &[
                ("x", "https://x.example"),
                ("y", "https://y.example"),
                ("z", "https://z.example"),
            ],
        );
        let getter = Arc::new(
            FakeGetter::new()
                .with_repo("https://x.example", &["a"])
                .with_failure("https://y.example", "connection refused")
                .with_repo("https://z.example", &["c"]),
        );
        let refresher = IndexRefresher::new(&settings, getter);

        let report = refresher.refresh_report().await.unwrap();
        assert_eq!(report.refreshed, vec!["x", "z"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "y");
        assert!(settings.index_cache_path("z").exists());

        let err = refresher.refresh_all().await.unwrap_err();
        match err {
            RepoError::IndexRefreshFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].reason.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_repositories_configured() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_home(dir.path());
        let refresher = IndexRefresher::new(&settings, Arc::new(FakeGetter::new()));

        assert!(matches!(
            refresher.refresh_all().await,
            Err(RepoError::NoRepositoriesConfigured)
        ));

        write_repositories(&settings, &[]);
        assert!(matches!(
            refresher.refresh_all().await,
            Err(RepoError::NoRepositoriesConfigured)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_repository_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            fetch_timeout: Duration::from_millis(250),
            ..Settings::with_home(dir.path())
        };
        let getter = Arc::new(
            FakeGetter::new()
                .with_repo("https://slow.example", &["a"])
                .with_delay(Duration::from_secs(10)),
        );
        let refresher = IndexRefresher::new(&settings, getter);

        let report = refresher
            .refresh(&[RepositoryEntry::new("slow", "https://slow.example")])
            .await;

        assert!(report.refreshed.is_empty());
        assert_eq!(report.failures[0].reason, "Request timeout after 250ms");
    }
}
