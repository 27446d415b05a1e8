//! In-memory getter for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::RepositoryEntry;
use crate::error::{RepoError, Result};
use crate::getter::Getter;
use crate::index::{ChartIndex, ChartVersion};

#[derive(Default)]
pub(crate) struct FakeGetter {
    indexes: HashMap<String, ChartIndex>,
    failing: HashMap<String, String>,
    delay: Option<Duration>,
    repo_delays: HashMap<String, Duration>,
    fetched: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
}

impl FakeGetter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_repo(mut self, url: &str, charts: &[&str]) -> Self {
        let mut index = ChartIndex::default();
        for chart in charts {
            index.add_entry(ChartVersion {
                name: chart.to_string(),
                version: "0.1.0".to_string(),
                urls: vec![format!("{}-0.1.0.tgz", chart)],
                ..Default::default()
            });
        }
        self.indexes.insert(url.to_string(), index);
        self
    }

    pub(crate) fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.failing.insert(url.to_string(), reason.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only fetches of `url`, overriding [`Self::with_delay`]
    pub(crate) fn with_repo_delay(mut self, url: &str, delay: Duration) -> Self {
        self.repo_delays.insert(url.to_string(), delay);
        self
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Repository names in the order their fetches finished
    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Getter for FakeGetter {
    async fn fetch_index(&self, repo: &RepositoryEntry) -> Result<ChartIndex> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(repo.name.clone());
        }
        if let Some(delay) = self.repo_delays.get(&repo.url).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(repo.name.clone());
        }
        if let Some(reason) = self.failing.get(&repo.url) {
            return Err(RepoError::NetworkError {
                message: reason.clone(),
            });
        }
        self.indexes.get(&repo.url).cloned().ok_or_else(|| RepoError::HttpError {
            status: 404,
            message: format!("no index at {}", repo.url),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        Err(RepoError::HttpError {
            status: 404,
            message: format!("nothing to download at {}", url),
        })
    }
}
