//! chartform repository management
//!
//! This crate owns everything that touches chart repositories:
//!
//! - **Repository file**: the shared `repositories.yaml`, only ever rewritten
//!   under an advisory file lock ([`with_lock`])
//! - **Registry**: idempotent, reachability-checked registration
//! - **Refresher**: concurrent index refresh with per-repository results
//! - **Getter**: HTTP and local transports, digest-verified chart and
//!   dependency downloads
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chartform_core::Settings;
//! use chartform_repo::{HttpGetter, IndexRefresher, Registry, RepositoryEntry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let getter = Arc::new(HttpGetter::from_settings(&settings)?);
//!
//! Registry::new(&settings, getter.clone())
//!     .add(RepositoryEntry::new("linkerd", "https://helm.linkerd.io/stable"))
//!     .await?;
//! IndexRefresher::new(&settings, getter).refresh_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod getter;
pub mod index;
pub mod lock;
pub mod refresh;
pub mod registry;

#[cfg(test)]
mod testing;

pub use cache::IndexCache;
pub use config::{RepositoryEntry, RepositoryFile, RepositoryKind};
pub use error::{RepoError, Result};
pub use getter::{Getter, HttpGetter};
pub use index::{ChartIndex, ChartVersion};
pub use lock::{FileLock, LockOptions, with_lock};
pub use refresh::{IndexRefresher, RefreshFailure, RefreshReport};
pub use registry::{AddOutcome, Registry};
