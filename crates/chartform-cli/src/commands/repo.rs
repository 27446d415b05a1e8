//! Repository management commands

use console::style;
use std::sync::Arc;

use chartform_core::Settings;
use chartform_repo::{
    AddOutcome, HttpGetter, IndexRefresher, Registry, RepositoryEntry, RepositoryFile,
};

use crate::error::{CliError, Result};

/// Register a repository
pub async fn add(settings: &Settings, name: &str, url: &str) -> Result<()> {
    let registry = Registry::new(settings, Arc::new(HttpGetter::from_settings(settings)?));

    match registry.add(RepositoryEntry::new(name, url)).await? {
        AddOutcome::Added => println!("\"{}\" has been added to your repositories", name),
        AddOutcome::AlreadyRegistered => {
            println!("\"{}\" already exists with the same configuration, skipping", name)
        }
        AddOutcome::Replaced { previous_url } => {
            println!("\"{}\" has been updated ({} -> {})", name, previous_url, url)
        }
    }

    Ok(())
}

/// Refresh every repository index
pub async fn update(settings: &Settings) -> Result<()> {
    let refresher = IndexRefresher::new(settings, Arc::new(HttpGetter::from_settings(settings)?));

    println!("Hang tight while we grab the latest from your chart repositories...");
    let report = refresher.refresh_report().await?;

    for name in &report.refreshed {
        println!(
            "...Successfully got an update from the \"{}\" chart repository",
            name
        );
    }
    for failure in &report.failures {
        eprintln!(
            "{} Unable to get an update from the \"{}\" chart repository ({}): {}",
            style("✗").red().bold(),
            failure.name,
            failure.url,
            failure.reason
        );
    }

    if report.is_complete() {
        println!("Update Complete.");
        Ok(())
    } else {
        Err(CliError::UpdateIncomplete {
            failed: report.failures.len(),
            total: report.failures.len() + report.refreshed.len(),
        })
    }
}

/// List registered repositories
pub fn list(settings: &Settings) -> Result<()> {
    let repositories = RepositoryFile::load(&settings.repository_config)?.repositories;

    if repositories.is_empty() {
        println!("No repositories configured.");
        println!();
        println!("Add one with: chartform repo add <name> <url>");
        return Ok(());
    }

    println!("{:<20} {}", "NAME", "URL");
    for repo in &repositories {
        println!("{:<20} {}", repo.name, repo.url);
    }

    Ok(())
}
