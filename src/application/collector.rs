//! End-to-end update collection
//!
//! resolve (serial) → group → fetch (parallel) → merge → dedup

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::aggregator::{dedup_exact, merge, TitleGroups};
use super::resolver::{ResolutionStats, TitleIdResolver};
use super::scheduler::{FetchProgress, FetchScheduler, OutcomeClass, StatusCounts};
use crate::domain::catalog::{MergedEntry, RawEntry};
use crate::infrastructure::config::{AppConfig, ConfigError};
use crate::infrastructure::http_client::{HttpClient, HttpFetcher};
use crate::infrastructure::manifest_url::ManifestUrlBuilder;
use crate::infrastructure::retry_policy::RetryPolicy;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client setup failed: {0}")]
    HttpSetup(String),
}

/// Everything a collection run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionReport {
    /// Resolved entries with their updates, exact duplicates removed
    pub merged: Vec<MergedEntry>,
    /// Entries no title ID could be found for; not part of `merged`
    pub unresolved: Vec<RawEntry>,
    pub resolution: ResolutionStats,
    pub status_counts: StatusCounts,
    pub outcome_counts: BTreeMap<OutcomeClass, usize>,
    pub unique_titles: usize,
    pub duplicates_removed: usize,
}

impl CollectionReport {
    pub fn total_updates(&self) -> usize {
        self.merged.iter().map(|entry| entry.updates.len()).sum()
    }

    pub fn outcome_count(&self, class: OutcomeClass) -> usize {
        self.outcome_counts.get(&class).copied().unwrap_or(0)
    }

    pub fn log_summary(&self) {
        let r = &self.resolution;
        info!(
            "🔎 Unique valid title IDs: {} (declared: {}, fields: {}, links: {}; unresolved: {}; rows with links: {})",
            self.unique_titles, r.declared, r.fields, r.links, r.unresolved, r.with_links
        );
        info!("📊 HTTP status counts: {}", self.status_counts);
        info!(
            "📦 Outcomes: fetched={}, no-manifest={}, failed={}",
            self.outcome_count(OutcomeClass::Fetched),
            self.outcome_count(OutcomeClass::NoManifest),
            self.outcome_count(OutcomeClass::Failed)
        );
        info!(
            "✅ {} records with {} total updates ({} duplicates removed)",
            self.merged.len(),
            self.total_updates(),
            self.duplicates_removed
        );
    }
}

pub struct UpdateCollector<F: HttpFetcher + ?Sized> {
    fetcher: Arc<F>,
    urls: ManifestUrlBuilder,
    policy: RetryPolicy,
    workers: usize,
    progress: Option<mpsc::UnboundedSender<FetchProgress>>,
}

impl UpdateCollector<HttpClient> {
    /// Collector backed by the real HTTP client
    pub fn from_config(config: &AppConfig) -> Result<Self, CollectorError> {
        let client = HttpClient::new(config.fetch.clone())
            .map_err(|e| CollectorError::HttpSetup(e.to_string()))?;
        Self::new(Arc::new(client), config)
    }
}

impl<F: HttpFetcher + ?Sized + 'static> UpdateCollector<F> {
    /// Validates the configuration before anything runs.
    pub fn new(fetcher: Arc<F>, config: &AppConfig) -> Result<Self, CollectorError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            urls: ManifestUrlBuilder::from_config(&config.manifest)?,
            policy: RetryPolicy::from(&config.fetch),
            workers: config.fetch.workers,
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<FetchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub async fn collect(&self, entries: Vec<RawEntry>) -> CollectionReport {
        let started = Instant::now();
        info!("🧭 Resolving title IDs for {} catalog entries", entries.len());

        let mut resolver = TitleIdResolver::new(Arc::clone(&self.fetcher), self.policy.clone());
        let mut groups = TitleGroups::new();
        let mut unresolved = Vec::new();
        for entry in entries {
            match resolver.resolve(&entry).await {
                Some(id) => groups.push(id, entry),
                None => unresolved.push(entry),
            }
        }
        let resolution = resolver.stats().clone();
        if !unresolved.is_empty() {
            warn!("⚠️ {} entries could not be resolved to a title ID", unresolved.len());
        }

        let mut scheduler = FetchScheduler::new(
            Arc::clone(&self.fetcher),
            self.urls.clone(),
            self.policy.clone(),
            self.workers,
        );
        if let Some(sender) = &self.progress {
            scheduler = scheduler.with_progress(sender.clone());
        }
        let ids = groups.ids();
        let outcomes = scheduler.fetch_all(&ids).await;

        let mut status_counts = StatusCounts::default();
        let mut outcome_counts = BTreeMap::new();
        for outcome in outcomes.values() {
            status_counts.record(outcome.http_status);
            *outcome_counts.entry(outcome.class).or_insert(0) += 1;
        }

        let merged = merge(groups, &outcomes);
        let before = merged.len();
        let merged = dedup_exact(merged);

        info!("⏱️ Collection finished in {:.1}s", started.elapsed().as_secs_f64());
        CollectionReport {
            duplicates_removed: before - merged.len(),
            merged,
            unresolved,
            resolution,
            status_counts,
            outcome_counts,
            unique_titles: ids.len(),
        }
    }
}
