//! Manifest fetch scheduler
//!
//! One task per distinct title ID, at most `workers` of them in flight
//! (semaphore-gated). A task fetches the manifest with retry, parses it and
//! reports a [`FetchOutcome`]; nothing a task does can fail another task.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::domain::identifier::TitleId;
use crate::domain::update::UpdateRecord;
use crate::infrastructure::http_client::{fetch_with_policy, FinalResponse, HttpFetcher};
use crate::infrastructure::manifest_url::ManifestUrlBuilder;
use crate::infrastructure::parsing::parse_manifest;
use crate::infrastructure::retry_policy::{RetryPolicy, StatusClass};

/// How a title's fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutcomeClass {
    /// 200 with a body; the manifest was parsed (possibly to nothing)
    Fetched,
    /// 403/404, an unexpected status, or an empty 200
    NoManifest,
    /// Retries exhausted, or the task itself died
    Failed,
}

impl fmt::Display for OutcomeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetched => f.write_str("fetched"),
            Self::NoManifest => f.write_str("no-manifest"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Result for one title ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub title_id: TitleId,
    pub updates: Vec<UpdateRecord>,
    /// Last HTTP status; `None` when the last attempt never got a response
    pub http_status: Option<u16>,
    pub class: OutcomeClass,
    pub attempts: u32,
}

impl FetchOutcome {
    fn failed(title_id: TitleId) -> Self {
        Self {
            title_id,
            updates: Vec::new(),
            http_status: None,
            class: OutcomeClass::Failed,
            attempts: 0,
        }
    }
}

/// Progress event sent after each title finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    pub title_id: TitleId,
    pub class: OutcomeClass,
    pub http_status: Option<u16>,
    pub update_count: usize,
    pub completed: usize,
    pub total: usize,
}

/// HTTP status histogram; transport failures count under `ERR`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub by_status: BTreeMap<u16, usize>,
    pub errors: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: Option<u16>) {
        match status {
            Some(status) => *self.by_status.entry(status).or_default() += 1,
            None => self.errors += 1,
        }
    }

    pub fn get(&self, status: Option<u16>) -> usize {
        match status {
            Some(status) => self.by_status.get(&status).copied().unwrap_or(0),
            None => self.errors,
        }
    }

    pub fn total(&self) -> usize {
        self.by_status.values().sum::<usize>() + self.errors
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .by_status
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect();
        if self.errors > 0 {
            parts.push(format!("ERR={}", self.errors));
        }
        f.write_str(&parts.join(", "))
    }
}

pub struct FetchScheduler<F: HttpFetcher + ?Sized> {
    fetcher: Arc<F>,
    urls: ManifestUrlBuilder,
    policy: RetryPolicy,
    workers: usize,
    progress: Option<mpsc::UnboundedSender<FetchProgress>>,
}

impl<F: HttpFetcher + ?Sized + 'static> FetchScheduler<F> {
    pub fn new(fetcher: Arc<F>, urls: ManifestUrlBuilder, policy: RetryPolicy, workers: usize) -> Self {
        Self {
            fetcher,
            urls,
            policy,
            workers: workers.max(1),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<FetchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Fetch every distinct ID once. The result has exactly one outcome per distinct ID.
    pub async fn fetch_all(&self, ids: &[TitleId]) -> HashMap<TitleId, FetchOutcome> {
        let mut seen = HashSet::new();
        let unique: Vec<TitleId> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        let total = unique.len();

        info!("🚀 Fetching manifests for {} titles ({} workers)", total, self.workers);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for id in &unique {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let policy = self.policy.clone();
            let url = self.urls.build(id);
            let id = id.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return FetchOutcome::failed(id);
                };
                fetch_one(fetcher.as_ref(), id, &url, &policy).await
            });
        }

        let mut outcomes: HashMap<TitleId, FetchOutcome> = HashMap::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    self.report(&outcome, outcomes.len() + 1, total);
                    outcomes.insert(outcome.title_id.clone(), outcome);
                }
                Err(e) => error!("Manifest task aborted: {}", e),
            }
        }

        // 태스크가 중단된 ID는 실패로 기록
        for id in unique {
            if !outcomes.contains_key(&id) {
                let outcome = FetchOutcome::failed(id.clone());
                self.report(&outcome, outcomes.len() + 1, total);
                outcomes.insert(id, outcome);
            }
        }

        outcomes
    }

    fn report(&self, outcome: &FetchOutcome, completed: usize, total: usize) {
        debug!(
            "[{}/{}] {} -> {} ({:?}, {} updates)",
            completed,
            total,
            outcome.title_id,
            outcome.class,
            outcome.http_status,
            outcome.updates.len()
        );
        if let Some(sender) = &self.progress {
            // receiver may be gone; progress is best effort
            let _ = sender.send(FetchProgress {
                title_id: outcome.title_id.clone(),
                class: outcome.class,
                http_status: outcome.http_status,
                update_count: outcome.updates.len(),
                completed,
                total,
            });
        }
    }
}

/// Fetch, classify and parse one manifest
pub async fn fetch_one<F>(fetcher: &F, title_id: TitleId, url: &str, policy: &RetryPolicy) -> FetchOutcome
where
    F: HttpFetcher + ?Sized,
{
    let fetched = fetch_with_policy(fetcher, url, policy).await;
    let attempts = fetched.attempts;

    let (class, http_status, updates) = match fetched.last {
        FinalResponse::Reply(reply) => match StatusClass::of(reply.status) {
            StatusClass::Success if !reply.body.is_empty() => {
                (OutcomeClass::Fetched, Some(reply.status), parse_manifest(&reply.body))
            }
            StatusClass::Retryable => (OutcomeClass::Failed, Some(reply.status), Vec::new()),
            _ => (OutcomeClass::NoManifest, Some(reply.status), Vec::new()),
        },
        FinalResponse::Transport(_) => (OutcomeClass::Failed, None, Vec::new()),
    };

    FetchOutcome {
        title_id,
        updates,
        http_status,
        class,
        attempts,
    }
}
