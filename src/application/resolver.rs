//! Title ID resolution
//!
//! Each catalog entry is mapped to at most one title ID, trying in order:
//! 1. the declared `DISC_ID` column, normalized
//! 2. ID-shaped tokens in `FOLDER`, then `TITLE`
//! 3. ID-shaped tokens in the text of the entry's links (NFO first)
//!
//! Link texts are cached per URL, misses included, so a page shared by many
//! rows is fetched once. Resolution runs on a single task; the cache is
//! plain owned state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::catalog::{fields, RawEntry};
use crate::domain::identifier::{scan_title_ids, TitleId};
use crate::infrastructure::http_client::{fetch_with_policy, HttpFetcher};
use crate::infrastructure::retry_policy::RetryPolicy;

/// Which step produced the title ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionSource {
    Declared,
    Fields,
    Links,
}

/// Per-source resolution counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub declared: usize,
    pub fields: usize,
    pub links: usize,
    pub unresolved: usize,
    /// Entries carrying an NFO or row link, resolved or not
    pub with_links: usize,
}

impl ResolutionStats {
    pub fn resolved(&self) -> usize {
        self.declared + self.fields + self.links
    }

    fn record(&mut self, source: Option<ResolutionSource>) {
        match source {
            Some(ResolutionSource::Declared) => self.declared += 1,
            Some(ResolutionSource::Fields) => self.fields += 1,
            Some(ResolutionSource::Links) => self.links += 1,
            None => self.unresolved += 1,
        }
    }
}

/// Step 1: the declared column, if it normalizes to a valid ID
pub fn declared_title_id(entry: &RawEntry) -> Option<TitleId> {
    entry.declared_id().and_then(TitleId::normalize)
}

/// Step 2: first ID-shaped token in FOLDER, then TITLE
pub fn title_id_from_fields(entry: &RawEntry) -> Option<TitleId> {
    [fields::FOLDER, fields::TITLE]
        .iter()
        .filter_map(|name| entry.field(name))
        .find_map(|value| scan_title_ids(value).into_iter().next())
}

pub struct TitleIdResolver<F: HttpFetcher + ?Sized> {
    fetcher: Arc<F>,
    policy: RetryPolicy,
    /// URL → candidates found in its text (empty on miss or failure)
    link_cache: HashMap<String, Vec<TitleId>>,
    stats: ResolutionStats,
}

impl<F: HttpFetcher + ?Sized> TitleIdResolver<F> {
    pub fn new(fetcher: Arc<F>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
            link_cache: HashMap::new(),
            stats: ResolutionStats::default(),
        }
    }

    pub async fn resolve(&mut self, entry: &RawEntry) -> Option<TitleId> {
        self.resolve_with_source(entry).await.map(|(id, _)| id)
    }

    pub async fn resolve_with_source(
        &mut self,
        entry: &RawEntry,
    ) -> Option<(TitleId, ResolutionSource)> {
        if entry.has_links() {
            self.stats.with_links += 1;
        }

        let resolved = if let Some(id) = declared_title_id(entry) {
            Some((id, ResolutionSource::Declared))
        } else if let Some(id) = title_id_from_fields(entry) {
            Some((id, ResolutionSource::Fields))
        } else {
            self.resolve_from_links(entry)
                .await
                .map(|id| (id, ResolutionSource::Links))
        };

        self.stats.record(resolved.as_ref().map(|(_, source)| *source));
        resolved
    }

    async fn resolve_from_links(&mut self, entry: &RawEntry) -> Option<TitleId> {
        for link in entry.supplemental_links() {
            let candidates = self.link_candidates(link).await;
            if let Some(first) = candidates.first() {
                return Some(first.clone());
            }
        }
        None
    }

    async fn link_candidates(&mut self, url: &str) -> &[TitleId] {
        if !self.link_cache.contains_key(url) {
            let fetched = fetch_with_policy(self.fetcher.as_ref(), url, &self.policy).await;
            let candidates = match fetched.ok_body() {
                Some(body) => scan_title_ids(&String::from_utf8_lossy(body)),
                None => {
                    debug!("No text from {} (status {:?})", url, fetched.status());
                    Vec::new()
                }
            };
            self.link_cache.insert(url.to_string(), candidates);
        }
        self.link_cache
            .get(url)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    /// Number of distinct link URLs looked up so far
    pub fn cached_links(&self) -> usize {
        self.link_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::testing::ScriptedFetcher;
    use crate::infrastructure::http_client::TransportError;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            backoff_base: 1.0,
            backoff_unit_ms: 1,
            jitter_max_ms: 0,
        }
    }

    fn resolver(fetcher: ScriptedFetcher) -> (Arc<ScriptedFetcher>, TitleIdResolver<ScriptedFetcher>) {
        let fetcher = Arc::new(fetcher);
        let resolver = TitleIdResolver::new(fetcher.clone(), policy());
        (fetcher, resolver)
    }

    #[tokio::test]
    async fn test_declared_id_wins_without_fetching() {
        let (fetcher, mut resolver) = resolver(ScriptedFetcher::new());
        let entry = RawEntry::from_fields([(fields::DISC_ID, "bles00001"), (fields::FOLDER, "BLUS30443")])
            .with_nfo("https://site/nfo/1");

        let resolved = resolver.resolve_with_source(&entry).await;
        assert_eq!(
            resolved,
            Some((TitleId::parse("BLES00001").unwrap(), ResolutionSource::Declared))
        );
        assert!(fetcher.calls().is_empty());
        assert_eq!(resolver.stats().declared, 1);
        assert_eq!(resolver.stats().with_links, 1);
    }

    #[tokio::test]
    async fn test_separator_noise_in_declared_id() {
        let (_, mut resolver) = resolver(ScriptedFetcher::new());
        let entry = RawEntry::from_fields([(fields::DISC_ID, "bces-98765")]);
        assert_eq!(
            resolver.resolve(&entry).await,
            Some(TitleId::parse("BCES98765").unwrap())
        );
    }

    #[tokio::test]
    async fn test_folder_before_title() {
        let (_, mut resolver) = resolver(ScriptedFetcher::new());
        let entry = RawEntry::from_fields([
            (fields::DISC_ID, "N/A"),
            (fields::TITLE, "Game [BLES00002]"),
            (fields::FOLDER, "game_blus30443_fix"),
        ]);
        // word boundary: underscores are word characters
        assert_eq!(
            resolver.resolve_with_source(&entry).await,
            Some((TitleId::parse("BLES00002").unwrap(), ResolutionSource::Fields))
        );

        let entry = RawEntry::from_fields([(fields::FOLDER, "blus30443 - Game")]);
        assert_eq!(
            resolver.resolve(&entry).await,
            Some(TitleId::parse("BLUS30443").unwrap())
        );
    }

    #[tokio::test]
    async fn test_links_are_tried_in_order_and_cached() {
        let fetcher = ScriptedFetcher::new()
            .reply("https://site/nfo/1", 404, "")
            .reply("https://site/info/1", 200, "Disc: npub-31234 / BLUS30443");
        let (fetcher, mut resolver) = resolver(fetcher);

        let entry = RawEntry::from_fields([(fields::TITLE, "Unknown")])
            .with_nfo("https://site/nfo/1")
            .with_row_links(vec!["https://site/nfo/1".into(), "https://site/info/1".into()]);

        for _ in 0..3 {
            assert_eq!(
                resolver.resolve_with_source(&entry).await,
                Some((TitleId::parse("BLUS30443").unwrap(), ResolutionSource::Links))
            );
        }
        assert_eq!(fetcher.calls_to("https://site/nfo/1"), 1);
        assert_eq!(fetcher.calls_to("https://site/info/1"), 1);
        assert_eq!(resolver.cached_links(), 2);
        assert_eq!(resolver.stats().links, 3);
    }

    #[tokio::test]
    async fn test_failed_link_is_cached_as_miss() {
        let fetcher = ScriptedFetcher::new().script(
            "https://site/down",
            vec![Err(TransportError::Connect("refused".into()))],
        );
        let (fetcher, mut resolver) = resolver(fetcher);
        let entry = RawEntry::from_fields([(fields::TITLE, "Nothing here")]).with_nfo("https://site/down");

        assert_eq!(resolver.resolve(&entry).await, None);
        assert_eq!(resolver.resolve(&entry).await, None);

        // one retried lookup, then served from the cache
        assert_eq!(fetcher.calls_to("https://site/down"), 2);
        let stats = resolver.stats();
        assert_eq!(stats.unresolved, 2);
        assert_eq!(stats.resolved(), 0);
        assert_eq!(stats.with_links, 2);
    }
}
