//! Catalog listing crawler
//!
//! Walks the paginated listing, one page at a time with a polite randomized
//! delay, and turns every table row into a [`RawEntry`]. A page that cannot
//! be fetched or parsed contributes nothing; the walk continues.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;

use super::config::CatalogConfig;
use super::http_client::{fetch_with_policy, HttpFetcher};
use super::parsing::{CatalogParser, ParseContext, ParsingResult};
use super::retry_policy::RetryPolicy;
use crate::domain::catalog::RawEntry;

pub struct CatalogScraper<F: HttpFetcher + ?Sized> {
    fetcher: Arc<F>,
    parser: CatalogParser,
    config: CatalogConfig,
    policy: RetryPolicy,
}

impl<F: HttpFetcher + ?Sized> CatalogScraper<F> {
    pub fn new(fetcher: Arc<F>, config: CatalogConfig, policy: RetryPolicy) -> ParsingResult<Self> {
        Ok(Self {
            fetcher,
            parser: CatalogParser::new()?,
            config,
            policy,
        })
    }

    pub fn page_url(&self, page: u32) -> String {
        self.config
            .page_url_template
            .replace("{page}", &page.to_string())
    }

    /// Pages `start_page..=total_pages`, in order
    pub async fn scrape_all(&self) -> Vec<RawEntry> {
        let pages = self.config.start_page..=self.config.total_pages;
        info!(
            "🌐 Scraping catalog pages {}..={}",
            self.config.start_page, self.config.total_pages
        );

        let mut entries = Vec::new();
        for page in pages {
            let page_entries = self.scrape_page(page).await;
            info!("📄 Page {}: {} entries", page, page_entries.len());
            entries.extend(page_entries);

            if page < self.config.total_pages {
                sleep(self.polite_delay()).await;
            }
        }

        info!("✅ Catalog scrape finished: {} entries", entries.len());
        entries
    }

    pub async fn scrape_page(&self, page: u32) -> Vec<RawEntry> {
        let url = self.page_url(page);
        let base_url = match Url::parse(&url) {
            Ok(base_url) => base_url,
            Err(e) => {
                error!("Invalid catalog page URL {}: {}", url, e);
                return Vec::new();
            }
        };

        let fetched = fetch_with_policy(self.fetcher.as_ref(), &url, &self.policy).await;
        let Some(body) = fetched.ok_body() else {
            error!(
                "❌ Failed to fetch catalog page {} (status {:?})",
                page,
                fetched.status()
            );
            return Vec::new();
        };

        let html = String::from_utf8_lossy(body);
        match self.parser.parse_page(&html, &ParseContext::new(page, base_url)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not parse catalog page {}: {}", page, e);
                Vec::new()
            }
        }
    }

    fn polite_delay(&self) -> Duration {
        let jitter = if self.config.page_delay_jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=self.config.page_delay_jitter_ms)
        };
        Duration::from_millis(self.config.page_delay_ms + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fields;
    use crate::infrastructure::http_client::testing::ScriptedFetcher;

    const PAGE: &str = r#"<table>
        <tr><th>EX</th><th>ID</th><th>REGION</th><th>TITLE</th><th>FOLDER</th><th>DISC ID</th>
            <th>NFO</th><th>RELEASED</th><th>STREET</th><th>NUKE</th><th>SIZE</th><th>TYPE</th></tr>
        <tr><td></td><td>1</td><td>USA</td><td>Game</td><td>GAME</td><td>blus30443</td>
            <td><a href="/nfo/1">nfo</a></td><td></td><td></td><td></td><td></td><td></td></tr>
    </table>"#;

    fn config(total_pages: u32) -> CatalogConfig {
        CatalogConfig {
            page_url_template: "https://catalog.test/list?page={page}".to_string(),
            start_page: 1,
            total_pages,
            page_delay_ms: 0,
            page_delay_jitter_ms: 0,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            backoff_base: 1.0,
            backoff_unit_ms: 1,
            jitter_max_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .reply("https://catalog.test/list?page=1", 200, PAGE)
                .reply("https://catalog.test/list?page=2", 500, "")
                .reply("https://catalog.test/list?page=3", 200, PAGE),
        );
        let scraper = CatalogScraper::new(fetcher.clone(), config(3), policy()).unwrap();

        let entries = scraper.scrape_all().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].field(fields::DISC_ID), Some("BLUS30443"));
        assert_eq!(entries[0].nfo(), Some("https://catalog.test/nfo/1"));
        // retryable status retried up to the ceiling
        assert_eq!(fetcher.calls_to("https://catalog.test/list?page=2"), 2);
    }

    #[test]
    fn test_page_url_template() {
        let scraper =
            CatalogScraper::new(Arc::new(ScriptedFetcher::new()), config(41), policy()).unwrap();
        assert_eq!(scraper.page_url(7), "https://catalog.test/list?page=7");
    }
}
