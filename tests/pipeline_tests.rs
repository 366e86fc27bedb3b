//! End-to-end collection against an in-memory HTTP stub
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ps3_update_collector_lib::application::{dedup_exact, OutcomeClass, UpdateCollector};
use ps3_update_collector_lib::domain::catalog::fields;
use ps3_update_collector_lib::infrastructure::config::AppConfig;
use ps3_update_collector_lib::infrastructure::http_client::{HttpFetcher, HttpReply, TransportError};
use ps3_update_collector_lib::{RawEntry, UpdateKind};

const HOST: &str = "http://np.test";

/// Fixed status/body per URL, 404 for anything else; every call is recorded
#[derive(Default)]
struct StubFetcher {
    routes: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(url.to_string(), (status, body.to_string()));
        self
    }

    fn manifest(self, id: &str, status: u16, body: &str) -> Self {
        let url = manifest_url(id);
        self.route(&url, status, body)
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpFetcher for StubFetcher {
    async fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(match self.routes.get(url) {
            Some((status, body)) => HttpReply::new(*status, body.as_bytes()),
            None => HttpReply::new(404, Vec::new()),
        })
    }
}

fn manifest_url(id: &str) -> String {
    format!("{HOST}/tpl/np/{id}/{id}-ver.xml")
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.manifest.host = HOST.to_string();
    config.fetch.workers = 4;
    config.fetch.max_attempts = 3;
    config.fetch.backoff_base = 1.0;
    config.fetch.backoff_unit_ms = 1;
    config.fetch.jitter_max_ms = 0;
    config
}

fn entry(title: &str, disc_id: &str) -> RawEntry {
    RawEntry::from_fields([(fields::TITLE, title), (fields::DISC_ID, disc_id)])
}

const ABCD_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<titlepatch titleid="ABCD12345">
  <tag name="ABCD12345_T2">
    <package version="01.00" size="100" sha1sum="a1" url="http://cdn.test/ABCD12345-A0100.pkg"/>
    <package version="01.10" size="200" sha1sum="b2" url="http://cdn.test/ABCD12345-A0110.pkg"/>
    <url url="http://cdn.test/free/ABCD12345-A0100.pkg"/>
  </tag>
</titlepatch>"#;

#[tokio::test]
async fn declared_id_needs_no_link_lookup() {
    let fetcher = Arc::new(StubFetcher::default().manifest("BLUS30443", 200, ABCD_MANIFEST));
    let collector = UpdateCollector::new(fetcher.clone(), &config()).unwrap();

    let catalog = vec![entry("Game", "blus30443").with_nfo("http://catalog.test/nfo/1")];
    let report = collector.collect(catalog).await;

    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].title_id.as_ref().unwrap().as_str(), "BLUS30443");
    assert_eq!(fetcher.calls_to("http://catalog.test/nfo/1"), 0);
    assert_eq!(fetcher.total_calls(), 1);
    assert_eq!(report.resolution.declared, 1);
}

#[tokio::test]
async fn separator_noise_resolves_without_fallback() {
    let fetcher = Arc::new(StubFetcher::default());
    let collector = UpdateCollector::new(fetcher.clone(), &config()).unwrap();

    let catalog = vec![entry("Game", "bces-98765").with_nfo("http://catalog.test/nfo/2")];
    let report = collector.collect(catalog).await;

    assert_eq!(report.merged[0].title_id.as_ref().unwrap().as_str(), "BCES98765");
    assert_eq!(fetcher.calls_to(&manifest_url("BCES98765")), 1);
    assert_eq!(fetcher.calls_to("http://catalog.test/nfo/2"), 0);
    // original column value is untouched in the output
    assert_eq!(report.merged[0].entry.declared_id(), Some("bces-98765"));
}

#[tokio::test]
async fn manifest_with_two_packages_and_one_unlocked_variant() {
    let fetcher = Arc::new(StubFetcher::default().manifest("ABCD12345", 200, ABCD_MANIFEST));
    let collector = UpdateCollector::new(fetcher, &config()).unwrap();

    let report = collector.collect(vec![entry("Game", "ABCD12345")]).await;
    let updates = &report.merged[0].updates;

    let summary: Vec<(UpdateKind, Option<&str>)> =
        updates.iter().map(|u| (u.kind, u.version.as_deref())).collect();
    assert_eq!(
        summary,
        vec![
            (UpdateKind::Primary, Some("01.00")),
            (UpdateKind::Primary, Some("01.10")),
            (UpdateKind::Secondary, Some("01.00")),
        ]
    );
    assert_eq!(updates[0].size_bytes, Some(100));
    assert_eq!(updates[2].filename, "ABCD12345-A0100.pkg");
    assert_eq!(report.outcome_count(OutcomeClass::Fetched), 1);
}

#[tokio::test]
async fn persistent_503_exhausts_retries_and_run_completes() {
    let fetcher = Arc::new(
        StubFetcher::default()
            .manifest("WXYZ00001", 503, "")
            .manifest("BLUS30443", 200, ABCD_MANIFEST),
    );
    let collector = UpdateCollector::new(fetcher.clone(), &config()).unwrap();

    let catalog = vec![
        entry("First", "WXYZ00001"),
        entry("Second", "wxyz-00001"),
        entry("Healthy", "BLUS30443"),
    ];
    let report = collector.collect(catalog).await;

    assert_eq!(fetcher.calls_to(&manifest_url("WXYZ00001")), 3);
    assert_eq!(report.merged.len(), 3);
    let failing: Vec<_> = report
        .merged
        .iter()
        .filter(|m| m.title_id.as_ref().map(|id| id.as_str()) == Some("WXYZ00001"))
        .collect();
    assert_eq!(failing.len(), 2);
    assert!(failing.iter().all(|m| m.updates.is_empty()));

    assert_eq!(report.outcome_count(OutcomeClass::Failed), 1);
    assert_eq!(report.status_counts.get(Some(503)), 1);
    assert_eq!(report.status_counts.get(Some(200)), 1);
}

#[tokio::test]
async fn malformed_manifest_gives_empty_list() {
    let fetcher = Arc::new(
        StubFetcher::default().manifest("NPUB30001", 200, "<titlepatch><package version=\"01.00\""),
    );
    let collector = UpdateCollector::new(fetcher, &config()).unwrap();

    let report = collector.collect(vec![entry("Broken", "NPUB30001")]).await;
    assert!(report.merged[0].updates.is_empty());
    // still a successful fetch, just nothing usable in it
    assert_eq!(report.outcome_count(OutcomeClass::Fetched), 1);
}

#[tokio::test]
async fn shared_title_gets_identical_lists_and_duplicates_collapse() {
    let fetcher = Arc::new(StubFetcher::default().manifest("ABCD12345", 200, ABCD_MANIFEST));
    let collector = UpdateCollector::new(fetcher.clone(), &config()).unwrap();

    let catalog = vec![
        entry("Disc", "ABCD12345"),
        entry("Disc (rerelease)", "ABCD12345"),
        entry("Disc", "ABCD12345"),
    ];
    let report = collector.collect(catalog).await;

    assert_eq!(fetcher.calls_to(&manifest_url("ABCD12345")), 1);
    assert_eq!(report.merged.len(), 2);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(
        serde_json::to_string(&report.merged[0].updates).unwrap(),
        serde_json::to_string(&report.merged[1].updates).unwrap()
    );

    let again = dedup_exact(report.merged.clone());
    assert_eq!(again, report.merged);
}

#[tokio::test]
async fn shared_link_page_fetched_once() {
    let nfo = "http://catalog.test/nfo/shared";
    let fetcher = Arc::new(
        StubFetcher::default()
            .route(nfo, 200, "<pre>Title ID: BLES01234</pre>")
            .manifest("BLES01234", 200, ABCD_MANIFEST),
    );
    let collector = UpdateCollector::new(fetcher.clone(), &config()).unwrap();

    let catalog = vec![
        entry("Part 1", "").with_nfo(nfo),
        entry("Part 2", "").with_nfo(nfo),
        entry("Part 3", "???").with_nfo(nfo),
    ];
    let report = collector.collect(catalog).await;

    assert_eq!(fetcher.calls_to(nfo), 1);
    assert_eq!(report.resolution.links, 3);
    assert_eq!(report.resolution.with_links, 3);
    assert_eq!(report.unique_titles, 1);
    assert!(report.merged.iter().all(|m| m.updates.len() == 3));
}

#[tokio::test]
async fn merged_output_keeps_catalog_fields_plus_updates() {
    let fetcher = Arc::new(StubFetcher::default().manifest("ABCD12345", 200, ABCD_MANIFEST));
    let collector = UpdateCollector::new(fetcher, &config()).unwrap();

    let catalog = vec![
        RawEntry::from_fields([
            (fields::TITLE, "Game"),
            (fields::REGION, "USA"),
            (fields::DISC_ID, "ABCD12345"),
        ])
        .with_row_links(vec!["http://catalog.test/info/1".into()]),
        entry("Lost", ""),
    ];
    let report = collector.collect(catalog).await;

    let json = serde_json::to_value(&report.merged).unwrap();
    let first = &json[0];
    assert_eq!(first["REGION"], "USA");
    assert_eq!(first["ROW_LINKS"][0], "http://catalog.test/info/1");
    assert_eq!(first["updates"][0]["type"], "NPDRM");
    assert_eq!(first["updates"][2]["type"], "DRM-Free");

    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].display_title(), "Lost");
}

#[test]
fn invalid_configuration_fails_before_work() {
    let mut bad = config();
    bad.fetch.max_attempts = 0;
    assert!(UpdateCollector::new(Arc::new(StubFetcher::default()), &bad).is_err());
    assert!(UpdateCollector::from_config(&config()).is_ok());
}
