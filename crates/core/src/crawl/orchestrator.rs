use tracing::{debug, info, warn};

use crate::browser::{ClickOutcome, NavigationOutcome};
use crate::error::Result;
use crate::extract::{RawListing, build_record};
use crate::record::{ListingRecord, RecordTable};
use crate::sink::RecordSink;

use super::driver::PageDriver;
use super::target::CrawlTarget;

/// Hard cap on load-more rounds so a control that never disappears cannot
/// pin the crawl forever.
const MAX_LOAD_MORE_ROUNDS: u32 = 200;

/// Drives the two-phase crawl against one page: discover listing URLs
/// from the index, then visit each URL and extract one record.
///
/// Records come out in discovery order regardless of which extractions
/// succeeded; a page that yields nothing still produces a record with
/// absent fields, so downstream row counts match link counts.
pub struct Crawler<'a, D: PageDriver> {
    page: &'a D,
    target: CrawlTarget,
}

impl<'a, D: PageDriver> Crawler<'a, D> {
    pub fn new(page: &'a D, target: CrawlTarget) -> Self {
        Self { page, target }
    }

    /// Runs both phases and returns the ordered records. Never fails; a
    /// crawl that cannot discover anything produces an empty sequence.
    pub async fn run(&self) -> Vec<ListingRecord> {
        let links = self.discover_links().await;
        info!(target: "torvet", phase = "discover", category = %self.target.category, links = links.len(), "discovery finished");
        let records = self.extract_records(&links).await;
        info!(target: "torvet", phase = "extract", records = records.len(), "extraction finished");
        records
    }

    /// Phase one: open the index, dismiss cookie consent, exhaust the
    /// load-more control, then collect every listing URL in page order.
    /// Faults are absorbed; an unreachable or unreadable index yields no
    /// links rather than an error.
    pub async fn discover_links(&self) -> Vec<String> {
        if let Err(err) = self.page.bring_to_front().await {
            debug!(target: "torvet", error = %err, "bring_to_front failed");
        }
        match self.page.navigate(&self.target.index_url).await {
            NavigationOutcome::Arrived => {}
            outcome => {
                warn!(target: "torvet", url = %self.target.index_url, ?outcome, "index page unreachable");
                return Vec::new();
            }
        }
        self.settle().await;

        match self.page.click(&self.target.cookie_consent_selector).await {
            ClickOutcome::Clicked => {
                debug!(target: "torvet", "cookie consent dismissed");
                self.settle().await;
            }
            outcome => debug!(target: "torvet", ?outcome, "no cookie consent dialog"),
        }

        for round in 1..=MAX_LOAD_MORE_ROUNDS {
            if !self
                .page
                .element_exists(&self.target.load_more_selector)
                .await
            {
                break;
            }
            match self.page.click(&self.target.load_more_selector).await {
                ClickOutcome::Clicked => {
                    debug!(target: "torvet", round, "load-more clicked");
                    self.settle().await;
                }
                outcome => {
                    debug!(target: "torvet", round, ?outcome, "load-more click did not land");
                    break;
                }
            }
        }

        let value = match self.page.extract(&self.target.links_snippet).await {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "torvet", error = %err, "link extraction failed");
                return Vec::new();
            }
        };
        let links: Vec<String> = serde_json::from_value(value).unwrap_or_default();
        dedupe_preserving_order(links)
    }

    /// Phase two: visit every URL sequentially on the shared page. One
    /// record per URL, in input order; failed extraction yields a record
    /// with all fields absent rather than a gap.
    pub async fn extract_records(&self, links: &[String]) -> Vec<ListingRecord> {
        let mut records = Vec::with_capacity(links.len());
        for url in links {
            let raw = self.extract_listing(url).await;
            records.push(build_record(self.target.category, url, &raw));
        }
        records
    }

    async fn extract_listing(&self, url: &str) -> RawListing {
        match self.page.navigate(url).await {
            NavigationOutcome::Arrived => {}
            outcome => {
                warn!(target: "torvet", %url, ?outcome, "listing page unreachable");
                return RawListing::default();
            }
        }
        match self.page.extract(&self.target.listing_snippet).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(target: "torvet", %url, error = %err, "listing payload undecodable");
                RawListing::default()
            }),
            Err(err) => {
                warn!(target: "torvet", %url, error = %err, "listing extraction failed");
                RawListing::default()
            }
        }
    }

    async fn settle(&self) {
        tokio::time::sleep(self.target.settle_delay).await;
    }
}

/// Projects records into a table and hands it to the sink once.
pub async fn deliver(
    sink: &dyn RecordSink,
    destination: &str,
    records: &[ListingRecord],
) -> Result<()> {
    let table = RecordTable::from_records(records);
    sink.write(destination, &table).await
}

fn dedupe_preserving_order(links: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::record::Economy;
    use crate::sink::MemorySink;

    use super::*;

    /// Scripted page: serves a fixed link list, per-URL listing payloads,
    /// and a load-more control that disappears after N clicks.
    #[derive(Default)]
    struct ScriptedPage {
        links: Vec<String>,
        listings: HashMap<String, Value>,
        load_more_remaining: Mutex<u32>,
        current_url: Mutex<String>,
        unreachable: Vec<String>,
        extract_fails: bool,
        clicks: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageDriver for ScriptedPage {
        async fn navigate(&self, url: &str) -> NavigationOutcome {
            if self.unreachable.iter().any(|u| u == url) {
                return NavigationOutcome::Exhausted;
            }
            *self.current_url.lock().unwrap() = url.to_string();
            NavigationOutcome::Arrived
        }

        async fn element_exists(&self, selector: &str) -> bool {
            selector.contains("results__next") && *self.load_more_remaining.lock().unwrap() > 0
        }

        async fn click(&self, selector: &str) -> ClickOutcome {
            self.clicks.lock().unwrap().push(selector.to_string());
            if selector.contains("results__next") {
                let mut remaining = self.load_more_remaining.lock().unwrap();
                if *remaining == 0 {
                    return ClickOutcome::NotFound;
                }
                *remaining -= 1;
                return ClickOutcome::Clicked;
            }
            if selector.contains("c-p-bn") {
                return ClickOutcome::Clicked;
            }
            ClickOutcome::NotFound
        }

        async fn extract(&self, snippet: &str) -> Result<Value> {
            if self.extract_fails {
                return Err(crate::Error::Evaluate("target crashed".to_string()));
            }
            if snippet.contains("urls.push") {
                return Ok(json!(self.links));
            }
            let url = self.current_url.lock().unwrap().clone();
            Ok(self.listings.get(&url).cloned().unwrap_or(json!({})))
        }

        async fn bring_to_front(&self) -> Result<()> {
            Ok(())
        }
    }

    fn instant_target() -> CrawlTarget {
        CrawlTarget::lease()
            .with_index_url("https://example.test/index")
            .with_settle_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn records_preserve_discovery_order() {
        let page = ScriptedPage {
            links: vec![
                "https://example.test/a".to_string(),
                "https://example.test/b".to_string(),
                "https://example.test/c".to_string(),
            ],
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        let records = crawler.run().await;
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://example.test/a",
                "https://example.test/b",
                "https://example.test/c"
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_links_collapse_to_first_occurrence() {
        let page = ScriptedPage {
            links: vec![
                "https://example.test/a".to_string(),
                "https://example.test/b".to_string(),
                "https://example.test/a".to_string(),
            ],
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        let links = crawler.discover_links().await;
        assert_eq!(links.len(), 2);
    }

    #[tokio::test]
    async fn load_more_clicked_until_control_disappears() {
        let page = ScriptedPage {
            links: vec!["https://example.test/a".to_string()],
            load_more_remaining: Mutex::new(3),
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        crawler.discover_links().await;
        let clicks = page.clicks.lock().unwrap();
        let load_more_clicks = clicks.iter().filter(|s| s.contains("results__next")).count();
        assert_eq!(load_more_clicks, 3);
    }

    #[tokio::test]
    async fn unreachable_index_yields_no_links() {
        let page = ScriptedPage {
            unreachable: vec!["https://example.test/index".to_string()],
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        assert!(crawler.discover_links().await.is_empty());
    }

    #[tokio::test]
    async fn link_extraction_failure_is_absorbed() {
        let page = ScriptedPage {
            links: vec!["https://example.test/a".to_string()],
            extract_fails: true,
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        // A mid-crawl evaluation fault must not propagate; the run ends
        // with an empty record set instead.
        let records = crawler.run().await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn unreachable_listing_still_produces_a_record() {
        let page = ScriptedPage {
            links: vec![
                "https://example.test/gone".to_string(),
                "https://example.test/b".to_string(),
            ],
            unreachable: vec!["https://example.test/gone".to_string()],
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        let records = crawler.run().await;
        assert_eq!(records.len(), 2);
        assert!(records[0].address.is_empty());
    }

    #[tokio::test]
    async fn end_to_end_two_listings_parse_and_deliver() {
        let mut listings = HashMap::new();
        listings.insert(
            "https://example.test/a".to_string(),
            json!({
                "title": "Store Torv 1, 8000 Aarhus C",
                "economy": "Årlig leje 1.234.567,-\nÅrlige driftsudgifter 45.000,-",
                "area": "120 m²",
            }),
        );
        listings.insert(
            "https://example.test/b".to_string(),
            json!({
                "title": "Vestergade 9, 5000 Odense C",
                "economy": "Årlig leje 480.000,-",
            }),
        );
        let page = ScriptedPage {
            links: vec![
                "https://example.test/a".to_string(),
                "https://example.test/b".to_string(),
            ],
            load_more_remaining: Mutex::new(1),
            listings,
            ..ScriptedPage::default()
        };
        let crawler = Crawler::new(&page, instant_target());
        let records = crawler.run().await;
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].address, "Store Torv 1");
        assert_eq!(records[0].area_m2, Some(120));
        match &records[0].economy {
            Economy::Lease(lease) => {
                assert_eq!(lease.annual_lease, Some(1_234_567));
                assert_eq!(lease.annual_operating_costs, Some(45_000));
            }
            Economy::Sale(_) => panic!("expected lease economy"),
        }
        match &records[1].economy {
            Economy::Lease(lease) => {
                assert_eq!(lease.annual_lease, Some(480_000));
                assert_eq!(lease.annual_operating_costs, None);
            }
            Economy::Sale(_) => panic!("expected lease economy"),
        }

        let sink = MemorySink::new();
        deliver(&sink, "lease", &records).await.unwrap();
        let written = sink.take();
        assert_eq!(written[0].1.rows.len(), 2);
    }
}
