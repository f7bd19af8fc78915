use std::time::Duration;

use serde::Serialize;

use crate::extract::{collect_links_snippet, listing_sections_snippet};

const SALE_INDEX_URL: &str = "https://www.ejendomstorvet.dk/ledigelokaler/koeb";
const LEASE_INDEX_URL: &str = "https://www.ejendomstorvet.dk/ledigelokaler/leje";

const COOKIE_CONSENT_SELECTOR: &str = "#cc_div > #cm > #c-inr > #c-bns > #c-p-bn";
const LOAD_MORE_SELECTOR: &str = ".results__next > .results__nexttext";
const LINK_CONTAINER_SELECTOR: &str = ".propcontainer";

/// Which index produced a link. Decides the economy shape of the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingCategory {
    Sale,
    Lease,
}

impl std::fmt::Display for ListingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingCategory::Sale => f.write_str("sale"),
            ListingCategory::Lease => f.write_str("lease"),
        }
    }
}

/// Everything site-specific about one crawl: where the index lives, which
/// controls to click, and the extraction snippets to ship into pages.
/// The orchestrator itself stays free of selectors.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    pub category: ListingCategory,
    pub index_url: String,
    pub cookie_consent_selector: String,
    pub load_more_selector: String,
    pub links_snippet: String,
    pub listing_snippet: String,
    /// Pause after navigation and after each click on the index page.
    pub settle_delay: Duration,
}

impl CrawlTarget {
    fn for_category(category: ListingCategory, index_url: &str) -> Self {
        Self {
            category,
            index_url: index_url.to_string(),
            cookie_consent_selector: COOKIE_CONSENT_SELECTOR.to_string(),
            load_more_selector: LOAD_MORE_SELECTOR.to_string(),
            links_snippet: collect_links_snippet(LINK_CONTAINER_SELECTOR),
            listing_snippet: listing_sections_snippet(),
            settle_delay: Duration::from_secs(10),
        }
    }

    /// Properties for sale.
    pub fn sale() -> Self {
        Self::for_category(ListingCategory::Sale, SALE_INDEX_URL)
    }

    /// Properties for lease.
    pub fn lease() -> Self {
        Self::for_category(ListingCategory::Lease, LEASE_INDEX_URL)
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}
