// torvet-core: headless-browser crawling engine for Danish commercial
// property listings.
//
// The browser layer wraps chromiumoxide behind stable session/page handles
// that survive process restarts; the crawl layer drives the two-phase
// index -> listing pipeline and hands ordered records to a tabular sink.

pub mod browser;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod record;
pub mod sink;

pub use browser::{BrowserSession, LaunchConfig, PageSession, ProxyConfig};
pub use crawl::{CrawlTarget, Crawler, ListingCategory, PageDriver};
pub use error::{Error, Result};
pub use record::{ListingRecord, RecordTable};
pub use sink::{CsvSink, MemorySink, RecordSink};
