//! The two-phase crawl: link discovery on a paginated index, then
//! sequential per-listing extraction on a shared page.

mod driver;
mod orchestrator;
mod target;

pub use driver::PageDriver;
pub use orchestrator::{Crawler, deliver};
pub use target::{CrawlTarget, ListingCategory};
