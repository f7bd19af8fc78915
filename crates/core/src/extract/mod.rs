//! In-page extraction snippets and the pure text parsing applied to what
//! they return.
//!
//! The browser layer only ships JavaScript strings and decodes JSON; all
//! parsing of Danish-formatted free text happens here, outside the
//! automation layer, where it is unit-testable without a browser.

mod js;
mod listing;
mod text;

pub use js::{collect_links_snippet, listing_sections_snippet};
pub use listing::{RawListing, build_record};
pub use text::{flatten_lines, parse_amount, parse_decimal, split_address};
