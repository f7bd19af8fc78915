//! Browser process and page-tab lifecycle.
//!
//! [`BrowserSession`] owns one Chromium process and the tabs opened in it;
//! [`PageSession`] is the stable wrapper around a single tab. The wrapper
//! holds its technical handle in a swap cell so a full browser restart can
//! replace every handle without invalidating the logical sessions.

mod config;
mod page;
mod session;
mod stability;

pub use config::{LaunchConfig, ProxyConfig};
pub use page::{ClickOutcome, NavigationOutcome, PageSession, RedirectCapture};
pub use session::BrowserSession;
