use async_trait::async_trait;
use serde_json::Value;

use crate::browser::{ClickOutcome, NavigationOutcome, PageSession};
use crate::error::Result;

/// The page operations the crawl needs, pulled out as a seam so the
/// orchestrator runs against scripted pages in tests.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Full navigation including the render-stability wait on success.
    async fn navigate(&self, url: &str) -> NavigationOutcome;
    async fn element_exists(&self, selector: &str) -> bool;
    async fn click(&self, selector: &str) -> ClickOutcome;
    /// Runs an extraction snippet and returns its decoded JSON value.
    async fn extract(&self, snippet: &str) -> Result<Value>;
    async fn bring_to_front(&self) -> Result<()>;
}

#[async_trait]
impl PageDriver for PageSession {
    async fn navigate(&self, url: &str) -> NavigationOutcome {
        PageSession::navigate(self, url).await
    }

    async fn element_exists(&self, selector: &str) -> bool {
        PageSession::element_exists(self, selector).await
    }

    async fn click(&self, selector: &str) -> ClickOutcome {
        PageSession::click(self, selector).await
    }

    async fn extract(&self, snippet: &str) -> Result<Value> {
        self.evaluate(snippet).await
    }

    async fn bring_to_front(&self) -> Result<()> {
        PageSession::bring_to_front(self).await
    }
}
