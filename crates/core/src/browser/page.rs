use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, EventRequestWillBeSent, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::{BringToFrontParams, CaptureScreenshotFormat};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::session::{BrowserState, restart_browser};
use super::stability::{POLL_INTERVAL, RenderStability};

/// Upper bound on plain `goto` attempts before escalating to a browser
/// restart.
const NAVIGATION_ATTEMPTS: u32 = 10;

/// Quiet period granted to client-side rendering before HTML-length
/// sampling starts.
const RENDER_SETTLE: Duration = Duration::from_secs(15);

/// Polling budget for one [`PageSession::ensure_rendered`] call. The
/// clock starts after the settle period.
const RENDER_BUDGET: Duration = Duration::from_secs(60);

const ELEMENT_WAIT: Duration = Duration::from_secs(30);
const ELEMENT_POLL: Duration = Duration::from_millis(500);

/// Matches the very generous timeout the target site needs under load.
pub(crate) const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(600);

/// How a navigation request ended. Navigation never returns an `Err`; a
/// crawl decides per-URL what an unreachable page means for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The page committed a load for the requested URL.
    Arrived,
    /// DNS said the host does not exist. Retrying cannot help, so the
    /// ladder aborts on the first occurrence.
    Unresolvable,
    /// Every rung of the retry ladder failed, including the post-restart
    /// attempt.
    Exhausted,
}

/// How a best-effort click ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    /// No element matched the selector. Expected during load-more loops,
    /// where it terminates the loop.
    NotFound,
    /// The element was found but the click itself failed.
    Failed,
}

/// Document-level URLs observed while a navigation settled, in arrival
/// order. The first entry is the requested URL, the last is where the
/// page actually ended up.
#[derive(Debug, Default, Clone)]
pub struct RedirectCapture {
    pub chain: Vec<String>,
}

impl RedirectCapture {
    pub fn final_url(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }

    pub fn was_redirected(&self) -> bool {
        self.chain.len() > 1
    }
}

/// Per-tab state shared between the public handle and the owning
/// browser session.
pub(crate) struct PageState {
    pub(crate) id: String,
    /// Swap cell. A browser restart writes a fresh tab handle here while
    /// every outstanding [`PageSession`] keeps working unchanged.
    pub(crate) handle: RwLock<Page>,
    pub(crate) nav_timeout: Duration,
    /// Abort handles for the dialog and proxy-auth listener tasks bound
    /// to the current tab handle. Replaced on swap, aborted on close.
    pub(crate) listener_tasks: Mutex<Vec<AbortHandle>>,
}

impl PageState {
    pub(crate) async fn swap_handle(&self, fresh: Page) {
        let mut tasks = self.listener_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        *self.handle.write().await = fresh;
    }

    pub(crate) async fn register_listener(&self, task: AbortHandle) {
        self.listener_tasks.lock().await.push(task);
    }
}

/// Stable handle to one browser tab.
///
/// The identity of a `PageSession` is its string id, not the underlying
/// CDP target: a full browser restart replaces the tab out from under it
/// and the session stays valid. Cloning is cheap and clones observe the
/// same tab.
#[derive(Clone)]
pub struct PageSession {
    pub(crate) state: Arc<PageState>,
    pub(crate) parent: Weak<BrowserState>,
}

impl PageSession {
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// Snapshot of the current tab handle. Callers must not hold it across
    /// a restart; prefer the session methods, which re-read the cell on
    /// every call.
    pub(crate) async fn handle(&self) -> Page {
        self.state.handle.read().await.clone()
    }

    /// Navigates with the full retry ladder: at most [`NAVIGATION_ATTEMPTS`]
    /// attempts, each one a goto plus the render-stability wait. A failed
    /// attempt triggers a same-URL reload; a failed reload escalates to a
    /// full browser restart before the next attempt.
    pub async fn navigate(&self, url: &str) -> NavigationOutcome {
        navigation_ladder(self, url).await
    }

    async fn try_goto(&self, url: &str) -> GotoResult {
        let page = self.handle().await;
        match tokio::time::timeout(self.state.nav_timeout, page.goto(url)).await {
            Ok(Ok(_)) => GotoResult::Committed,
            Ok(Err(err)) => {
                let reason = err.to_string();
                if reason.contains("ERR_NAME_NOT_RESOLVED") {
                    GotoResult::HostUnresolvable
                } else {
                    GotoResult::Failed(reason)
                }
            }
            Err(_) => GotoResult::Failed(format!(
                "timed out after {}s",
                self.state.nav_timeout.as_secs()
            )),
        }
    }

    /// Navigates while recording the document-level redirect chain.
    ///
    /// The listener is armed before the navigation starts so the first
    /// request is never missed.
    pub async fn navigate_capturing_redirects(
        &self,
        url: &str,
    ) -> Result<(NavigationOutcome, RedirectCapture)> {
        let page = self.handle().await;
        let mut events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;

        let chain = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = chain.clone();
        let listener = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.r#type == Some(ResourceType::Document) {
                    if let Ok(mut urls) = sink.lock() {
                        urls.push(event.request.url.clone());
                    }
                }
            }
        });

        let outcome = self.navigate(url).await;
        // Late redirects land within the settle period of the load event.
        tokio::time::sleep(Duration::from_millis(250)).await;
        listener.abort();

        let chain = chain.lock().map(|urls| urls.clone()).unwrap_or_default();
        Ok((outcome, RedirectCapture { chain }))
    }

    /// Waits until the serialized document stops changing.
    ///
    /// Sleeps through the settle period first, then samples the HTML
    /// length once per second until three consecutive samples agree or
    /// the budget runs out. Always returns; a page that never settles is
    /// extracted as-is.
    pub async fn ensure_rendered(&self) {
        self.ensure_rendered_with_settle(RENDER_SETTLE).await;
    }

    pub async fn ensure_rendered_with_settle(&self, settle: Duration) {
        tokio::time::sleep(settle).await;

        let started = tokio::time::Instant::now();
        let mut tracker = RenderStability::new();
        while started.elapsed() < RENDER_BUDGET {
            let len = match self.content().await {
                Ok(html) => html.len(),
                Err(err) => {
                    debug!(target: "torvet.browser", page = %self.state.id, error = %err, "content sample failed");
                    0
                }
            };
            if tracker.observe(len) {
                debug!(target: "torvet.browser", page = %self.state.id, html_len = len, "render stabilized");
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        warn!(target: "torvet.browser", page = %self.state.id, "render did not stabilize within budget");
    }

    /// Clicks the first element matching `selector`, reporting rather
    /// than failing when it is absent.
    pub async fn click(&self, selector: &str) -> ClickOutcome {
        let page = self.handle().await;
        let element = match page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => {
                debug!(target: "torvet.browser", page = %self.state.id, selector, "click target not found");
                return ClickOutcome::NotFound;
            }
        };
        match element.click().await {
            Ok(_) => ClickOutcome::Clicked,
            Err(err) => {
                warn!(target: "torvet.browser", page = %self.state.id, selector, error = %err, "click failed");
                ClickOutcome::Failed
            }
        }
    }

    /// Double-clicks via two consecutive single clicks; the second click
    /// outcome wins so a vanishing element still reports `Clicked`.
    pub async fn double_click(&self, selector: &str) -> ClickOutcome {
        match self.click(selector).await {
            ClickOutcome::Clicked => match self.click(selector).await {
                ClickOutcome::NotFound => ClickOutcome::Clicked,
                outcome => outcome,
            },
            outcome => outcome,
        }
    }

    /// Clicks into an input and types the text. Best-effort like `click`.
    pub async fn fill_input(&self, selector: &str, text: &str) -> ClickOutcome {
        let page = self.handle().await;
        let element = match page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return ClickOutcome::NotFound,
        };
        let typed = async {
            element.click().await?;
            element.type_str(text).await
        };
        match typed.await {
            Ok(_) => ClickOutcome::Clicked,
            Err(err) => {
                warn!(target: "torvet.browser", page = %self.state.id, selector, error = %err, "fill failed");
                ClickOutcome::Failed
            }
        }
    }

    /// Scrolls the window by `offset` CSS pixels, positive meaning down.
    pub async fn scroll(&self, offset: i64) -> Result<()> {
        let page = self.handle().await;
        page.evaluate(format!("window.scrollBy(0, {offset})"))
            .await
            .map_err(|e| Error::Evaluate(e.to_string()))?;
        Ok(())
    }

    pub async fn element_exists(&self, selector: &str) -> bool {
        let page = self.handle().await;
        page.find_element(selector).await.is_ok()
    }

    /// Plain fixed delay, for sites where no observable signal exists.
    pub async fn wait_for(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Polls for an element until it appears or the wait budget elapses.
    pub async fn wait_for_element(&self, selector: &str) -> bool {
        let deadline = tokio::time::Instant::now() + ELEMENT_WAIT;
        loop {
            if self.element_exists(selector).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(ELEMENT_POLL).await;
        }
    }

    /// Evaluates a JavaScript expression and decodes its JSON result.
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let page = self.handle().await;
        let result = page
            .evaluate(expression)
            .await
            .map_err(|e| Error::Evaluate(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| Error::Evaluate(e.to_string()))
    }

    /// Serialized HTML of the current document.
    pub async fn content(&self) -> Result<String> {
        let page = self.handle().await;
        page.content().await.map_err(|e| Error::Cdp(e.to_string()))
    }

    pub async fn url(&self) -> Result<Option<String>> {
        let page = self.handle().await;
        page.url().await.map_err(|e| Error::Cdp(e.to_string()))
    }

    pub async fn bring_to_front(&self) -> Result<()> {
        let page = self.handle().await;
        page.execute(BringToFrontParams::default())
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;
        Ok(())
    }

    /// Current viewport size in CSS pixels.
    pub async fn inner_size(&self) -> Result<(u64, u64)> {
        self.evaluate("[window.innerWidth, window.innerHeight]")
            .await
    }

    /// Saves a PNG of the viewport under `dir` with a generated filename
    /// and returns the path.
    pub async fn screenshot(&self, dir: &Path) -> Result<PathBuf> {
        let name = format!("{}-{}.png", self.state.id, random_suffix());
        let path = dir.join(name);
        let page = self.handle().await;
        page.save_screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
            &path,
        )
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;
        Ok(path)
    }

    /// Saves a PNG of one element under `dir`, named like [`Self::screenshot`].
    pub async fn element_screenshot(&self, selector: &str, dir: &Path) -> Result<PathBuf> {
        let name = format!("{}-{}.png", self.state.id, random_suffix());
        let path = dir.join(name);
        let page = self.handle().await;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;
        element
            .save_screenshot(CaptureScreenshotFormat::Png, &path)
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;
        Ok(path)
    }

    /// Drops this tab's cookies plus local and session storage.
    pub async fn clear_storage(&self) -> Result<()> {
        let page = self.handle().await;
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;
        page.evaluate("localStorage.clear(); sessionStorage.clear();")
            .await
            .map_err(|e| Error::Evaluate(e.to_string()))?;
        Ok(())
    }

    /// Closes the tab and removes it from the owning session's registry.
    /// Storage is cleared first so a reused profile starts clean.
    pub async fn close(self) -> Result<()> {
        if let Err(err) = self.clear_storage().await {
            debug!(target: "torvet.browser", page = %self.state.id, error = %err, "storage clear on close failed");
        }
        if let Some(browser) = self.parent.upgrade() {
            browser.forget_page(&self.state.id).await;
        }
        let mut tasks = self.state.listener_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        drop(tasks);
        let page = self.handle().await;
        page.close().await.map_err(|e| Error::Cdp(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GotoResult {
    Committed,
    HostUnresolvable,
    Failed(String),
}

/// Primitive operations the navigation ladder is built on. Separated from
/// [`PageSession`] so the retry policy is testable without a browser.
pub(crate) trait NavigationBackend {
    /// One navigation attempt: goto plus the render-stability wait.
    async fn attempt(&self, url: &str) -> GotoResult;
    /// Same-URL reload between attempts. `false` when the reload failed.
    async fn reload(&self) -> bool;
    /// Browser-restart escalation. `false` when it was unavailable or
    /// failed; the ladder keeps counting attempts either way.
    async fn restart(&self) -> bool;
}

/// Runs the retry ladder: at most [`NAVIGATION_ATTEMPTS`] attempts total.
/// A failed attempt is followed by a reload; when the reload itself fails
/// the ladder escalates to a browser restart before the next attempt.
/// Unresolvable hosts abort on the first occurrence.
pub(crate) async fn navigation_ladder<B: NavigationBackend>(
    backend: &B,
    url: &str,
) -> NavigationOutcome {
    for attempt in 1..=NAVIGATION_ATTEMPTS {
        match backend.attempt(url).await {
            GotoResult::Committed => return NavigationOutcome::Arrived,
            GotoResult::HostUnresolvable => return NavigationOutcome::Unresolvable,
            GotoResult::Failed(_) => {
                if attempt < NAVIGATION_ATTEMPTS && !backend.reload().await {
                    backend.restart().await;
                }
            }
        }
    }
    NavigationOutcome::Exhausted
}

impl NavigationBackend for PageSession {
    async fn attempt(&self, url: &str) -> GotoResult {
        let result = self.try_goto(url).await;
        match &result {
            GotoResult::Committed => {
                debug!(target: "torvet.browser", page = %self.state.id, %url, "navigation committed");
                self.ensure_rendered().await;
            }
            GotoResult::HostUnresolvable => {
                warn!(target: "torvet.browser", page = %self.state.id, %url, "host does not resolve, giving up");
            }
            GotoResult::Failed(reason) => {
                warn!(target: "torvet.browser", page = %self.state.id, %url, %reason, "navigation attempt failed");
            }
        }
        result
    }

    async fn reload(&self) -> bool {
        let page = self.handle().await;
        match page.reload().await {
            Ok(_) => true,
            Err(err) => {
                debug!(target: "torvet.browser", page = %self.state.id, error = %err, "reload between attempts failed");
                false
            }
        }
    }

    async fn restart(&self) -> bool {
        let Some(browser) = self.parent.upgrade() else {
            return false;
        };
        warn!(target: "torvet.browser", page = %self.state.id, "restarting browser after failed reload");
        match restart_browser(&browser).await {
            Ok(_) => true,
            Err(err) => {
                warn!(target: "torvet.browser", error = %err, "browser restart failed");
                false
            }
        }
    }
}

fn random_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    // Nanosecond timestamp is unique enough for filenames within one run.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 ^ (d.as_secs() << 20))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Scripted ladder backend: fails until `succeed_on`, counts calls.
    #[derive(Default)]
    struct ScriptedBackend {
        succeed_on: u32,
        unresolvable: bool,
        reload_ok: bool,
        attempts: AtomicU32,
        reloads: AtomicU32,
        restarts: AtomicU32,
    }

    impl NavigationBackend for ScriptedBackend {
        async fn attempt(&self, _url: &str) -> GotoResult {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.unresolvable {
                GotoResult::HostUnresolvable
            } else if self.succeed_on != 0 && attempt >= self.succeed_on {
                GotoResult::Committed
            } else {
                GotoResult::Failed("net::ERR_CONNECTION_RESET".to_string())
            }
        }

        async fn reload(&self) -> bool {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            self.reload_ok
        }

        async fn restart(&self) -> bool {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn perpetual_failure_stops_at_the_attempt_cap() {
        let backend = ScriptedBackend {
            reload_ok: true,
            ..ScriptedBackend::default()
        };
        let outcome = navigation_ladder(&backend, "https://example.test/").await;
        assert_eq!(outcome, NavigationOutcome::Exhausted);
        assert_eq!(backend.attempts.load(Ordering::SeqCst), NAVIGATION_ATTEMPTS);
        // No reload after the final attempt.
        assert_eq!(
            backend.reloads.load(Ordering::SeqCst),
            NAVIGATION_ATTEMPTS - 1
        );
        assert_eq!(backend.restarts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_reload_escalates_to_restart() {
        let backend = ScriptedBackend::default();
        let outcome = navigation_ladder(&backend, "https://example.test/").await;
        assert_eq!(outcome, NavigationOutcome::Exhausted);
        assert_eq!(backend.attempts.load(Ordering::SeqCst), NAVIGATION_ATTEMPTS);
        assert_eq!(
            backend.restarts.load(Ordering::SeqCst),
            NAVIGATION_ATTEMPTS - 1
        );
    }

    #[tokio::test]
    async fn unresolvable_host_aborts_on_first_attempt() {
        let backend = ScriptedBackend {
            unresolvable: true,
            ..ScriptedBackend::default()
        };
        let outcome = navigation_ladder(&backend, "https://nope.invalid/").await;
        assert_eq!(outcome, NavigationOutcome::Unresolvable);
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(backend.reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn late_success_ends_the_ladder() {
        let backend = ScriptedBackend {
            succeed_on: 3,
            reload_ok: true,
            ..ScriptedBackend::default()
        };
        let outcome = navigation_ladder(&backend, "https://example.test/").await;
        assert_eq!(outcome, NavigationOutcome::Arrived);
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
    }
}
