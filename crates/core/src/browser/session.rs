use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EventAuthRequired, EventRequestPaused,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, ClearBrowserCookiesParams, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::config::LaunchConfig;
use super::page::{PageSession, PageState, DEFAULT_NAVIGATION_TIMEOUT};

/// Flags that keep a headless Chromium quiet and hard to fingerprint.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-dev-shm-usage",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-hang-monitor",
];

/// A live browser process plus the task draining its CDP event stream.
struct BrowserHandle {
    browser: Browser,
    event_task: JoinHandle<()>,
}

pub(crate) struct BrowserState {
    driver: Mutex<BrowserHandle>,
    pages: Mutex<HashMap<String, PageSession>>,
    config: LaunchConfig,
    /// Serializes restarts. Concurrent navigation ladders that both give
    /// up queue here instead of racing to relaunch.
    restart_gate: Mutex<()>,
}

impl BrowserState {
    pub(crate) async fn forget_page(&self, id: &str) {
        self.pages.lock().await.remove(id);
    }
}

/// One Chromium process and the registry of tabs opened in it.
///
/// Cloning shares the process; the last clone to be dropped does not kill
/// it, call [`BrowserSession::kill`] for deterministic teardown.
#[derive(Clone)]
pub struct BrowserSession {
    state: Arc<BrowserState>,
}

impl BrowserSession {
    /// Launches a fresh browser process. The only operation in this module
    /// that surfaces an error to construction-time callers.
    pub async fn launch(config: LaunchConfig) -> Result<Self> {
        let handle = launch_driver(&config).await?;
        info!(target: "torvet.browser", headless = config.headless, "browser launched");
        Ok(Self {
            state: Arc::new(BrowserState {
                driver: Mutex::new(handle),
                pages: Mutex::new(HashMap::new()),
                config,
                restart_gate: Mutex::new(()),
            }),
        })
    }

    /// Opens a tab under a caller-chosen id with the default navigation
    /// timeout. Ids must be unique for the life of the session.
    pub async fn create_page(&self, id: &str) -> Result<PageSession> {
        self.create_page_with_timeout(id, DEFAULT_NAVIGATION_TIMEOUT)
            .await
    }

    /// As [`Self::create_page`] with an explicit per-page navigation
    /// timeout. The timeout sticks to the logical page across restarts.
    pub async fn create_page_with_timeout(
        &self,
        id: &str,
        nav_timeout: Duration,
    ) -> Result<PageSession> {
        if self.state.pages.lock().await.contains_key(id) {
            return Err(Error::DuplicatePage(id.to_string()));
        }

        let page = open_raw_page(&self.state).await?;

        let state = Arc::new(PageState {
            id: id.to_string(),
            handle: tokio::sync::RwLock::new(page),
            nav_timeout,
            listener_tasks: Mutex::new(Vec::new()),
        });
        let session = PageSession {
            state,
            parent: Arc::downgrade(&self.state),
        };
        apply_page_config(&session, &self.state.config).await?;

        // The map was unlocked while the tab opened, so re-check before
        // registering.
        let mut pages = self.state.pages.lock().await;
        if pages.contains_key(id) {
            let mut tasks = session.state.listener_tasks.lock().await;
            for task in tasks.drain(..) {
                task.abort();
            }
            drop(tasks);
            let page = session.handle().await;
            let _ = page.close().await;
            return Err(Error::DuplicatePage(id.to_string()));
        }
        pages.insert(id.to_string(), session.clone());
        debug!(target: "torvet.browser", page = id, "page created");
        Ok(session)
    }

    pub async fn page_by_id(&self, id: &str) -> Option<PageSession> {
        self.state.pages.lock().await.get(id).cloned()
    }

    pub async fn page_ids(&self) -> Vec<String> {
        self.state.pages.lock().await.keys().cloned().collect()
    }

    /// Replaces the browser process while keeping every logical page
    /// session valid. See [`restart_browser`].
    pub async fn restart(&self) -> Result<()> {
        restart_browser(&self.state).await
    }

    /// Drops all cookies held by the browser.
    pub async fn clear_cookies(&self) -> Result<()> {
        let sessions: Vec<PageSession> =
            self.state.pages.lock().await.values().cloned().collect();
        let Some(session) = sessions.first() else {
            return Ok(());
        };
        let page = session.handle().await;
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;
        Ok(())
    }

    /// Closes every registered tab, leaving the browser process running.
    pub async fn close_all(&self) -> Result<()> {
        let sessions: Vec<PageSession> = {
            let mut pages = self.state.pages.lock().await;
            pages.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            if let Err(err) = session.close().await {
                warn!(target: "torvet.browser", error = %err, "page close failed");
            }
        }
        Ok(())
    }

    /// Tears the browser process down. Tabs are closed first so Chromium
    /// exits cleanly rather than being orphaned.
    pub async fn kill(self) -> Result<()> {
        self.close_all().await?;
        let mut driver = self.state.driver.lock().await;
        close_driver(&mut driver).await;
        info!(target: "torvet.browser", "browser killed");
        Ok(())
    }
}

/// Relaunches the browser process and swaps a freshly configured tab into
/// every registered [`PageSession`]. Page ids and the sessions themselves
/// survive; only the underlying CDP targets change.
pub(crate) async fn restart_browser(state: &Arc<BrowserState>) -> Result<()> {
    let _gate = state.restart_gate.lock().await;
    info!(target: "torvet.browser", "restarting browser");

    {
        let mut driver = state.driver.lock().await;
        close_driver(&mut driver).await;
        *driver = launch_driver(&state.config).await?;
    }

    let sessions: Vec<PageSession> = state.pages.lock().await.values().cloned().collect();
    for session in sessions {
        let fresh = open_raw_page(state).await?;
        session.state.swap_handle(fresh).await;
        apply_page_config(&session, &state.config).await?;
        debug!(target: "torvet.browser", page = %session.id(), "page handle swapped after restart");
    }
    Ok(())
}

async fn launch_driver(config: &LaunchConfig) -> Result<BrowserHandle> {
    let mut builder = BrowserConfig::builder();
    if !config.headless {
        builder = builder.with_head();
    }
    builder = builder.args(STEALTH_ARGS.iter().copied());
    builder = builder.arg(format!("--lang={}", config.locale));
    if let Some(proxy) = &config.proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy.server));
    }
    let browser_config = builder.build().map_err(Error::Launch)?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| Error::Launch(e.to_string()))?;
    let event_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
    Ok(BrowserHandle {
        browser,
        event_task,
    })
}

async fn close_driver(driver: &mut BrowserHandle) {
    if let Err(err) = driver.browser.close().await {
        warn!(target: "torvet.browser", error = %err, "browser close failed");
    }
    if let Err(err) = driver.browser.wait().await {
        debug!(target: "torvet.browser", error = %err, "browser did not exit cleanly");
    }
    driver.event_task.abort();
}

async fn open_raw_page(state: &Arc<BrowserState>) -> Result<Page> {
    let driver = state.driver.lock().await;
    driver
        .browser
        .new_page("about:blank")
        .await
        .map_err(|e| Error::Cdp(e.to_string()))
}

/// Applies the launch config to a single tab: network instrumentation,
/// locale header, timezone emulation, download policy, dialog policy and
/// proxy authentication.
async fn apply_page_config(session: &PageSession, config: &LaunchConfig) -> Result<()> {
    let page = session.handle().await;

    page.execute(network::EnableParams::default())
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;

    let headers = Headers::new(serde_json::json!({
        "Accept-Language": config.locale.clone(),
    }));
    page.execute(SetExtraHttpHeadersParams::new(headers))
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;

    if let Some(timezone) = &config.timezone {
        page.execute(SetTimezoneOverrideParams {
            timezone_id: timezone.clone(),
        })
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;
    }

    if let Some(dir) = &config.download_dir {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.display().to_string())
            .build()
            .map_err(Error::Cdp)?;
        page.execute(params)
            .await
            .map_err(|e| Error::Cdp(e.to_string()))?;
    }

    spawn_dialog_handler(session, &page).await?;

    if let Some(proxy) = &config.proxy {
        if let Some((username, password)) = proxy.credentials() {
            spawn_proxy_auth(session, &page, username, password).await?;
        }
    }
    Ok(())
}

/// Accepts `beforeunload` prompts so navigation is never blocked, and
/// dismisses every other dialog kind.
async fn spawn_dialog_handler(session: &PageSession, page: &Page) -> Result<()> {
    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;
    let handle = page.clone();
    let page_id = session.id().to_string();
    let task = tokio::spawn(async move {
        while let Some(dialog) = dialogs.next().await {
            let accept = dialog.r#type == DialogType::Beforeunload;
            debug!(target: "torvet.browser", page = %page_id, kind = ?dialog.r#type, accept, "dialog answered");
            let _ = handle
                .execute(HandleJavaScriptDialogParams {
                    accept,
                    prompt_text: None,
                })
                .await;
        }
    });
    session.state.register_listener(task.abort_handle()).await;
    Ok(())
}

/// Answers proxy auth challenges with the configured credentials and lets
/// every other paused request continue untouched.
async fn spawn_proxy_auth(
    session: &PageSession,
    page: &Page,
    username: String,
    password: String,
) -> Result<()> {
    let mut auth_events = page
        .event_listener::<EventAuthRequired>()
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;
    let mut paused_events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| Error::Cdp(e.to_string()))?;

    page.execute(
        fetch::EnableParams::builder()
            .handle_auth_requests(true)
            .build(),
    )
    .await
    .map_err(|e| Error::Cdp(e.to_string()))?;

    let handle = page.clone();
    let auth_task = tokio::spawn(async move {
        while let Some(event) = auth_events.next().await {
            let response = AuthChallengeResponse {
                response: AuthChallengeResponseResponse::ProvideCredentials,
                username: Some(username.clone()),
                password: Some(password.clone()),
            };
            let _ = handle
                .execute(
                    ContinueWithAuthParams::new(event.request_id.clone(), response),
                )
                .await;
        }
    });
    let handle = page.clone();
    let continue_task = tokio::spawn(async move {
        while let Some(event) = paused_events.next().await {
            let _ = handle
                .execute(ContinueRequestParams::new(event.request_id.clone()))
                .await;
        }
    });
    session
        .state
        .register_listener(auth_task.abort_handle())
        .await;
    session
        .state
        .register_listener(continue_task.abort_handle())
        .await;
    Ok(())
}
