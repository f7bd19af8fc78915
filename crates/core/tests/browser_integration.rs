//! Integration tests that drive a real Chromium. Run with
//! `cargo test -- --ignored` on a machine with a browser installed.

use torvet::browser::NavigationOutcome;
use torvet::{BrowserSession, Error, LaunchConfig};

async fn launch() -> BrowserSession {
    BrowserSession::launch(LaunchConfig::default())
        .await
        .expect("Failed to launch browser")
}

#[tokio::test]
#[ignore]
async fn duplicate_page_id_rejected() {
    let browser = launch().await;
    browser
        .create_page("p1")
        .await
        .expect("Failed to create first page");
    let second = browser.create_page("p1").await;
    assert!(matches!(second, Err(Error::DuplicatePage(_))));
    browser.kill().await.expect("Failed to kill browser");
}

#[tokio::test]
#[ignore]
async fn page_id_reusable_after_close() {
    let browser = launch().await;
    let page = browser
        .create_page("p1")
        .await
        .expect("Failed to create page");
    page.close().await.expect("Failed to close page");
    browser
        .create_page("p1")
        .await
        .expect("Failed to reuse id after close");
    browser.kill().await.expect("Failed to kill browser");
}

#[tokio::test]
#[ignore]
async fn restart_preserves_page_identity() {
    let browser = launch().await;
    let page = browser
        .create_page("survivor")
        .await
        .expect("Failed to create page");
    browser.restart().await.expect("Failed to restart browser");

    let found = browser.page_by_id("survivor").await;
    assert!(found.is_some(), "page id lost across restart");

    // The pre-restart handle must still work through the swap cell.
    let outcome = page.navigate("about:blank").await;
    assert_eq!(outcome, NavigationOutcome::Arrived);
    let (width, height) = page.inner_size().await.expect("Failed to read viewport");
    assert!(width > 0 && height > 0);
    browser.kill().await.expect("Failed to kill browser");
}

#[tokio::test]
#[ignore]
async fn unresolvable_host_aborts_immediately() {
    let browser = launch().await;
    let page = browser
        .create_page("p1")
        .await
        .expect("Failed to create page");
    let outcome = page
        .navigate("https://definitely-not-a-real-host.invalid/")
        .await;
    assert_eq!(outcome, NavigationOutcome::Unresolvable);
    browser.kill().await.expect("Failed to kill browser");
}
