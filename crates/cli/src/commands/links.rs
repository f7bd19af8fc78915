use anyhow::Result;
use torvet::crawl::{CrawlTarget, Crawler};
use torvet::{BrowserSession, LaunchConfig};

/// Discovery phase only; prints one URL per line for piping.
pub async fn execute(launch: LaunchConfig, target: CrawlTarget) -> Result<()> {
    let browser = BrowserSession::launch(launch).await?;
    let page = match browser.create_page("links").await {
        Ok(page) => page,
        Err(err) => {
            let _ = browser.kill().await;
            return Err(err.into());
        }
    };

    let crawler = Crawler::new(&page, target);
    let links = crawler.discover_links().await;
    browser.kill().await?;

    for link in &links {
        println!("{link}");
    }
    Ok(())
}
