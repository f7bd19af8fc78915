use std::path::Path;

use anyhow::Result;
use torvet::crawl::{CrawlTarget, Crawler, deliver};
use torvet::{BrowserSession, CsvSink, LaunchConfig};
use tracing::info;

pub async fn execute(
    launch: LaunchConfig,
    target: CrawlTarget,
    output: &str,
    output_dir: &Path,
) -> Result<()> {
    let browser = BrowserSession::launch(launch).await?;
    let page = match browser.create_page("crawl").await {
        Ok(page) => page,
        Err(err) => {
            let _ = browser.kill().await;
            return Err(err.into());
        }
    };

    let category = target.category;
    let crawler = Crawler::new(&page, target);
    let records = crawler.run().await;
    info!(target: "torvet", %category, records = records.len(), "crawl finished");

    // The browser goes down before the records leave the process.
    browser.kill().await?;

    let sink = CsvSink::new(output_dir);
    deliver(&sink, output, &records).await?;

    println!(
        "{} records written to {}",
        records.len(),
        output_dir.join(format!("{output}.csv")).display()
    );
    Ok(())
}
