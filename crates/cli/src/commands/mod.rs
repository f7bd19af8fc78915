mod crawl;
mod links;

use anyhow::Result;
use torvet::crawl::CrawlTarget;
use torvet::{LaunchConfig, ProxyConfig};

use crate::cli::{Category, Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
    let launch = launch_config(&cli);
    match cli.command {
        Commands::Crawl {
            category,
            url,
            output,
            output_dir,
            settle_secs,
        } => {
            let target = target_for(category, url.as_deref(), settle_secs);
            crawl::execute(launch, target, &output, &output_dir).await
        }
        Commands::Links {
            category,
            url,
            settle_secs,
        } => {
            let target = target_for(category, url.as_deref(), settle_secs);
            links::execute(launch, target).await
        }
    }
}

fn launch_config(cli: &Cli) -> LaunchConfig {
    LaunchConfig {
        locale: cli.locale.clone(),
        timezone: Some(cli.timezone.clone()),
        headless: !cli.headed,
        download_dir: cli.download_dir.clone(),
        proxy: cli.proxy_server.as_ref().map(|server| ProxyConfig {
            server: server.clone(),
            username: cli.proxy_username.clone(),
            password: cli.proxy_password.clone(),
        }),
    }
}

fn target_for(category: Category, url: Option<&str>, settle_secs: u64) -> CrawlTarget {
    let mut target = match category {
        Category::Sale => CrawlTarget::sale(),
        Category::Lease => CrawlTarget::lease(),
    };
    if let Some(url) = url {
        target = target.with_index_url(url);
    }
    target.with_settle_delay(std::time::Duration::from_secs(settle_secs))
}
