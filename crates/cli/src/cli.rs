use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "torvet")]
#[command(about = "Crawler for Danish commercial property listings")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run the browser with a visible window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Browser locale, also sent as Accept-Language
    #[arg(long, global = true, default_value = "da-DK")]
    pub locale: String,

    /// Timezone emulated on every page
    #[arg(long, global = true, default_value = "Europe/Copenhagen")]
    pub timezone: String,

    /// Allow downloads into this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Proxy endpoint as host:port
    #[arg(long, global = true, value_name = "ENDPOINT")]
    pub proxy_server: Option<String>,

    /// Proxy username (requires --proxy-server)
    #[arg(long, global = true, requires = "proxy_server")]
    pub proxy_username: Option<String>,

    /// Proxy password (requires --proxy-server)
    #[arg(long, global = true, requires = "proxy_server")]
    pub proxy_password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full crawl and write the records as CSV
    Crawl {
        /// Which index to crawl
        #[arg(value_enum)]
        category: Category,

        /// Override the index URL
        #[arg(long)]
        url: Option<String>,

        /// Output name, written as <name>.csv
        #[arg(long, default_value = "listings")]
        output: String,

        /// Directory the CSV is written into
        #[arg(long, default_value = ".", value_name = "DIR")]
        output_dir: PathBuf,

        /// Settle delay between index interactions (seconds)
        #[arg(long, default_value = "10")]
        settle_secs: u64,
    },

    /// Run only link discovery and print the URLs
    Links {
        /// Which index to crawl
        #[arg(value_enum)]
        category: Category,

        /// Override the index URL
        #[arg(long)]
        url: Option<String>,

        /// Settle delay between index interactions (seconds)
        #[arg(long, default_value = "10")]
        settle_secs: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Category {
    /// Properties for sale
    Sale,
    /// Properties for lease
    Lease,
}
