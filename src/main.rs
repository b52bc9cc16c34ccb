use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use domgrad_scraper::catalog::CatalogEnumerator;
use domgrad_scraper::client::WebClient;
use domgrad_scraper::collector::Collector;
use domgrad_scraper::config::ScrapeConfig;
use domgrad_scraper::flats::FlatExtractor;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Domodedovo Grad flat scraper")]
struct Args {
    /// Site root, without a trailing slash
    #[clap(long, default_value = "https://www.domodedovograd.ru")]
    base_url: String,

    /// Catalog path under the site root
    #[clap(long, default_value = "domodedovo")]
    catalog_path: String,

    /// Catalog group filter (grp query parameter)
    #[clap(short, long, default_value = "242602")]
    group: String,

    /// Per-request timeout in seconds
    #[clap(short, long, default_value = "60")]
    timeout: u64,

    /// Attempts per request before giving up
    #[clap(short, long, default_value = "3")]
    retries: u32,

    /// Log at debug level
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries nothing but the JSON payload.
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ScrapeConfig {
        base_url: args.base_url,
        catalog_path: args.catalog_path,
        group: args.group,
        timeout: Duration::from_secs(args.timeout),
        max_retries: args.retries,
    };

    // One session per pipeline stage.
    let enumerator = CatalogEnumerator::new(WebClient::new(config.timeout)?, config.clone());
    let flats_urls = enumerator.collect(());
    if flats_urls.is_empty() {
        warn!("catalog enumeration produced no listings");
    }

    let extractor = FlatExtractor::new(WebClient::new(config.timeout)?, config);
    let flats_json = extractor.collect(flats_urls)?;

    println!("{}", flats_json);
    Ok(())
}
