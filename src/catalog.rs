use std::collections::HashSet;

use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{info, warn};

use crate::client::{with_retries, HttpFetch};
use crate::collector::Collector;
use crate::config::ScrapeConfig;
use crate::error::FetchError;

#[derive(Deserialize)]
struct SmartFilterForm {
    #[serde(rename = "prodCount")]
    prod_count: usize,
}

/// First pipeline stage: walks the paginated catalog and produces the
/// complete, deduplicated set of listing paths for the current catalog state.
pub struct CatalogEnumerator<F> {
    fetcher: F,
    config: ScrapeConfig,
}

impl<F: HttpFetch> CatalogEnumerator<F> {
    pub fn new(fetcher: F, config: ScrapeConfig) -> Self {
        Self { fetcher, config }
    }

    /// Total listing count from the smart-filter endpoint. Only timeouts are
    /// retried; a bad status, malformed body or exhausted budget all degrade
    /// to zero, which empties the whole run via the paging guard.
    fn total_count(&self) -> usize {
        let url = self.config.smart_filter_url();
        let response = match with_retries(self.config.max_retries, || self.fetcher.get(&url)) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "count endpoint unreachable");
                return 0;
            }
        };

        if !response.is_ok() {
            return 0;
        }

        match serde_json::from_str::<SmartFilterForm>(&response.body) {
            Ok(form) => form.prod_count,
            Err(e) => {
                warn!(error = %e, "count endpoint returned malformed JSON");
                0
            }
        }
    }

    /// Listing density, taken as the number of card anchors on page 1.
    fn listings_per_page(&self) -> usize {
        let url = self.config.catalog_page_url(1);
        match self.fetcher.get(&url) {
            Ok(response) if response.is_ok() => parse_listing_urls(&response.body).len(),
            Ok(_) => 0,
            Err(e) => {
                warn!(error = %e, "first catalog page unreachable");
                0
            }
        }
    }

    /// Fetches every catalog page, retrying each within the budget, and
    /// accumulates card hrefs into one deduplicated set. A page that fails
    /// all its retries is skipped here and caught by the consistency check.
    fn collect_page_urls(&self, page_urls: &[String]) -> HashSet<String> {
        let mut result = HashSet::new();
        for page_url in page_urls {
            let fetched = with_retries(self.config.max_retries, || {
                let response = self.fetcher.get(page_url)?;
                if response.is_ok() {
                    Ok(response.body)
                } else {
                    Err(FetchError::Status(response.status))
                }
            });

            match fetched {
                Ok(body) => result.extend(parse_listing_urls(&body)),
                Err(e) => warn!(url = %page_url, error = %e, "catalog page failed after retries"),
            }
        }
        result
    }
}

impl<F: HttpFetch> Collector for CatalogEnumerator<F> {
    type Input = ();
    type Output = HashSet<String>;

    /// All-or-nothing: if the collected set does not match the advertised
    /// total, the scrape was partial or the catalog changed mid-run, and an
    /// empty set is returned instead of an under-collected one.
    fn collect(&self, _input: ()) -> HashSet<String> {
        let total = self.total_count();
        let per_page = self.listings_per_page();
        let pages = page_count(total, per_page);
        info!(total, per_page, pages, "catalog paging computed");

        let page_urls: Vec<String> = (1..=pages)
            .map(|page| self.config.catalog_page_url(page))
            .collect();
        let urls = self.collect_page_urls(&page_urls);

        if urls.len() != total {
            warn!(
                found = urls.len(),
                expected = total,
                "catalog scrape incomplete, discarding result"
            );
            return HashSet::new();
        }
        urls
    }
}

/// Card anchors on one catalog page, in document order. May contain
/// duplicates; callers deduplicate.
pub fn parse_listing_urls(page_html: &str) -> Vec<String> {
    let document = Html::parse_document(page_html);
    let card_selector = Selector::parse("a.product-card").unwrap();

    document
        .select(&card_selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

/// Number of catalog pages needed for `total` listings at `per_page` density.
pub fn page_count(total: usize, per_page: usize) -> usize {
    if total == 0 || per_page == 0 {
        return 0;
    }
    if total % per_page == 0 {
        total / per_page
    } else {
        total / per_page + 1
    }
}
