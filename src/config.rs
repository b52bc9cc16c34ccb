use std::time::Duration;

/// Everything the original hardcoded: site root, catalog path and group
/// filter, request timeout and retry budget.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub catalog_path: String,
    pub group: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.domodedovograd.ru".to_string(),
            catalog_path: "domodedovo".to_string(),
            group: "242602".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl ScrapeConfig {
    pub fn catalog_page_url(&self, page: usize) -> String {
        format!(
            "{}/{}?grp={}&page={}",
            self.base_url, self.catalog_path, self.group, page
        )
    }

    pub fn smart_filter_url(&self) -> String {
        format!(
            "{}/ajax/GetSmartFilterForm.json?grp={}&page=1",
            self.base_url, self.group
        )
    }

    pub fn flat_url(&self, listing_path: &str) -> String {
        format!("{}/{}", self.base_url, listing_path.trim_start_matches('/'))
    }

    pub fn plan_images_url(&self, flat_id: &str) -> String {
        format!("{}/flat-images.json?flatId={}", self.base_url, flat_id)
    }

    /// Absolute URL for a site-relative asset path such as a plan image.
    pub fn asset_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_matches('/'))
    }
}
