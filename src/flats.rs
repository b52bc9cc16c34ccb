use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html, Node, Selector};
use serde::Deserialize;
use tracing::{info, warn};

use crate::client::{with_retries, HttpFetch};
use crate::collector::Collector;
use crate::config::ScrapeConfig;
use crate::error::{ExtractError, FetchError, ParseError};
use crate::models::{FlatRecord, Rooms};

const COMPLEX_NAME: &str =
    "Домодедово парк(Московская область, г.Домодедово, с.Домодедово, ул.Творчества)";
const UNIT_TYPE: &str = "flat";
const STUDIO_MARKER: &str = "Студия";
const RESERVED_STATUS: &str = "Забронировано";

/// One entry of the flat-images endpoint; only the small rendition is used.
#[derive(Debug, Deserialize)]
pub struct PlanImage {
    pub sm: Option<String>,
}

/// Second pipeline stage: turns each listing path into one `FlatRecord`.
pub struct FlatExtractor<F> {
    fetcher: F,
    config: ScrapeConfig,
}

impl<F: HttpFetch> FlatExtractor<F> {
    pub fn new(fetcher: F, config: ScrapeConfig) -> Self {
        Self { fetcher, config }
    }

    fn fetch_flat_page(&self, listing_path: &str) -> Result<String, FetchError> {
        let url = self.config.flat_url(listing_path);
        with_retries(self.config.max_retries, || {
            let response = self.fetcher.get(&url)?;
            if response.is_ok() {
                Ok(response.body)
            } else {
                Err(FetchError::Status(response.status))
            }
        })
    }

    /// Plan metadata for one internal flat id. A non-200 answer means the
    /// flat simply has no plan; a body that is not a JSON array fails the
    /// record.
    fn fetch_plan_images(&self, flat_id: &str) -> Result<Option<Vec<PlanImage>>, ParseError> {
        let url = self.config.plan_images_url(flat_id);
        match self.fetcher.get(&url) {
            Ok(response) if response.is_ok() => Ok(Some(serde_json::from_str(&response.body)?)),
            _ => Ok(None),
        }
    }

    fn plan_url(&self, flat_id: &str) -> Result<Option<String>, ParseError> {
        let images = self.fetch_plan_images(flat_id)?;
        Ok(images
            .and_then(|images| images.into_iter().next())
            .and_then(|image| image.sm)
            .map(|sm| self.config.asset_url(&sm)))
    }

    /// Extracts one record from a listing page via fixed structural
    /// selectors. The spec list is ordered: building, section, floor,
    /// number, rooms, area, phase. Any missing node fails the whole record.
    pub fn parse_flat_page(&self, page_html: &str) -> Result<FlatRecord, ParseError> {
        let document = Html::parse_document(page_html);

        let breadcrumb_selector = Selector::parse("span.breadcrumbs__item").unwrap();
        let flat_type: String = document
            .select(&breadcrumb_selector)
            .next()
            .ok_or(ParseError::MissingElement("breadcrumbs__item"))?
            .text()
            .collect();

        let badge_selector = Selector::parse("span.badge.badge--secondary").unwrap();
        let is_reserved = document.select(&badge_selector).next().is_some();

        let spec_selector = Selector::parse("dl.spec.mb-30 dd > span").unwrap();
        let values: Vec<String> = document
            .select(&spec_selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect();
        if values.len() < 7 {
            return Err(ParseError::SpecTooShort {
                expected: 7,
                found: values.len(),
            });
        }

        let floor: i32 = values[2].parse().map_err(|_| ParseError::InvalidNumber {
            field: "floor",
            value: values[2].clone(),
        })?;

        let rooms = if flat_type.contains(STUDIO_MARKER) {
            Rooms::Studio
        } else {
            Rooms::Count(values[4].parse().map_err(|_| ParseError::InvalidNumber {
                field: "rooms",
                value: values[4].clone(),
            })?)
        };

        let area = parse_area(&values[5])?;

        let price_selector = Selector::parse("div.m-passport-price-bar__price").unwrap();
        let price_text: String = document
            .select(&price_selector)
            .next()
            .ok_or(ParseError::MissingElement("price bar"))?
            .text()
            .collect();
        // Digit stripping drops any decimal point; kept as-is until confirmed
        // against the live site, which prices in whole rubles.
        let price_finished: f64 =
            digits_of(&price_text)
                .parse()
                .map_err(|_| ParseError::InvalidNumber {
                    field: "price",
                    value: price_text.trim().to_string(),
                })?;

        // The internal site id lives in the first HTML comment of the page.
        let comment = document
            .tree
            .nodes()
            .find_map(|node| match node.value() {
                Node::Comment(comment) => Some(comment.comment.to_string()),
                _ => None,
            })
            .ok_or(ParseError::MissingElement("comment node"))?;
        let number_on_site = digits_of(&comment);

        let plan = self.plan_url(&number_on_site)?;

        Ok(FlatRecord {
            complex: COMPLEX_NAME.to_string(),
            unit_type: UNIT_TYPE.to_string(),
            building: values[0].clone(),
            section: values[1].clone(),
            floor,
            number: values[3].clone(),
            number_on_site,
            rooms,
            area,
            living_area: area,
            phase: values[6].clone(),
            plan,
            price_finished,
            sale_status: is_reserved.then(|| RESERVED_STATUS.to_string()),
            in_sale: true,
            finished: 1,
        })
    }

    fn extract_record(&self, listing_path: &str) -> Result<FlatRecord, ExtractError> {
        let page = self.fetch_flat_page(listing_path)?;
        Ok(self.parse_flat_page(&page)?)
    }
}

impl<F: HttpFetch> Collector for FlatExtractor<F> {
    type Input = HashSet<String>;
    type Output = Result<String>;

    /// Per-record failures are logged and skipped; the output keeps only the
    /// listings that fetched and parsed cleanly. Non-ASCII text is emitted
    /// literally.
    fn collect(&self, flats_urls: HashSet<String>) -> Result<String> {
        info!(count = flats_urls.len(), "started parsing listing pages");

        let mut records = Vec::new();
        for flat_url in &flats_urls {
            match self.extract_record(flat_url) {
                Ok(record) => records.push(record),
                Err(e) => warn!(url = %flat_url, error = %e, "skipping listing"),
            }
        }

        info!(
            parsed = records.len(),
            skipped = flats_urls.len() - records.len(),
            "finished parsing listing pages"
        );
        serde_json::to_string(&records).context("Failed to serialize flat records")
    }
}

/// Concatenates every digit of `text` in left-to-right order.
fn digits_of(text: &str) -> String {
    let digits = Regex::new(r"\d+").unwrap();
    digits.find_iter(text).map(|m| m.as_str()).collect()
}

/// Comma decimal separators are normalized to periods before parsing, so
/// "12,5" and "12.5" both read as 12.5.
fn parse_area(value: &str) -> Result<f64, ParseError> {
    value
        .replace(',', ".")
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            field: "area",
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeFetcher;

    fn config() -> ScrapeConfig {
        ScrapeConfig {
            base_url: "https://grad.test".to_string(),
            ..ScrapeConfig::default()
        }
    }

    fn flat_html(breadcrumb: &str, reserved: bool, flat_id: &str) -> String {
        let badge = if reserved {
            "<span class=\"badge badge--secondary\">Забронировано</span>"
        } else {
            ""
        };
        format!(
            concat!(
                "<html><body>",
                "<!-- flat id: {id} -->",
                "<nav><span class=\"breadcrumbs__item\">{breadcrumb}</span></nav>",
                "{badge}",
                "<dl class=\"spec mb-30\">",
                "<dd><span>Корпус 8</span></dd>",
                "<dd><span>2</span></dd>",
                "<dd><span>5</span></dd>",
                "<dd><span>101</span></dd>",
                "<dd><span>2</span></dd>",
                "<dd><span>45,6</span></dd>",
                "<dd><span>1 очередь</span></dd>",
                "</dl>",
                "<div class=\"m-passport-price-bar__price\">12 500 000 ₽</div>",
                "</body></html>",
            ),
            id = flat_id,
            breadcrumb = breadcrumb,
            badge = badge,
        )
    }

    /// Extractor whose fake fetcher serves plan images for flat 124344.
    fn extractor() -> FlatExtractor<FakeFetcher> {
        let config = config();
        let fetcher = FakeFetcher::new().body(
            &config.plan_images_url("124344"),
            r#"[{"sm": "/upload/plans/101-sm.png"}, {"sm": "/upload/plans/101-lg.png"}]"#,
        );
        FlatExtractor::new(fetcher, config)
    }

    #[test]
    fn parses_the_full_spec_list() {
        let html = flat_html("2-комнатная квартира", false, "124344");
        let record = extractor().parse_flat_page(&html).unwrap();

        assert_eq!(record.building, "Корпус 8");
        assert_eq!(record.section, "2");
        assert_eq!(record.floor, 5);
        assert_eq!(record.number, "101");
        assert_eq!(record.rooms, Rooms::Count(2));
        assert_eq!(record.area, 45.6);
        assert_eq!(record.living_area, 45.6);
        assert_eq!(record.phase, "1 очередь");
        assert_eq!(record.number_on_site, "124344");
        assert_eq!(record.unit_type, "flat");
        assert!(record.in_sale);
        assert_eq!(record.finished, 1);
    }

    #[test]
    fn price_keeps_digits_left_to_right() {
        let html = flat_html("2-комнатная квартира", false, "124344");
        let record = extractor().parse_flat_page(&html).unwrap();
        assert_eq!(record.price_finished, 12500000.0);
    }

    #[test]
    fn studio_breadcrumb_overrides_the_numeric_room_count() {
        let html = flat_html("Студия", false, "124344");
        let record = extractor().parse_flat_page(&html).unwrap();
        assert_eq!(record.rooms, Rooms::Studio);
    }

    #[test]
    fn reservation_badge_sets_sale_status() {
        let html = flat_html("2-комнатная квартира", true, "124344");
        let record = extractor().parse_flat_page(&html).unwrap();
        assert_eq!(record.sale_status.as_deref(), Some("Забронировано"));

        let html = flat_html("2-комнатная квартира", false, "124344");
        let record = extractor().parse_flat_page(&html).unwrap();
        assert_eq!(record.sale_status, None);
    }

    #[test]
    fn plan_is_the_first_image_resolved_against_the_base_url() {
        let html = flat_html("2-комнатная квартира", false, "124344");
        let record = extractor().parse_flat_page(&html).unwrap();
        assert_eq!(
            record.plan.as_deref(),
            Some("https://grad.test/upload/plans/101-sm.png")
        );
    }

    #[test]
    fn plan_is_absent_when_the_endpoint_has_nothing() {
        let html = flat_html("2-комнатная квартира", false, "124344");
        // No route for the plan endpoint, so the fake answers 404.
        let extractor = FlatExtractor::new(FakeFetcher::new(), config());
        let record = extractor.parse_flat_page(&html).unwrap();
        assert_eq!(record.plan, None);
    }

    #[test]
    fn malformed_plan_payload_fails_the_record() {
        let html = flat_html("2-комнатная квартира", false, "124344");
        let config = config();
        let fetcher = FakeFetcher::new().body(&config.plan_images_url("124344"), "not json");
        let extractor = FlatExtractor::new(fetcher, config);
        assert!(matches!(
            extractor.parse_flat_page(&html),
            Err(ParseError::PlanImages(_))
        ));
    }

    #[test]
    fn short_spec_list_fails_the_record() {
        let html = "<html><body><!-- 1 -->\
            <span class=\"breadcrumbs__item\">Квартира</span>\
            <dl class=\"spec mb-30\"><dd><span>Корпус 8</span></dd></dl>\
            </body></html>";
        let extractor = FlatExtractor::new(FakeFetcher::new(), config());
        assert!(matches!(
            extractor.parse_flat_page(html),
            Err(ParseError::SpecTooShort { expected: 7, found: 1 })
        ));
    }

    #[test]
    fn missing_breadcrumb_fails_the_record() {
        let extractor = FlatExtractor::new(FakeFetcher::new(), config());
        assert!(matches!(
            extractor.parse_flat_page("<html><body></body></html>"),
            Err(ParseError::MissingElement("breadcrumbs__item"))
        ));
    }

    #[test]
    fn area_parses_comma_and_period_separators() {
        assert_eq!(parse_area("12,5").unwrap(), 12.5);
        assert_eq!(parse_area("12.5").unwrap(), 12.5);
        assert!(parse_area("12,5 м²").is_err());
    }

    #[test]
    fn digits_concatenate_across_separators() {
        assert_eq!(digits_of("12 500 000 ₽"), "12500000");
        assert_eq!(digits_of(" flat id: 124344 "), "124344");
        assert_eq!(digits_of("no digits"), "");
    }

    #[test]
    fn collect_skips_listings_that_never_fetch() {
        let config = config();
        let html = flat_html("2-комнатная квартира", false, "124344");
        let fetcher = FakeFetcher::new()
            .body(&config.flat_url("/flat-1"), &html)
            .body(&config.flat_url("/flat-2"), &html)
            .status(&config.flat_url("/flat-3"), 500);
        let extractor = FlatExtractor::new(fetcher, config.clone());

        let urls: HashSet<String> = ["/flat-1", "/flat-2", "/flat-3"]
            .into_iter()
            .map(String::from)
            .collect();
        let json = extractor.collect(urls).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();

        assert_eq!(records.len(), 2);
        // The dead listing ate its full retry budget before being skipped.
        assert_eq!(extractor.fetcher.requests_for(&config.flat_url("/flat-3")), 3);
    }

    #[test]
    fn collect_emits_non_ascii_literally() {
        let config = config();
        let html = flat_html("Студия", false, "124344");
        let fetcher = FakeFetcher::new().body(&config.flat_url("/flat-1"), &html);
        let extractor = FlatExtractor::new(fetcher, config);

        let urls: HashSet<String> = [String::from("/flat-1")].into();
        let json = extractor.collect(urls).unwrap();

        assert!(json.contains("Домодедово парк"));
        assert!(json.contains("\"rooms\":\"studio\""));
        assert!(!json.contains("\\u"));
    }
}
