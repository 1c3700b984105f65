//! Selector-driven HTML source fetcher.
//!
//! One generic fetcher covers every plain-HTTP retail site; what differs per
//! site is a small block of configuration (search URL and CSS selectors),
//! not code. Listing pages vary wildly in structure but almost all of them
//! boil down to "repeated card element, title node, price node, link".

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client::HttpClient;
use crate::error::{Result, ScrapeError};
use crate::models::{
    generate_deal_id, seller, Deal, DealDuration, ProductType, Region, SearchCriteria, SourceKind,
};

/// Title keywords marking a listing as a limited trial.
pub const TRIAL_KEYWORDS: &[&str] =
    &["trial", "14 day", "14-day", "7 day", "7-day", "3 day", "1 day"];

/// Per-site scraping configuration. These are data, registered at startup;
/// adding a retailer means adding one of these, not a new type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Merchant name stamped on extracted deals (unless `merchant_selector`
    /// finds a per-row merchant, as on aggregator tables).
    pub seller_name: String,
    pub search_url: String,
    pub currency: String,
    /// CSS selector for one listing card/row.
    pub item_selector: String,
    pub title_selector: String,
    pub price_selector: String,
    pub link_selector: String,
    /// For aggregator tables where each row names a different merchant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_selector: Option<String>,
    /// Every keyword here must appear in the title.
    #[serde(default)]
    pub required_keywords: Vec<String>,
    /// At least one of these must appear, when non-empty.
    #[serde(default)]
    pub any_keywords: Vec<String>,
    /// Base URL for resolving relative links.
    pub base_url: String,
    /// Fixed product type for this site's listings.
    #[serde(default)]
    pub product_type: ProductType,
}

/// Generic fetcher for one configured site.
pub struct SiteFetcher {
    config: SiteConfig,
    client: HttpClient,
    request_timeout: Duration,
}

impl SiteFetcher {
    pub fn new(config: SiteConfig, client: HttpClient, request_timeout: Duration) -> Self {
        Self { config, client, request_timeout }
    }
}

#[async_trait]
impl crate::registry::SourceFetcher for SiteFetcher {
    async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
        let body = self
            .client
            .get_text(&self.config.search_url, self.request_timeout)
            .await?;
        // Parsing stays out of the async path: Html is not Send.
        let deals = parse_listing(&body, &self.config)?;
        debug!(site = %self.config.seller_name, count = deals.len(), "parsed listing page");
        Ok(deals)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Config(format!("bad selector {:?}: {}", css, e)))
}

/// Parse a listing page into deals. Malformed cards are skipped, never fatal.
pub fn parse_listing(html: &str, config: &SiteConfig) -> Result<Vec<Deal>> {
    let document = Html::parse_document(html);
    let item_sel = selector(&config.item_selector)?;
    let title_sel = selector(&config.title_selector)?;
    let price_sel = selector(&config.price_selector)?;
    let link_sel = selector(&config.link_selector)?;
    let merchant_sel = config
        .merchant_selector
        .as_deref()
        .map(selector)
        .transpose()?;

    let mut deals = Vec::new();
    for item in document.select(&item_sel) {
        let title: String = match item.select(&title_sel).next() {
            Some(el) => el.text().collect::<String>().trim().to_string(),
            None => continue,
        };

        if !title_matches(&title, config) {
            continue;
        }

        let price_text: String = match item.select(&price_sel).next() {
            Some(el) => el.text().collect(),
            None => continue,
        };
        let price = match normalize_price(&price_text) {
            Some(p) => p,
            None => continue,
        };

        let link = item
            .select(&link_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| resolve_url(&config.base_url, href))
            .unwrap_or_else(|| config.base_url.clone());

        let seller_name = merchant_sel
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| config.seller_name.clone());

        let trust_level = seller::trust_for(&seller_name);

        deals.push(Deal {
            id: generate_deal_id(),
            seller_name,
            price,
            currency: config.currency.clone(),
            region: Region::from_listing_text(&title),
            product_type: config.product_type,
            duration: DealDuration::from_listing_text(&title),
            trust_level,
            rating: None,
            review_count: None,
            url: link,
            is_trial: is_trial_title(&title),
            fetched_at: Utc::now(),
            source_kind: SourceKind::Live,
        });
    }

    Ok(deals)
}

fn title_matches(title: &str, config: &SiteConfig) -> bool {
    let lower = title.to_lowercase();
    if !config.required_keywords.iter().all(|k| lower.contains(&k.to_lowercase())) {
        return false;
    }
    if !config.any_keywords.is_empty()
        && !config.any_keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
    {
        return false;
    }
    true
}

/// Whether a listing title describes a trial offer.
pub fn is_trial_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    TRIAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Normalize price text across locale separators: "€1.234,56", "$1,234.56"
/// and "12,99" all parse. Returns `None` for unparseable or non-positive
/// amounts.
pub fn normalize_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        // Both separators present: the later one is the decimal point.
        (Some(dot), Some(comma)) if comma > dot => {
            cleaned.replace('.', "").replacen(',', ".", usize::MAX)
        }
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        // Comma only: decimal separator in most shop locales.
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|p| *p > 0.0)
}

fn resolve_url(base: &str, href: &str) -> String {
    if let Ok(absolute) = url::Url::parse(href) {
        return absolute.to_string();
    }
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", base.trim_end_matches('/'), href))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrustLevel;

    fn config() -> SiteConfig {
        SiteConfig {
            seller_name: "CDKeys".into(),
            search_url: "https://shop.example/search".into(),
            currency: "USD".into(),
            item_selector: ".product-item".into(),
            title_selector: ".product-title".into(),
            price_selector: ".price".into(),
            link_selector: "a".into(),
            merchant_selector: None,
            required_keywords: vec!["ultimate".into()],
            any_keywords: vec!["game pass".into(), "gamepass".into()],
            base_url: "https://shop.example".into(),
            product_type: ProductType::Key,
        }
    }

    const PAGE: &str = r#"
        <div class="product-item">
            <div class="product-title">Xbox Game Pass Ultimate 1 Month (Global)</div>
            <span class="price">$12.99</span>
            <a href="/p/gpu-1m">buy</a>
        </div>
        <div class="product-item">
            <div class="product-title">Xbox Game Pass Ultimate 14 Day Trial</div>
            <span class="price">$1.99</span>
            <a href="/p/gpu-trial">buy</a>
        </div>
        <div class="product-item">
            <div class="product-title">Some Other Subscription</div>
            <span class="price">$9.99</span>
            <a href="/p/other">buy</a>
        </div>
        <div class="product-item">
            <div class="product-title">Xbox Game Pass Ultimate Broken Price</div>
            <span class="price">N/A</span>
            <a href="/p/broken">buy</a>
        </div>
    "#;

    #[test]
    fn parses_matching_cards_and_skips_malformed() {
        let deals = parse_listing(PAGE, &config()).unwrap();
        assert_eq!(deals.len(), 2);

        let first = &deals[0];
        assert_eq!(first.seller_name, "CDKeys");
        assert_eq!(first.price, 12.99);
        assert_eq!(first.region, Region::Global);
        assert_eq!(first.duration, DealDuration::OneMonth);
        assert_eq!(first.url, "https://shop.example/p/gpu-1m");
        assert!(!first.is_trial);

        assert!(deals[1].is_trial);
    }

    #[test]
    fn merchant_selector_overrides_site_seller() {
        let mut cfg = config();
        cfg.merchant_selector = Some(".merchant".into());
        cfg.required_keywords.clear();
        cfg.any_keywords.clear();

        let page = r#"
            <div class="product-item">
                <span class="merchant">G2A</span>
                <div class="product-title">Ultimate 1 Month listing row</div>
                <span class="price">9,89 &#8364;</span>
                <a href="https://aggregator.example/out/1">go</a>
            </div>
        "#;
        let deals = parse_listing(page, &cfg).unwrap();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].seller_name, "G2A");
        assert_eq!(deals[0].trust_level, TrustLevel::Caution);
        assert_eq!(deals[0].price, 9.89);
    }

    #[test]
    fn price_normalization_handles_locales() {
        assert_eq!(normalize_price("$12.99"), Some(12.99));
        assert_eq!(normalize_price("12,99 \u{20ac}"), Some(12.99));
        assert_eq!(normalize_price("1.234,56"), Some(1234.56));
        assert_eq!(normalize_price("1,234.56"), Some(1234.56));
        assert_eq!(normalize_price("free"), None);
        assert_eq!(normalize_price("0.00"), None);
    }

    #[test]
    fn bad_selector_is_a_config_error() {
        let mut cfg = config();
        cfg.item_selector = ":::not a selector".into();
        assert!(matches!(
            parse_listing(PAGE, &cfg),
            Err(ScrapeError::Config(_))
        ));
    }
}
