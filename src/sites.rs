//! Built-in retail site table.
//!
//! Every retailer is an entry here, not a type: plain-HTTP sites get a
//! [`SiteConfig`] with their selectors, challenge-protected sites get a
//! [`RenderedSiteConfig`] and route through the renderer when one is
//! available. Registration order within a speed class is the order results
//! tend to arrive; the aggregator comparison table always runs last.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::browser::{ChallengeRenderer, RenderedFetcher, RenderedSiteConfig};
use crate::config::EngineConfig;
use crate::registry::{Source, SourceRegistry};
use crate::scrapers::{HttpClient, SiteConfig, SiteFetcher};

fn product_keywords() -> (Vec<String>, Vec<String>) {
    (
        vec!["ultimate".to_string()],
        vec!["game pass".to_string(), "gamepass".to_string()],
    )
}

fn plain_sites() -> Vec<SiteConfig> {
    let (required, any) = product_keywords();
    let base = SiteConfig {
        required_keywords: required,
        any_keywords: any,
        ..SiteConfig::default()
    };

    vec![
        SiteConfig {
            seller_name: "CDKeys".into(),
            search_url: "https://www.cdkeys.com/catalogsearch/result/?q=xbox+game+pass+ultimate"
                .into(),
            currency: "USD".into(),
            item_selector: ".product-item".into(),
            title_selector: ".product-item-name".into(),
            price_selector: ".price".into(),
            link_selector: "a.product-item-link".into(),
            base_url: "https://www.cdkeys.com".into(),
            ..base.clone()
        },
        SiteConfig {
            seller_name: "Eneba".into(),
            search_url: "https://www.eneba.com/store/xbox?text=game%20pass%20ultimate".into(),
            currency: "EUR".into(),
            item_selector: "[data-component='ProductCard']".into(),
            title_selector: "[data-component='ProductCardTitle']".into(),
            price_selector: "[data-component='Price']".into(),
            link_selector: "a".into(),
            base_url: "https://www.eneba.com".into(),
            ..base.clone()
        },
        SiteConfig {
            seller_name: "G2A".into(),
            search_url: "https://www.g2a.com/search?query=xbox%20game%20pass%20ultimate".into(),
            currency: "EUR".into(),
            item_selector: "[data-testid='ProductCard']".into(),
            title_selector: "[data-testid='ProductCard-title']".into(),
            price_selector: "[data-testid='ProductCard-price']".into(),
            link_selector: "a".into(),
            base_url: "https://www.g2a.com".into(),
            ..base.clone()
        },
        SiteConfig {
            seller_name: "Instant Gaming".into(),
            search_url: "https://www.instant-gaming.com/en/search/?q=xbox+game+pass+ultimate"
                .into(),
            currency: "EUR".into(),
            item_selector: ".item".into(),
            title_selector: ".title".into(),
            price_selector: ".price".into(),
            link_selector: "a".into(),
            base_url: "https://www.instant-gaming.com".into(),
            ..base.clone()
        },
        SiteConfig {
            seller_name: "Difmark".into(),
            search_url: "https://www.difmark.com/search?q=xbox+game+pass+ultimate".into(),
            currency: "EUR".into(),
            item_selector: ".product-item".into(),
            title_selector: ".product-title".into(),
            price_selector: ".price".into(),
            link_selector: "a".into(),
            base_url: "https://www.difmark.com".into(),
            ..base
        },
    ]
}

/// Cloudflare-protected sites. Plain HTTP gets the interstitial, so these
/// route through the challenge renderer when one is available.
fn rendered_sites() -> Vec<RenderedSiteConfig> {
    let keywords = vec!["game pass".to_string(), "gamepass".to_string(), "ultimate".to_string()];
    vec![
        RenderedSiteConfig {
            seller_name: "Kinguin".into(),
            search_url: "https://www.kinguin.net/listing?phrase=xbox+game+pass+ultimate".into(),
            currency: "EUR".into(),
            keywords: keywords.clone(),
        },
        RenderedSiteConfig {
            seller_name: "Gamivo".into(),
            search_url: "https://www.gamivo.com/search?query=xbox+game+pass+ultimate".into(),
            currency: "EUR".into(),
            keywords,
        },
    ]
}

/// Selector fallbacks for rendered sites when no renderer is available.
fn rendered_site_fallback_configs() -> Vec<SiteConfig> {
    let (required, any) = product_keywords();
    let base = SiteConfig {
        required_keywords: required,
        any_keywords: any,
        ..SiteConfig::default()
    };
    vec![
        SiteConfig {
            seller_name: "Kinguin".into(),
            search_url: "https://www.kinguin.net/listing?phrase=xbox+game+pass+ultimate".into(),
            currency: "EUR".into(),
            item_selector: "[data-product-card]".into(),
            title_selector: "[data-product-name]".into(),
            price_selector: "[data-product-price]".into(),
            link_selector: "a".into(),
            base_url: "https://www.kinguin.net".into(),
            ..base.clone()
        },
        SiteConfig {
            seller_name: "Gamivo".into(),
            search_url: "https://www.gamivo.com/search?query=xbox+game+pass+ultimate".into(),
            currency: "EUR".into(),
            item_selector: ".product-card".into(),
            title_selector: ".product-card__title".into(),
            price_selector: ".product-card__price".into(),
            link_selector: "a".into(),
            base_url: "https://www.gamivo.com".into(),
            ..base
        },
    ]
}

fn aggregator_site() -> SiteConfig {
    SiteConfig {
        seller_name: "AllKeyShop".into(),
        search_url:
            "https://www.allkeyshop.com/blog/buy-xbox-game-pass-ultimate-cd-key-compare-prices/"
                .into(),
        currency: "USD".into(),
        item_selector: ".offers-table .offers-table-row".into(),
        title_selector: ".offer-name".into(),
        price_selector: ".price".into(),
        link_selector: "a.buy-btn".into(),
        merchant_selector: Some(".merchant-name".into()),
        base_url: "https://www.allkeyshop.com".into(),
        ..SiteConfig::default()
    }
}

/// Build the standard registry.
///
/// With a renderer, challenge-protected sites render through it; without
/// one they fall back to plain HTTP and usually contribute nothing live,
/// which the fallback cascade then covers.
pub fn build_registry(
    client: &HttpClient,
    config: &EngineConfig,
    renderer: Option<Arc<ChallengeRenderer>>,
    cancel: CancellationToken,
) -> SourceRegistry {
    let request_timeout = Duration::from_millis(config.retry.base_timeout_ms);
    let mut sources = Vec::new();
    let mut hint = 0u32;

    for site in plain_sites() {
        let name = site.seller_name.clone();
        let fetcher = SiteFetcher::new(site, client.clone(), request_timeout);
        sources.push(Source::new(name, Arc::new(fetcher)).with_order_hint(hint));
        hint += 1;
    }

    match renderer {
        Some(renderer) => {
            for site in rendered_sites() {
                let name = site.seller_name.clone();
                let fetcher = RenderedFetcher::new(renderer.clone(), site, cancel.clone());
                sources.push(
                    Source::new(name, Arc::new(fetcher))
                        .with_order_hint(hint)
                        .challenge_rendered(),
                );
                hint += 1;
            }
        }
        None => {
            for site in rendered_site_fallback_configs() {
                let name = site.seller_name.clone();
                let fetcher = SiteFetcher::new(site, client.clone(), request_timeout);
                sources.push(Source::new(name, Arc::new(fetcher)).with_order_hint(hint));
                hint += 1;
            }
        }
    }

    // Comparison table spanning many merchants; slow, so it runs last.
    let aggregator = aggregator_site();
    let fetcher = SiteFetcher::new(aggregator, client.clone(), request_timeout * 2);
    sources.push(
        Source::new("AllKeyShop", Arc::new(fetcher))
            .with_order_hint(hint)
            .slow_aggregator(),
    );

    SourceRegistry::new(sources)
}
