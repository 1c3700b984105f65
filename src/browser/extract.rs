//! In-page extraction script and record validation.
//!
//! The script walks the rendered DOM with generic heuristics instead of
//! per-site selectors: anchors whose URL or nearby text matches the product
//! keywords, then the closest card-like ancestor for a price. Whatever the
//! page returns is re-validated on the Rust side with the same bounds, since
//! the engine behind the surface trait is substitutable.

use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;

/// Candidate record emitted by the extraction script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: String,
    pub price: f64,
    pub url: String,
}

/// Template for the injected extraction script. Placeholders are filled by
/// [`build_extract_script`].
const EXTRACT_SCRIPT_TEMPLATE: &str = r#"
(function() {
    const KEYWORDS = __KEYWORDS__;
    const MAX_RECORDS = __MAX_RECORDS__;
    const MIN_TITLE_LEN = __MIN_TITLE_LEN__;
    const MIN_PRICE = __MIN_PRICE__;
    const MAX_PRICE = __MAX_PRICE__;

    function matchesKeywords(text) {
        const lower = (text || '').toLowerCase();
        return KEYWORDS.some(k => lower.includes(k));
    }

    function parsePrice(text) {
        if (!text) return null;
        const m = text.replace(/\s/g, '').match(/[0-9][0-9.,]*/);
        if (!m) return null;
        let raw = m[0];
        const dot = raw.lastIndexOf('.');
        const comma = raw.lastIndexOf(',');
        if (dot !== -1 && comma !== -1) {
            // Later separator is the decimal point.
            raw = comma > dot
                ? raw.replace(/\./g, '').replace(',', '.')
                : raw.replace(/,/g, '');
        } else if (comma !== -1) {
            raw = raw.replace(',', '.');
        }
        const price = parseFloat(raw);
        if (!isFinite(price) || price < MIN_PRICE || price > MAX_PRICE) return null;
        return price;
    }

    // Card-like containers, nearest first.
    function findCard(el) {
        let node = el;
        for (let depth = 0; node && depth < 6; depth++) {
            const cls = (node.className || '').toString().toLowerCase();
            if (/(card|product|item|offer|row|tile)/.test(cls)) return node;
            node = node.parentElement;
        }
        return el.parentElement || el;
    }

    const seen = new Set();
    const records = [];

    const anchors = Array.from(document.querySelectorAll('a[href]'));
    for (const anchor of anchors) {
        if (records.length >= MAX_RECORDS) break;

        const href = anchor.href || '';
        const text = anchor.textContent || '';
        if (!matchesKeywords(href) && !matchesKeywords(text)) continue;

        const card = findCard(anchor);
        const title = (text.trim().length >= MIN_TITLE_LEN
            ? text
            : (card.querySelector('h1,h2,h3,h4,[class*="title"],[class*="name"]') || anchor).textContent || ''
        ).trim().replace(/\s+/g, ' ');
        if (title.length < MIN_TITLE_LEN) continue;

        const priceEl = card.querySelector('[class*="price"],[data-price]') || card;
        const price = parsePrice(priceEl.textContent);
        if (price === null) continue;

        const key = title + '|' + href;
        if (seen.has(key)) continue;
        seen.add(key);

        records.push({ title: title, price: price, url: href });
    }

    return JSON.stringify(records);
})()
"#;

/// Fill the extraction template for one render.
pub fn build_extract_script(keywords: &[String], config: &RenderConfig) -> String {
    let keyword_array = serde_json::to_string(
        &keywords.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>(),
    )
    .unwrap_or_else(|_| "[]".to_string());

    EXTRACT_SCRIPT_TEMPLATE
        .replace("__KEYWORDS__", &keyword_array)
        .replace("__MAX_RECORDS__", &config.max_records_per_page.to_string())
        .replace("__MIN_TITLE_LEN__", &config.min_title_len.to_string())
        .replace("__MIN_PRICE__", &format!("{:.2}", config.min_price))
        .replace("__MAX_PRICE__", &format!("{:.2}", config.max_price))
}

/// Parse and re-validate script output. The engine behind the surface trait
/// may be anything, so the script's own guardrails are not trusted.
pub fn validate_records(value: &serde_json::Value, config: &RenderConfig) -> Vec<RawRecord> {
    // Engines differ on whether evaluate() returns the JSON string or the
    // already-parsed structure.
    let parsed: serde_json::Value = match value {
        serde_json::Value::String(s) => match serde_json::from_str(s) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        },
        other => other.clone(),
    };

    let Some(items) = parsed.as_array() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for item in items {
        if records.len() >= config.max_records_per_page {
            break;
        }
        let Ok(record) = serde_json::from_value::<RawRecord>(item.clone()) else {
            continue;
        };
        if record.title.trim().len() < config.min_title_len {
            continue;
        }
        if !record.price.is_finite()
            || record.price < config.min_price
            || record.price > config.max_price
        {
            continue;
        }
        if record.url.is_empty() {
            continue;
        }
        records.push(record);
    }
    records
}
