//! HTTP client for live source fetches.
//!
//! Sends full browser-like headers and sleeps a randomized pacing interval
//! before each request; retail sites rate-limit and fingerprint aggressively,
//! and a burst of bare requests is the fastest way to get every source
//! blocked at once.

use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::debug;

use super::user_agent::resolve_user_agent;
use crate::config::PacingConfig;
use crate::error::Result;

/// HTTP client with human pacing and realistic headers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    pacing: PacingConfig,
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));
    headers
}

impl HttpClient {
    /// Create a new client. `user_agent` follows
    /// [`resolve_user_agent`](super::user_agent::resolve_user_agent).
    pub fn new(pacing: PacingConfig, user_agent: Option<&str>) -> Self {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .default_headers(browser_headers())
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, pacing }
    }

    /// Fetch a page body with a per-request timeout.
    ///
    /// Non-2xx statuses are returned as page text rather than errors; some
    /// sites serve usable listings on error pages and the selector layer
    /// decides what counts as empty.
    pub async fn get_text(&self, url: &str, timeout: Duration) -> Result<String> {
        self.pace().await;

        let start = Instant::now();
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(
            url,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "fetched page"
        );

        Ok(body)
    }

    /// Sleep a randomized interval to mimic human request pacing.
    async fn pace(&self) {
        if self.pacing.max_ms == 0 {
            return;
        }
        let delay_ms = {
            let mut rng = rand::rng();
            rng.random_range(self.pacing.min_ms..=self.pacing.max_ms.max(self.pacing.min_ms))
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}
