//! Challenge renderer for bot-protected sites.
//!
//! Drives a scripted browser surface through a small state machine:
//!
//! ```text
//! Idle -> Loading(url) -> {ChallengeDetected | ContentReady | LoadError | TimedOut}
//!      -> Extracting -> {Success(records) | ExtractionFailed}
//! ```
//!
//! Every terminal state releases the render surface before control returns;
//! no surface outlives its task. The concrete engine sits behind
//! [`RenderSurface`] so anything that can load a page and run a script can
//! substitute for the default chromiumoxide implementation.

#[cfg(feature = "browser")]
mod chromium;
mod extract;
mod pool;

#[cfg(feature = "browser")]
pub use chromium::ChromiumFactory;
pub use extract::{build_extract_script, validate_records, RawRecord};
pub use pool::SurfacePool;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::models::{
    generate_deal_id, seller, Deal, DealDuration, ProductType, Region, SearchCriteria, SourceKind,
};
use crate::registry::SourceFetcher;
use crate::scrapers::is_trial_title;

/// Markup fragments a still-unresolved challenge interstitial leaves behind.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "cf-challenge",
    "challenge-running",
    "challenge-platform",
    "Checking your browser",
    "Just a moment",
    "Verifying you are human",
];

/// Whether rendered markup still shows an unresolved challenge.
pub fn contains_challenge_markers(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|m| html.contains(m))
}

/// One scripted-browser page. Narrow by design: the renderer's state
/// machine never depends on a particular automation engine.
#[async_trait]
pub trait RenderSurface: Send {
    /// Navigate to the URL and wait for the navigation-finished signal.
    async fn load(&mut self, url: &str) -> Result<()>;
    /// Whether the rendered document still shows an unresolved challenge.
    async fn detect_challenge(&mut self) -> Result<bool>;
    /// Run the extraction script and return its value.
    async fn wait_and_extract(&mut self, script: &str) -> Result<serde_json::Value>;
    /// Stop navigation and release the surface. Must be safe to call in any
    /// state; after this the surface is dead.
    async fn destroy(&mut self);
}

/// Creates render surfaces on demand.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn RenderSurface>>;
}

/// Terminal state of one render.
#[derive(Debug)]
pub enum RenderOutcome {
    Success(Vec<RawRecord>),
    /// The challenge never resolved. Zero results, not an error.
    ChallengeDetected,
    LoadError(String),
    TimedOut,
    ExtractionFailed(String),
    Cancelled,
}

impl RenderOutcome {
    pub fn records(self) -> Vec<RawRecord> {
        match self {
            RenderOutcome::Success(records) => records,
            _ => Vec::new(),
        }
    }
}

/// Renderer shared by all challenge-rendered sources in a session.
pub struct ChallengeRenderer {
    factory: Arc<dyn SurfaceFactory>,
    config: RenderConfig,
    pool: SurfacePool,
}

impl ChallengeRenderer {
    pub fn new(factory: Arc<dyn SurfaceFactory>, config: RenderConfig) -> Self {
        let pool = SurfacePool::new(config.max_surfaces);
        Self { factory, config, pool }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render one URL and extract candidate records.
    ///
    /// The whole load+extract sequence runs under the configured hard
    /// timeout; cancellation and timeout both tear the surface down before
    /// returning. Only surface acquisition waits outside the timeout.
    pub async fn render(
        &self,
        url: &str,
        keywords: &[String],
        cancel: &CancellationToken,
    ) -> RenderOutcome {
        if cancel.is_cancelled() {
            return RenderOutcome::Cancelled;
        }

        let _permit = tokio::select! {
            permit = self.pool.acquire() => permit,
            _ = cancel.cancelled() => return RenderOutcome::Cancelled,
        };

        let mut surface = match self.factory.create().await {
            Ok(surface) => surface,
            Err(e) => {
                warn!(url, error = %e, "could not create render surface");
                return RenderOutcome::LoadError(e.to_string());
            }
        };

        let script = build_extract_script(keywords, &self.config);
        let sequence = self.drive(surface.as_mut(), url, &script);

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.config.page_timeout(), sequence) => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(url, timeout_secs = self.config.page_timeout_secs, "render timed out");
                        RenderOutcome::TimedOut
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!(url, "render cancelled");
                RenderOutcome::Cancelled
            }
        };

        // Teardown is unconditional and completes before the permit drops,
        // so a cancelled or timed-out render never leaks a live browser page.
        surface.destroy().await;
        outcome
    }

    /// Loading -> challenge inspection -> Extracting.
    async fn drive(
        &self,
        surface: &mut dyn RenderSurface,
        url: &str,
        script: &str,
    ) -> RenderOutcome {
        debug!(url, "loading page in render surface");
        if let Err(e) = surface.load(url).await {
            return RenderOutcome::LoadError(e.to_string());
        }

        // The challenge script needs wall-clock time after the navigation
        // signal before the real content appears.
        tokio::time::sleep(self.config.js_completion_delay()).await;

        match surface.detect_challenge().await {
            Ok(true) => {
                info!(url, "challenge still unresolved after render");
                return RenderOutcome::ChallengeDetected;
            }
            Ok(false) => {}
            Err(e) => return RenderOutcome::LoadError(e.to_string()),
        }

        match surface.wait_and_extract(script).await {
            Ok(value) => RenderOutcome::Success(validate_records(&value, &self.config)),
            Err(e) => RenderOutcome::ExtractionFailed(e.to_string()),
        }
    }
}

/// Site parameters for a challenge-rendered source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedSiteConfig {
    pub seller_name: String,
    pub search_url: String,
    pub currency: String,
    /// Keywords the extraction heuristics match anchors against.
    pub keywords: Vec<String>,
}

/// Fetch capability backed by the challenge renderer.
pub struct RenderedFetcher {
    renderer: Arc<ChallengeRenderer>,
    site: RenderedSiteConfig,
    cancel: CancellationToken,
}

impl RenderedFetcher {
    pub fn new(
        renderer: Arc<ChallengeRenderer>,
        site: RenderedSiteConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self { renderer, site, cancel }
    }

    fn record_to_deal(&self, record: RawRecord) -> Deal {
        Deal {
            id: generate_deal_id(),
            seller_name: self.site.seller_name.clone(),
            price: record.price,
            currency: self.site.currency.clone(),
            region: Region::from_listing_text(&record.title),
            product_type: ProductType::Key,
            duration: DealDuration::from_listing_text(&record.title),
            trust_level: seller::trust_for(&self.site.seller_name),
            rating: None,
            review_count: None,
            url: record.url,
            is_trial: is_trial_title(&record.title),
            fetched_at: Utc::now(),
            source_kind: SourceKind::Rendered,
        }
    }
}

#[async_trait]
impl SourceFetcher for RenderedFetcher {
    async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
        let outcome = self
            .renderer
            .render(&self.site.search_url, &self.site.keywords, &self.cancel)
            .await;

        // Challenge, timeout and load failures are all an empty contribution
        // for this source; the orchestrator falls back on empty.
        let deals = outcome
            .records()
            .into_iter()
            .map(|r| self.record_to_deal(r))
            .collect();
        Ok(deals)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::test_support::FakeFactory;
    use super::*;

    fn fast_config() -> RenderConfig {
        RenderConfig {
            page_timeout_secs: 1,
            js_completion_delay_ms: 1,
            max_surfaces: 1,
            ..RenderConfig::default()
        }
    }

    fn renderer_with(html: &str, extract: serde_json::Value) -> (ChallengeRenderer, Arc<AtomicBool>) {
        let destroyed = Arc::new(AtomicBool::new(false));
        let factory = FakeFactory {
            html: html.to_string(),
            extract_value: extract,
            destroyed: destroyed.clone(),
            load_delay: Duration::ZERO,
        };
        (
            ChallengeRenderer::new(Arc::new(factory), fast_config()),
            destroyed,
        )
    }

    #[tokio::test]
    async fn challenge_marker_yields_challenge_detected() {
        let (renderer, destroyed) = renderer_with(
            "<html><body><div id=\"cf-challenge\">Checking your browser</div></body></html>",
            serde_json::json!([]),
        );

        let outcome = renderer
            .render("https://protected.example", &[], &CancellationToken::new())
            .await;

        assert!(matches!(outcome, RenderOutcome::ChallengeDetected));
        assert!(destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn clean_page_extracts_records() {
        let (renderer, destroyed) = renderer_with(
            "<html><body>store front</body></html>",
            serde_json::json!([
                {"title": "Game Pass Ultimate 1 Month", "price": 11.49, "url": "https://s.example/1"}
            ]),
        );

        let outcome = renderer
            .render("https://shop.example", &["game pass".into()], &CancellationToken::new())
            .await;

        match outcome {
            RenderOutcome::Success(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].price, 11.49);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert!(destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn slow_load_times_out_and_destroys_surface() {
        let destroyed = Arc::new(AtomicBool::new(false));
        let factory = FakeFactory {
            html: String::new(),
            extract_value: serde_json::json!([]),
            destroyed: destroyed.clone(),
            load_delay: Duration::from_secs(30),
        };
        let renderer = ChallengeRenderer::new(Arc::new(factory), fast_config());

        let outcome = renderer
            .render("https://slow.example", &[], &CancellationToken::new())
            .await;

        assert!(matches!(outcome, RenderOutcome::TimedOut));
        assert!(destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_destroys_surface_before_returning() {
        let destroyed = Arc::new(AtomicBool::new(false));
        let factory = FakeFactory {
            html: String::new(),
            extract_value: serde_json::json!([]),
            destroyed: destroyed.clone(),
            load_delay: Duration::from_secs(30),
        };
        let renderer = ChallengeRenderer::new(Arc::new(factory), fast_config());

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let outcome = renderer.render("https://slow.example", &[], &cancel).await;

        assert!(matches!(outcome, RenderOutcome::Cancelled));
        assert!(destroyed.load(Ordering::SeqCst));
    }

    #[test]
    fn marker_scan_matches_known_interstitials() {
        assert!(contains_challenge_markers("<div class=\"challenge-running\"></div>"));
        assert!(contains_challenge_markers("Just a moment..."));
        assert!(!contains_challenge_markers("<div class=\"product-card\"></div>"));
    }
}
