//! End-to-end search scenarios over the engine with fake sources.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use dealscout::browser::{
    ChallengeRenderer, RenderOutcome, RenderSurface, RenderedFetcher, RenderedSiteConfig,
    SurfaceFactory,
};
use dealscout::config::{EngineConfig, RenderConfig};
use dealscout::fallback::{FallbackCascade, ReferenceCatalog};
use dealscout::{
    Deal, DealDuration, ProductType, Region, Result, ScrapeError, SearchCriteria, SearchEngine,
    SearchOutcome, Source, SourceFetcher, SourceKind, SourceRegistry, TrustLevel,
};

fn deal(seller: &str, price: f64, region: Region, duration: DealDuration) -> Deal {
    Deal {
        id: format!("{}-{}-{}", seller, price, duration.months()),
        seller_name: seller.to_string(),
        price,
        currency: "EUR".to_string(),
        region,
        product_type: ProductType::Key,
        duration,
        trust_level: TrustLevel::High,
        rating: None,
        review_count: None,
        url: format!("https://{}.example/offer", seller.to_lowercase()),
        is_trial: false,
        fetched_at: Utc::now(),
        source_kind: SourceKind::Live,
    }
}

struct FixedFetcher(Vec<Deal>);

#[async_trait]
impl SourceFetcher for FixedFetcher {
    async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
        Ok(self.0.clone())
    }
}

struct FailingFetcher;

#[async_trait]
impl SourceFetcher for FailingFetcher {
    async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
        Err(ScrapeError::SourceFetch {
            source_name: "failing".into(),
            message: "connection refused".into(),
        })
    }
}

struct SlowFetcher;

#[async_trait]
impl SourceFetcher for SlowFetcher {
    async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(vec![deal("Slow", 1.0, Region::Global, DealDuration::OneMonth)])
    }
}

fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.batch.pause_ms = 0;
    config.retry.max_retries = 1;
    config.retry.base_timeout_ms = 200;
    config.retry.increment_ms = 0;
    config.retry.backoff_min_ms = 0;
    config.retry.backoff_max_ms = 1;
    config
}

#[tokio::test]
async fn one_failing_source_never_aborts_the_batch() {
    let registry = SourceRegistry::new(vec![
        Source::new("A", Arc::new(FailingFetcher)),
        Source::new(
            "B",
            Arc::new(FixedFetcher(vec![
                deal("B", 12.99, Region::Global, DealDuration::OneMonth),
                deal("B", 32.99, Region::Global, DealDuration::ThreeMonths),
            ])),
        ),
        Source::new(
            "C",
            Arc::new(FixedFetcher(vec![deal(
                "C",
                11.49,
                Region::Global,
                DealDuration::OneMonth,
            )])),
        ),
    ]);

    let engine = SearchEngine::new(registry, fast_config())
        .with_fallback(FallbackCascade::new(Arc::new(EmptyCatalog)));
    let outcome = engine
        .search(&SearchCriteria::default(), |_| {}, |_| {})
        .await;

    match outcome {
        SearchOutcome::Success { deals, total_found, sources_searched, .. } => {
            assert_eq!(deals.len(), 3);
            assert_eq!(total_found, 3);
            assert_eq!(sources_searched, 3);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn filter_drops_trials_and_output_is_price_sorted() {
    let mut trial = deal("TrialShop", 9.89, Region::Global, DealDuration::OneMonth);
    trial.is_trial = true;

    let registry = SourceRegistry::new(vec![
        Source::new(
            "One",
            Arc::new(FixedFetcher(vec![deal(
                "One",
                12.99,
                Region::Global,
                DealDuration::OneMonth,
            )])),
        ),
        Source::new("Two", Arc::new(FixedFetcher(vec![trial]))),
        Source::new(
            "Three",
            Arc::new(FixedFetcher(vec![deal(
                "Three",
                11.29,
                Region::Global,
                DealDuration::OneMonth,
            )])),
        ),
    ]);

    let criteria = SearchCriteria {
        region: Region::Global,
        exclude_trials: true,
        ..SearchCriteria::default()
    };
    let engine = SearchEngine::new(registry, fast_config());
    let outcome = engine.search(&criteria, |_| {}, |_| {}).await;

    match outcome {
        SearchOutcome::Success { deals, .. } => {
            let prices: Vec<f64> = deals.iter().map(|d| d.price).collect();
            assert_eq!(prices, vec![11.29, 12.99]);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

struct EmptyCatalog;

impl ReferenceCatalog for EmptyCatalog {
    fn find_by_seller(&self, _seller_name: &str) -> Vec<Deal> {
        Vec::new()
    }
    fn find_by_criteria(&self, _criteria: &SearchCriteria) -> Vec<Deal> {
        Vec::new()
    }
}

#[tokio::test]
async fn all_sources_failing_yields_empty_then_reference_data() {
    let registry = SourceRegistry::new(vec![
        Source::new("A", Arc::new(FailingFetcher)),
        Source::new("B", Arc::new(FailingFetcher)),
    ]);

    // No per-seller reference data either, so the session comes up empty.
    let engine = SearchEngine::new(registry, fast_config())
        .with_fallback(FallbackCascade::new(Arc::new(EmptyCatalog)));

    let criteria = SearchCriteria::default();
    let outcome = engine.search(&criteria, |_| {}, |_| {}).await;
    assert!(matches!(outcome, SearchOutcome::Empty));

    // Caller-level recovery: same criteria against the built-in catalog.
    let cascade = FallbackCascade::default();
    let reference = cascade.get_for_criteria(&criteria);
    assert!(!reference.is_empty());
    assert!(reference.iter().all(|d| d.source_kind == SourceKind::Fallback));
}

#[tokio::test]
async fn slow_source_contributes_nothing_but_session_completes() {
    let registry = SourceRegistry::new(vec![
        Source::new("Slow", Arc::new(SlowFetcher)),
        Source::new(
            "Fast",
            Arc::new(FixedFetcher(vec![deal(
                "Fast",
                10.99,
                Region::Global,
                DealDuration::OneMonth,
            )])),
        ),
    ]);

    let engine = SearchEngine::new(registry, fast_config());
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        engine.search(&SearchCriteria::default(), |_| {}, |_| {}),
    )
    .await
    .expect("session must complete despite the slow source");

    match outcome {
        SearchOutcome::Success { deals, .. } => {
            assert_eq!(deals.len(), 1);
            assert_eq!(deals[0].seller_name, "Fast");
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn progress_counts_are_complete_and_monotonic() {
    let registry = SourceRegistry::new(vec![
        Source::new(
            "One",
            Arc::new(FixedFetcher(vec![deal(
                "One",
                10.0,
                Region::Global,
                DealDuration::OneMonth,
            )])),
        ),
        Source::new(
            "Two",
            Arc::new(FixedFetcher(vec![deal(
                "Two",
                11.0,
                Region::Global,
                DealDuration::OneMonth,
            )])),
        ),
        Source::new(
            "Three",
            Arc::new(FixedFetcher(vec![deal(
                "Three",
                12.0,
                Region::Global,
                DealDuration::ThreeMonths,
            )])),
        ),
        Source::new("Four", Arc::new(FailingFetcher)),
    ]);

    let engine = SearchEngine::new(registry, fast_config());
    let completions = Mutex::new(Vec::new());
    let partial_counts = Mutex::new(Vec::new());

    let outcome = engine
        .search(
            &SearchCriteria::default(),
            |progress| completions.lock().unwrap().push(progress.sources_completed),
            |partial| partial_counts.lock().unwrap().push(partial.len()),
        )
        .await;
    assert!(outcome.is_success());

    let completions = completions.into_inner().unwrap();
    assert_eq!(*completions.iter().max().unwrap(), 4);
    let partial_counts = partial_counts.into_inner().unwrap();
    assert_eq!(partial_counts.len(), 4);
    assert!(partial_counts.windows(2).all(|w| w[0] <= w[1]));
}

struct ChallengedSurface;

#[async_trait]
impl RenderSurface for ChallengedSurface {
    async fn load(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }
    async fn detect_challenge(&mut self) -> Result<bool> {
        Ok(true)
    }
    async fn wait_and_extract(&mut self, _script: &str) -> Result<serde_json::Value> {
        panic!("extraction must not run after an unresolved challenge");
    }
    async fn destroy(&mut self) {}
}

struct ChallengedFactory;

#[async_trait]
impl SurfaceFactory for ChallengedFactory {
    async fn create(&self) -> Result<Box<dyn RenderSurface>> {
        Ok(Box::new(ChallengedSurface))
    }
}

#[tokio::test]
async fn unresolved_challenge_degrades_to_fallback_for_that_source() {
    let render_config = RenderConfig {
        js_completion_delay_ms: 1,
        page_timeout_secs: 2,
        ..RenderConfig::default()
    };
    let renderer = Arc::new(ChallengeRenderer::new(
        Arc::new(ChallengedFactory),
        render_config,
    ));

    // The renderer itself reports the challenge.
    let outcome = renderer
        .render("https://protected.example", &[], &CancellationToken::new())
        .await;
    assert!(matches!(outcome, RenderOutcome::ChallengeDetected));

    // Routed through the engine, the source degrades to reference data.
    let site = RenderedSiteConfig {
        seller_name: "Kinguin".into(),
        search_url: "https://protected.example".into(),
        currency: "EUR".into(),
        keywords: vec!["game pass".into()],
    };
    let fetcher = RenderedFetcher::new(renderer, site, CancellationToken::new());
    let registry = SourceRegistry::new(vec![
        Source::new("Kinguin", Arc::new(fetcher)).challenge_rendered(),
    ]);

    let engine = SearchEngine::new(registry, fast_config());
    let outcome = engine
        .search(&SearchCriteria::default(), |_| {}, |_| {})
        .await;

    match outcome {
        SearchOutcome::Success { deals, .. } => {
            assert!(!deals.is_empty());
            assert!(deals.iter().all(|d| d.seller_name == "Kinguin"));
            assert!(deals.iter().all(|d| d.source_kind == SourceKind::Fallback));
        }
        other => panic!("expected fallback success, got {:?}", other),
    }
}

/// Surface whose load never finishes on its own and which records teardown.
struct SlowSurface {
    destroyed: Arc<std::sync::atomic::AtomicBool>,
}

#[async_trait]
impl RenderSurface for SlowSurface {
    async fn load(&mut self, _url: &str) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
    async fn detect_challenge(&mut self) -> Result<bool> {
        Ok(false)
    }
    async fn wait_and_extract(&mut self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!([]))
    }
    async fn destroy(&mut self) {
        self.destroyed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

struct SlowFactory {
    destroyed: Arc<std::sync::atomic::AtomicBool>,
}

#[async_trait]
impl SurfaceFactory for SlowFactory {
    async fn create(&self) -> Result<Box<dyn RenderSurface>> {
        Ok(Box::new(SlowSurface { destroyed: self.destroyed.clone() }))
    }
}

#[tokio::test]
async fn cancelling_a_session_tears_down_in_flight_render_surfaces() {
    let destroyed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let render_config = RenderConfig {
        // Far beyond the cancellation point, so only the token can end the render.
        page_timeout_secs: 120,
        js_completion_delay_ms: 1,
        ..RenderConfig::default()
    };
    let renderer = Arc::new(ChallengeRenderer::new(
        Arc::new(SlowFactory { destroyed: destroyed.clone() }),
        render_config,
    ));

    let cancel = CancellationToken::new();
    let site = RenderedSiteConfig {
        seller_name: "Kinguin".into(),
        search_url: "https://protected.example".into(),
        currency: "EUR".into(),
        keywords: vec!["game pass".into()],
    };
    let fetcher = RenderedFetcher::new(renderer, site, cancel.clone());
    let registry = SourceRegistry::new(vec![
        Source::new("Kinguin", Arc::new(fetcher)).challenge_rendered(),
    ]);

    let engine = SearchEngine::new(registry, fast_config())
        .with_fallback(FallbackCascade::new(Arc::new(EmptyCatalog)))
        .with_cancellation(cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        engine.search(&SearchCriteria::default(), |_| {}, |_| {}),
    )
    .await
    .expect("cancelled session must return promptly");
    assert!(matches!(outcome, SearchOutcome::Empty));

    // The renderer must have been allowed to run its teardown before the
    // session returned; a dropped-in-flight render would leave this false.
    assert!(destroyed.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn cancellation_stops_outstanding_sources() {
    let registry = SourceRegistry::new(vec![
        Source::new("Slow", Arc::new(SlowFetcher)),
        Source::new("AlsoSlow", Arc::new(SlowFetcher)),
    ]);

    let cancel = CancellationToken::new();
    let engine = SearchEngine::new(registry, fast_config())
        .with_fallback(FallbackCascade::new(Arc::new(EmptyCatalog)))
        .with_cancellation(cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        engine.search(&SearchCriteria::default(), |_| {}, |_| {}),
    )
    .await
    .expect("cancelled session must return promptly");
    assert!(matches!(outcome, SearchOutcome::Empty));
}
