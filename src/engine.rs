//! Fetch orchestrator: batched concurrent search across all sources.
//!
//! Sources run in fixed-size concurrent batches; a fault or timeout in one
//! source degrades to a fallback or empty contribution for that source only
//! and never aborts the batch. The running aggregate has exactly one writer,
//! the fold loop below, which runs in the orchestrator's own control flow
//! after each source task completes. Worker tasks never touch it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::merge;
use crate::config::EngineConfig;
use crate::fallback::FallbackCascade;
use crate::models::{Deal, SearchCriteria, SearchOutcome, SearchProgress};
use crate::registry::SourceRegistry;
use crate::scrapers::fetch_with_retry;
use crate::store::DealStore;

/// Search engine over a fixed source registry.
pub struct SearchEngine {
    registry: SourceRegistry,
    fallback: FallbackCascade,
    config: EngineConfig,
    store: Option<Arc<dyn DealStore>>,
    cancel: CancellationToken,
}

impl SearchEngine {
    pub fn new(registry: SourceRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            fallback: FallbackCascade::default(),
            config,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackCascade) -> Self {
        self.fallback = fallback;
        self
    }

    /// Write-through sink for finished aggregates.
    pub fn with_store(mut self, store: Arc<dyn DealStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops all outstanding fetch and render work when
    /// cancelled. Cancelled workers contribute nothing to the aggregate.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn fallback(&self) -> &FallbackCascade {
        &self.fallback
    }

    /// Run one search session.
    ///
    /// `on_progress` and `on_partial` fire from this control flow, once per
    /// completed source, in completion order within a batch. The aggregate
    /// deal count is monotonically non-decreasing across `on_partial` calls.
    pub async fn search<P, L>(
        &self,
        criteria: &SearchCriteria,
        on_progress: P,
        on_partial: L,
    ) -> SearchOutcome
    where
        P: Fn(SearchProgress),
        L: Fn(&[Deal]),
    {
        let started = Instant::now();
        let sources = self.registry.list().to_vec();
        let total_sources = sources.len();

        info!(criteria = %criteria.describe(), total_sources, "starting search");

        let mut aggregate: Vec<Deal> = Vec::new();
        let mut completed = 0usize;
        let batch_size = self.config.batch.size.max(1);
        let batch_count = total_sources.div_ceil(batch_size);

        for (batch_index, batch) in sources.chunks(batch_size).enumerate() {
            let mut tasks: JoinSet<(String, Vec<Deal>)> = JoinSet::new();

            for source in batch {
                on_progress(SearchProgress {
                    current_source_label: source.name.clone(),
                    sources_completed: completed,
                    total_sources,
                    deals_found_so_far: aggregate.len(),
                });

                let name = source.name.clone();
                let fetcher = source.fetcher.clone();
                let rendered = source.needs_challenge_render;
                let criteria = criteria.clone();
                let retry = self.config.retry.clone();
                let fallback = self.fallback.clone();
                let cancel = self.cancel.clone();

                tasks.spawn(async move {
                    let work = async {
                        // Rendered sources carry their own timeout machinery;
                        // plain HTTP sources go through the retry wrapper.
                        let fetched = if rendered {
                            fetcher.fetch(&criteria).await
                        } else {
                            fetch_with_retry(&name, fetcher.as_ref(), &criteria, &retry).await
                        };

                        let deals = match fetched {
                            Ok(deals) if !deals.is_empty() => deals,
                            Ok(_) => {
                                debug!(source = %name, "no live deals, using fallback");
                                fallback.get_for_source(&name)
                            }
                            Err(e) => {
                                warn!(source = %name, error = %e, "source failed, using fallback");
                                fallback.get_for_source(&name)
                            }
                        };

                        deals.into_iter().filter(|d| criteria.matches(d)).collect()
                    };

                    // Rendered fetchers watch the token themselves and must
                    // run to completion so the renderer can tear down its
                    // surface; dropping their future mid-flight would strand
                    // it. Plain HTTP fetches hold nothing that needs
                    // teardown, so those are raced against cancellation.
                    let filtered: Vec<Deal> = if rendered {
                        let deals = work.await;
                        if cancel.is_cancelled() {
                            debug!(source = %name, "source fetch cancelled");
                            Vec::new()
                        } else {
                            deals
                        }
                    } else {
                        tokio::select! {
                            deals = work => deals,
                            _ = cancel.cancelled() => {
                                debug!(source = %name, "source fetch cancelled");
                                Vec::new()
                            }
                        }
                    };
                    (name, filtered)
                });
            }

            // Fold in completion order. A panicked task is an empty
            // contribution, same as any other per-source fault.
            while let Some(joined) = tasks.join_next().await {
                let (name, deals) = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "source task aborted");
                        ("(failed source)".to_string(), Vec::new())
                    }
                };

                aggregate = merge(aggregate, deals, criteria.region);
                completed += 1;

                on_partial(&aggregate);
                on_progress(SearchProgress {
                    current_source_label: name,
                    sources_completed: completed,
                    total_sources,
                    deals_found_so_far: aggregate.len(),
                });
            }

            let last_batch = batch_index + 1 == batch_count;
            if !last_batch && !self.cancel.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(self.config.batch.pause_ms)).await;
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(store) = &self.store {
            if let Err(e) = store.put(&aggregate).await {
                warn!(error = %e, "failed to persist search results");
            }
        }

        if aggregate.is_empty() {
            info!(elapsed_ms, "search finished with no deals");
            return SearchOutcome::Empty;
        }

        info!(
            deals = aggregate.len(),
            elapsed_ms, sources = total_sources, "search finished"
        );
        let total_found = aggregate.len();
        SearchOutcome::Success {
            deals: aggregate,
            total_found,
            elapsed_ms,
            sources_searched: total_sources,
        }
    }
}
