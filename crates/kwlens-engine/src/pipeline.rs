//! Research pipeline orchestration.
//!
//! One logical worker per run: collect → aggregate → compare → find
//! opportunities → analyze gaps → enhance → assemble, then write through
//! the cache and the persistent store. All collaborators are injected;
//! nothing here is a process-wide singleton.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use kwlens_core::{
    validate_product_ids, ProgressSender, ResearchOptions, ResearchPhase, ResearchSession,
    SessionSummary,
};

use crate::cache::CacheFacade;
use crate::collector::KeywordCollector;
use crate::comparison::build_comparison;
use crate::enhance::{EnhanceConfig, Enhancer};
use crate::error::EngineError;
use crate::gaps::analyze_gaps;
use crate::opportunity::OpportunityFinder;
use crate::reconstruct::reconstruct_session;
use crate::traits::{KeywordDataProvider, ResultCache, SessionStore, StoreError};

/// Pipeline-level knobs. The delays preserve the effective throughput
/// ceiling the provider tolerates; see [`EnhanceConfig`] for the
/// enrichment-phase shape.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Delay between products during collection, in milliseconds.
    pub collect_delay_ms: u64,
    pub enhance: EnhanceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collect_delay_ms: 500,
            enhance: EnhanceConfig::default(),
        }
    }
}

/// Outcome of one research run.
#[derive(Debug)]
pub struct CompletedResearch {
    /// Persistent id of the stored session; `None` when the store write
    /// failed (the run still completes with best-effort data).
    pub session_id: Option<Uuid>,
    pub session: ResearchSession,
}

/// The research engine. Construct once with injected collaborators and
/// reuse across runs; each run's mutable state is local to the call.
pub struct ResearchPipeline {
    provider: Arc<dyn KeywordDataProvider>,
    cache: CacheFacade,
    store: Arc<dyn SessionStore>,
    config: PipelineConfig,
}

impl ResearchPipeline {
    #[must_use]
    pub fn new(
        provider: Arc<dyn KeywordDataProvider>,
        cache: Arc<dyn ResultCache>,
        store: Arc<dyn SessionStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            cache: CacheFacade::new(cache),
            store,
            config,
        }
    }

    /// Run a full research pass over `product_ids` (index 0 is the primary
    /// product).
    ///
    /// Per-product provider failures are recorded on the affected product
    /// and never abort the run; enhancement and persistence failures
    /// degrade to best-effort. The only hard failure is input validation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the product id list is
    /// malformed — checked before any provider call.
    pub async fn research_keywords(
        &self,
        user_id: &str,
        product_ids: &[String],
        options: ResearchOptions,
        name: Option<&str>,
        progress: &ProgressSender,
    ) -> Result<CompletedResearch, EngineError> {
        validate_product_ids(product_ids)?;

        progress.send(
            ResearchPhase::Extraction,
            format!("starting keyword extraction for {} products", product_ids.len()),
            0,
        );

        let collector = KeywordCollector::new(Arc::clone(&self.provider), self.config.collect_delay_ms);
        let collections = collector.collect_all(product_ids, &options, progress).await;

        progress.send(
            ResearchPhase::Aggregation,
            "aggregating keywords across products",
            50,
        );
        let aggregated = crate::aggregator::aggregate(&collections);

        let comparisons: Vec<_> = collections.iter().map(build_comparison).collect();

        let finder = OpportunityFinder::new(Arc::clone(&self.provider));
        let mut opportunities = finder
            .find(&collections, &aggregated, &options, progress)
            .await;

        progress.send(ResearchPhase::GapAnalysis, "analyzing competitive gaps", 85);
        let mut gaps = analyze_gaps(&collections, &options);

        if options.enhancement {
            progress.send(
                ResearchPhase::Enhancement,
                "enriching top keywords",
                90,
            );
            // The enrichment selection spans the primary list and the mined
            // extras as one pool; split back apart afterwards.
            let split = opportunities.opportunities.len();
            let mut pool = std::mem::take(&mut opportunities.opportunities);
            pool.append(&mut opportunities.mined);

            let mut gap_records = gaps.as_mut().map(|g| std::mem::take(&mut g.gaps)).unwrap_or_default();

            let enhancer = Enhancer::new(Arc::clone(&self.provider), self.config.enhance);
            let enhanced = enhancer.enhance(&mut pool, &mut gap_records, progress).await;
            tracing::info!(enhanced, "enhancement phase finished");

            let mined = pool.split_off(split);
            opportunities.opportunities = pool;
            opportunities.mined = mined;
            if let Some(g) = gaps.as_mut() {
                g.gaps = gap_records;
            }
            progress.send(ResearchPhase::Enhancement, "enrichment complete", 95);
        }

        let session = ResearchSession {
            products: product_ids.to_vec(),
            options,
            collections,
            aggregated,
            comparisons,
            opportunities,
            gaps,
            created_at: Utc::now(),
        };

        // Persistence and caching are write-through best-effort: a storage
        // problem costs durability, not the result the caller is waiting on.
        let session_id = match self.store.save_session(user_id, name, &session).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist session — returning unsaved result");
                None
            }
        };
        if let Some(id) = session_id {
            self.cache.put_session(user_id, id, &session).await;
            self.cache.invalidate_session_list(user_id).await;
        }

        progress.send(ResearchPhase::Complete, "research complete", 100);

        Ok(CompletedResearch {
            session_id,
            session,
        })
    }

    /// Load a stored session: cache first, then a deterministic rebuild
    /// from the persistent store on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SessionNotFound`] when the id is unknown for
    /// this user — including when the store itself errors, which is
    /// deliberately not distinguished for the caller.
    pub async fn load_session(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<ResearchSession, EngineError> {
        if let Some(session) = self.cache.get_session(user_id, session_id).await {
            tracing::debug!(%session_id, "session served from cache");
            return Ok(session);
        }

        let rows = match self.store.fetch_session_rows(user_id, session_id).await {
            Ok(Some(rows)) => rows,
            Ok(None) => return Err(EngineError::SessionNotFound),
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "store fetch failed during reconstruction");
                return Err(EngineError::SessionNotFound);
            }
        };

        let session = reconstruct_session(rows);
        self.cache.put_session(user_id, session_id, &session).await;
        Ok(session)
    }

    /// List a user's stored sessions (cached for a short interval).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the store listing fails.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, EngineError> {
        if let Some(sessions) = self.cache.get_session_list(user_id).await {
            return Ok(sessions);
        }
        let sessions = self.store.list_sessions(user_id).await?;
        self.cache.put_session_list(user_id, &sessions).await;
        Ok(sessions)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::SessionNotFound`] for unknown ids, or
    /// [`EngineError::Store`] on backend failure.
    pub async fn delete_session(&self, user_id: &str, session_id: Uuid) -> Result<(), EngineError> {
        match self.store.delete_session(user_id, session_id).await {
            Ok(()) => {
                self.cache.invalidate(user_id, Some(session_id)).await;
                Ok(())
            }
            Err(StoreError::NotFound) => Err(EngineError::SessionNotFound),
            Err(e) => Err(EngineError::Store(e)),
        }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::SessionNotFound`] for unknown ids, or
    /// [`EngineError::Store`] on backend failure.
    pub async fn rename_session(
        &self,
        user_id: &str,
        session_id: Uuid,
        name: &str,
    ) -> Result<(), EngineError> {
        match self.store.rename_session(user_id, session_id, name).await {
            Ok(()) => {
                self.cache.invalidate_session_list(user_id).await;
                Ok(())
            }
            Err(StoreError::NotFound) => Err(EngineError::SessionNotFound),
            Err(e) => Err(EngineError::Store(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testutil::{occurrence, MockProvider, MockStore};
    use kwlens_core::ProductStatus;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            collect_delay_ms: 0,
            enhance: EnhanceConfig {
                batch_size: 3,
                item_delay_ms: 0,
                batch_delay_ms: 0,
                mining_size: 10,
            },
        }
    }

    fn pipeline_with(provider: MockProvider) -> (ResearchPipeline, Arc<MockProvider>, Arc<MockStore>) {
        let provider = Arc::new(provider);
        let store = Arc::new(MockStore::default());
        let pipeline = ResearchPipeline::new(
            Arc::clone(&provider) as Arc<dyn KeywordDataProvider>,
            Arc::new(MemoryCache::new()),
            Arc::clone(&store) as Arc<dyn SessionStore>,
            fast_config(),
        );
        (pipeline, provider, store)
    }

    fn two_product_provider() -> MockProvider {
        MockProvider::new()
            .with_asin(
                "B000000001",
                vec![
                    occurrence("wireless mouse", 6_000, 1.5, Some(18)),
                    occurrence("desk mat", 1_200, 0.4, None),
                ],
            )
            .with_asin(
                "B000000002",
                vec![
                    occurrence("wireless mouse", 6_000, 1.5, Some(4)),
                    occurrence("desk mat", 1_200, 0.4, Some(70)),
                ],
            )
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn full_run_produces_all_components() {
        let (pipeline, _, store) = pipeline_with(two_product_provider());
        let result = pipeline
            .research_keywords(
                "u1",
                &ids(&["B000000001", "B000000002"]),
                ResearchOptions::default(),
                Some("mouse research"),
                &ProgressSender::disabled(),
            )
            .await
            .unwrap();

        let session = &result.session;
        assert_eq!(session.products.len(), 2);
        assert_eq!(session.comparisons.len(), 2);
        assert!(!session.aggregated.is_empty());
        assert!(session.gaps.is_some(), "two successful products → gap analysis");
        assert!(result.session_id.is_some());
        assert_eq!(store.saved_count(), 1);
    }

    #[tokio::test]
    async fn validation_fails_before_any_provider_call() {
        let (pipeline, provider, _) = pipeline_with(two_product_provider());
        let err = pipeline
            .research_keywords(
                "u1",
                &ids(&["not-an-asin"]),
                ResearchOptions::default(),
                None,
                &ProgressSender::disabled(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        assert!(provider.reverse_calls().is_empty(), "no provider call on bad input");
    }

    #[tokio::test]
    async fn single_product_run_has_no_gap_analysis() {
        let (pipeline, _, _) = pipeline_with(two_product_provider());
        let result = pipeline
            .research_keywords(
                "u1",
                &ids(&["B000000001"]),
                ResearchOptions::default(),
                None,
                &ProgressSender::disabled(),
            )
            .await
            .unwrap();

        assert!(result.session.gaps.is_none());
        assert!(!result.session.aggregated.is_empty());
    }

    #[tokio::test]
    async fn all_products_failing_still_completes() {
        let provider = MockProvider::new()
            .with_failure("B000000001", "boom")
            .with_failure("B000000002", "boom");
        let (pipeline, _, _) = pipeline_with(provider);

        let result = pipeline
            .research_keywords(
                "u1",
                &ids(&["B000000001", "B000000002"]),
                ResearchOptions::default(),
                None,
                &ProgressSender::disabled(),
            )
            .await
            .unwrap();

        let session = &result.session;
        assert!(session.aggregated.is_empty());
        assert!(session.opportunities.opportunities.is_empty());
        assert!(session.gaps.is_none());
        assert!(session
            .collections
            .iter()
            .all(|c| matches!(c.status, ProductStatus::Failed(_))));
    }

    #[tokio::test]
    async fn load_session_hits_cache_then_reconstructs() {
        let (pipeline, _, store) = pipeline_with(two_product_provider());
        let result = pipeline
            .research_keywords(
                "u1",
                &ids(&["B000000001", "B000000002"]),
                ResearchOptions::default(),
                None,
                &ProgressSender::disabled(),
            )
            .await
            .unwrap();
        let session_id = result.session_id.unwrap();

        // Warm read comes from cache (no store fetch).
        let cached = pipeline.load_session("u1", session_id).await.unwrap();
        assert_eq!(store.fetch_count(), 0);

        // Cold read reconstructs from rows and matches the live scores.
        pipeline.cache.invalidate("u1", None).await;
        let rebuilt = pipeline.load_session("u1", session_id).await.unwrap();
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(cached.aggregated.len(), rebuilt.aggregated.len());
        for (a, b) in cached.aggregated.iter().zip(&rebuilt.aggregated) {
            assert_eq!(a.keyword, b.keyword);
            assert_eq!(a.opportunity_score, b.opportunity_score);
        }
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (pipeline, _, _) = pipeline_with(two_product_provider());
        let err = pipeline.load_session("u1", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound));
    }

    #[tokio::test]
    async fn rename_and_delete_round_trip() {
        let (pipeline, _, _) = pipeline_with(two_product_provider());
        let result = pipeline
            .research_keywords(
                "u1",
                &ids(&["B000000001", "B000000002"]),
                ResearchOptions::default(),
                Some("before"),
                &ProgressSender::disabled(),
            )
            .await
            .unwrap();
        let session_id = result.session_id.unwrap();

        pipeline
            .rename_session("u1", session_id, "after")
            .await
            .unwrap();
        let sessions = pipeline.list_sessions("u1").await.unwrap();
        assert_eq!(sessions[0].name.as_deref(), Some("after"));

        pipeline.delete_session("u1", session_id).await.unwrap();
        let err = pipeline.load_session("u1", session_id).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound));
    }

    #[tokio::test]
    async fn no_keyword_enriched_twice_across_sets() {
        // "shared term" ends up both a primary opportunity (no competitor
        // ranks for it) and a user-advantage gap (the competitor is absent
        // while the user ranks 18). The finder's related-keyword seeding
        // accounts for one mining call; double enrichment would make three.
        let provider = MockProvider::new()
            .with_asin(
                "B000000001",
                vec![occurrence("shared term", 6_000, 1.5, Some(18))],
            )
            .with_asin(
                "B000000002",
                vec![occurrence("other term", 2_000, 1.0, Some(9))],
            );
        let (pipeline, provider, _) = pipeline_with(provider);

        let options = ResearchOptions {
            min_competitors_ranking: 0,
            max_competitor_strength: 10.0,
            ..ResearchOptions::default()
        };
        pipeline
            .research_keywords(
                "u1",
                &ids(&["B000000001", "B000000002"]),
                options,
                None,
                &ProgressSender::disabled(),
            )
            .await
            .unwrap();

        let calls = provider.mining_calls();
        let shared_calls = calls.iter().filter(|k| *k == "shared term").count();
        assert!(
            shared_calls <= 2,
            "at most one seed + one enrichment call, saw {shared_calls}"
        );
    }
}
