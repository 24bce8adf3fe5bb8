//! Per-product keyword collection.
//!
//! Products are processed sequentially with a fixed inter-product delay.
//! The delay is a deliberate self-throttle against the provider's rate
//! limit, not a technical necessity.

use std::sync::Arc;
use std::time::Duration;

use kwlens_core::progress::extraction_percent;
use kwlens_core::{
    KeywordOccurrence, ProductCollection, ProgressSender, ResearchOptions, ResearchPhase,
};

use crate::traits::KeywordDataProvider;

/// Fetches and filters raw keyword occurrences per product.
pub struct KeywordCollector {
    provider: Arc<dyn KeywordDataProvider>,
    /// Delay between consecutive products, in milliseconds.
    delay_ms: u64,
}

impl KeywordCollector {
    #[must_use]
    pub fn new(provider: Arc<dyn KeywordDataProvider>, delay_ms: u64) -> Self {
        Self { provider, delay_ms }
    }

    /// Collect occurrences for every product, in order.
    ///
    /// A product that fails collection is recorded as
    /// [`kwlens_core::ProductStatus::Failed`] and never aborts its siblings.
    /// The returned vector is index-aligned with `product_ids`.
    pub async fn collect_all(
        &self,
        product_ids: &[String],
        options: &ResearchOptions,
        progress: &ProgressSender,
    ) -> Vec<ProductCollection> {
        let mut collections = Vec::with_capacity(product_ids.len());

        for (index, asin) in product_ids.iter().enumerate() {
            if index > 0 && self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }

            let collection = match self.collect_one(asin, options).await {
                Ok(occurrences) => {
                    tracing::info!(
                        asin = %asin,
                        keywords = occurrences.len(),
                        "collected keyword occurrences"
                    );
                    ProductCollection::collected(asin, occurrences)
                }
                Err(e) => {
                    tracing::warn!(asin = %asin, error = %e, "product collection failed");
                    ProductCollection::failed(asin, e.to_string())
                }
            };

            progress.send_with_payload(
                ResearchPhase::Extraction,
                format!("collected keywords for {asin}"),
                extraction_percent(index, product_ids.len()),
                Some(serde_json::json!({
                    "asin": asin,
                    "keywords": collection.occurrences.len(),
                    "failed": !collection.status.is_collected(),
                })),
            );

            collections.push(collection);
        }

        collections
    }

    /// Fetch all configured pages for one product, apply the volume floor,
    /// and dedupe by folded keyword across pages (first occurrence wins —
    /// earlier pages carry the provider's higher-relevance rows).
    async fn collect_one(
        &self,
        asin: &str,
        options: &ResearchOptions,
    ) -> Result<Vec<KeywordOccurrence>, kwlens_provider::ProviderError> {
        let mut seen = std::collections::HashSet::new();
        let mut occurrences = Vec::new();

        for page in 1..=options.pages {
            let rows = self
                .provider
                .reverse_asin(asin, page, options.page_size)
                .await?;
            let page_len = rows.len();

            for occ in rows {
                if occ.search_volume < options.min_search_volume {
                    continue;
                }
                if seen.insert(occ.keyword.clone()) {
                    occurrences.push(occ);
                }
            }

            // A short page means the provider ran out of rows.
            if u32::try_from(page_len).unwrap_or(u32::MAX) < options.page_size {
                break;
            }
        }

        Ok(occurrences)
    }
}
