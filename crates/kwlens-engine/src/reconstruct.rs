//! Deterministic session rebuild from normalized store rows.
//!
//! On a cache miss the persistent store hands back `{products, rankings,
//! opportunities, gaps}` rows, and this module rebuilds the aggregated,
//! comparison, and universe views by routing the rows through the *same*
//! code the live pipeline runs — the same accumulators, the same score
//! constants. Identical rows in, identical session out; that determinism
//! is the whole contract.

use kwlens_core::{
    GapAnalysis, KeywordOccurrence, OpportunityReport, ProductCollection, ResearchSession,
};

use crate::aggregator::aggregate;
use crate::comparison::build_comparison;
use crate::gaps::summarize;
use crate::opportunity::universe_candidates;
use crate::traits::{SessionRows, StoredProduct, StoredRanking};

/// Rebuild a full session from its normalized rows.
#[must_use]
pub fn reconstruct_session(rows: SessionRows) -> ResearchSession {
    let SessionRows {
        options,
        mut products,
        rankings,
        opportunities,
        mined,
        gaps,
        created_at,
    } = rows;

    products.sort_by_key(|p| p.ordinal);
    let collections = rebuild_collections(&products, rankings);

    let aggregated = aggregate(&collections);
    let comparisons = collections.iter().map(build_comparison).collect();
    let all_keywords_with_competition = universe_candidates(&collections);

    // Gap analysis exists only when the live run could have produced it:
    // primary collected plus at least one successful competitor.
    let primary_collected = collections
        .first()
        .is_some_and(|c| c.status.is_collected());
    let successful_competitors = collections
        .iter()
        .skip(1)
        .filter(|c| c.status.is_collected())
        .count();
    let gaps = if primary_collected && successful_competitors > 0 {
        let summary = summarize(&gaps, &options);
        Some(GapAnalysis { gaps, summary })
    } else {
        None
    };

    ResearchSession {
        products: products.iter().map(|p| p.asin.clone()).collect(),
        options,
        collections,
        aggregated,
        comparisons,
        opportunities: OpportunityReport {
            opportunities,
            all_keywords_with_competition,
            mined,
        },
        gaps,
        created_at,
    }
}

/// Regroup flat ranking rows into per-product collections, preserving the
/// stored research order and failure statuses.
fn rebuild_collections(
    products: &[StoredProduct],
    rankings: Vec<StoredRanking>,
) -> Vec<ProductCollection> {
    let mut per_product: std::collections::HashMap<String, Vec<KeywordOccurrence>> =
        std::collections::HashMap::new();

    for row in rankings {
        per_product
            .entry(row.asin.clone())
            .or_default()
            .push(KeywordOccurrence {
                keyword: kwlens_core::fold_keyword(&row.keyword),
                search_volume: row.search_volume,
                cpc: row.cpc,
                position: row.position,
                traffic_share: row.traffic_share,
                attrs: row.attrs,
            });
    }

    products
        .iter()
        .map(|product| match &product.status {
            kwlens_core::ProductStatus::Collected => ProductCollection::collected(
                &product.asin,
                per_product.remove(&product.asin).unwrap_or_default(),
            ),
            kwlens_core::ProductStatus::Failed(error) => {
                ProductCollection::failed(&product.asin, error.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaps::analyze_gaps;
    use crate::testutil::{occurrence, occurrence_with_attrs, session_to_rows};
    use chrono::Utc;
    use kwlens_core::{ProductStatus, ResearchOptions};

    /// Build a live-path session from collections, then push it through the
    /// store-row representation and back.
    fn live_and_reconstructed(
        collections: Vec<ProductCollection>,
    ) -> (ResearchSession, ResearchSession) {
        let options = ResearchOptions::default();
        let aggregated = aggregate(&collections);
        let comparisons: Vec<_> = collections.iter().map(build_comparison).collect();
        let all = universe_candidates(&collections);
        let gaps = analyze_gaps(&collections, &options);

        let live = ResearchSession {
            products: collections.iter().map(|c| c.asin.clone()).collect(),
            options,
            collections,
            aggregated,
            comparisons,
            opportunities: OpportunityReport {
                opportunities: Vec::new(),
                all_keywords_with_competition: all,
                mined: Vec::new(),
            },
            gaps,
            created_at: Utc::now(),
        };

        let rows = session_to_rows(&live);
        let rebuilt = reconstruct_session(rows);
        (live, rebuilt)
    }

    fn sample_collections() -> Vec<ProductCollection> {
        vec![
            ProductCollection::collected(
                "B000000001",
                vec![
                    occurrence("wireless mouse", 6_000, 1.5, Some(30)),
                    occurrence_with_attrs("gaming mouse", 8_000, 2.2, Some(40), |attrs| {
                        attrs.supply_demand_ratio = Some(6.5);
                        attrs.products_count = Some(80);
                    }),
                    occurrence("desk mat", 900, 0.4, None),
                ],
            ),
            ProductCollection::collected(
                "B000000002",
                vec![
                    occurrence("wireless mouse", 5_500, 1.3, Some(5)),
                    occurrence_with_attrs("gaming mouse", 8_000, 2.0, Some(90), |attrs| {
                        attrs.products_count = Some(95);
                    }),
                ],
            ),
        ]
    }

    #[test]
    fn reconstructed_scores_match_live_scores() {
        let (live, rebuilt) = live_and_reconstructed(sample_collections());

        assert_eq!(live.aggregated.len(), rebuilt.aggregated.len());
        for (a, b) in live.aggregated.iter().zip(&rebuilt.aggregated) {
            assert_eq!(a.keyword, b.keyword);
            assert_eq!(a.opportunity_score, b.opportunity_score, "score drift on {}", a.keyword);
            assert_eq!(a.search_volume, b.search_volume);
            assert_eq!(a.rankings, b.rankings);
        }
    }

    #[test]
    fn reconstructed_universe_tracks_best_of_metrics() {
        let (live, rebuilt) = live_and_reconstructed(sample_collections());

        let find = |session: &ResearchSession, kw: &str| {
            session
                .opportunities
                .all_keywords_with_competition
                .iter()
                .find(|c| c.keyword == kw)
                .cloned()
                .unwrap()
        };

        let live_gaming = find(&live, "gaming mouse");
        let rebuilt_gaming = find(&rebuilt, "gaming mouse");
        assert_eq!(rebuilt_gaming.attrs.products_count, Some(95), "max across rows");
        assert_eq!(live_gaming.attrs.products_count, rebuilt_gaming.attrs.products_count);
        assert_eq!(live_gaming.competitor_strength, rebuilt_gaming.competitor_strength);
        assert_eq!(live_gaming.avg_cpc, rebuilt_gaming.avg_cpc);
    }

    #[test]
    fn reconstructed_comparisons_match_live() {
        let (live, rebuilt) = live_and_reconstructed(sample_collections());

        for (a, b) in live.comparisons.iter().zip(&rebuilt.comparisons) {
            assert_eq!(a.asin, b.asin);
            assert_eq!(a.total_keywords, b.total_keywords);
            assert_eq!(a.avg_search_volume, b.avg_search_volume);
            assert_eq!(a.strong.len(), b.strong.len());
            assert_eq!(a.weak.len(), b.weak.len());
        }
    }

    #[test]
    fn reconstructed_gap_summary_matches_live() {
        let (live, rebuilt) = live_and_reconstructed(sample_collections());
        let live_gaps = live.gaps.unwrap();
        let rebuilt_gaps = rebuilt.gaps.unwrap();
        assert_eq!(live_gaps.summary, rebuilt_gaps.summary);
        assert_eq!(live_gaps.gaps.len(), rebuilt_gaps.gaps.len());
    }

    #[test]
    fn failed_product_round_trips_with_error_message() {
        let collections = vec![
            ProductCollection::collected(
                "B000000001",
                vec![occurrence("mouse", 3_000, 1.0, Some(4))],
            ),
            ProductCollection::failed("B000000002", "provider timeout".to_owned()),
        ];
        let (_, rebuilt) = live_and_reconstructed(collections);

        assert_eq!(rebuilt.collections.len(), 2);
        assert!(matches!(
            rebuilt.collections[1].status,
            ProductStatus::Failed(ref e) if e == "provider timeout"
        ));
        assert!(rebuilt.gaps.is_none(), "one successful product — no gap analysis");
    }

    #[test]
    fn product_order_is_preserved_by_ordinal() {
        let (live, rebuilt) = live_and_reconstructed(sample_collections());
        assert_eq!(live.products, rebuilt.products);
        assert_eq!(rebuilt.products[0], "B000000001", "primary stays first");
    }
}
