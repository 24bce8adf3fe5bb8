//! Cross-product keyword aggregation.
//!
//! Merges every successful product's occurrences into one record per
//! keyword and scores it. Accumulation is local to one call; results are
//! frozen on return.

use std::collections::HashMap;

use kwlens_core::{AggregatedKeyword, ProductCollection, RankingEntry};

use crate::score::opportunity_score;

/// Per-keyword accumulator. CPC values are kept until finalize so the
/// average is a true mean, not a running approximation.
struct KeywordAccumulator {
    keyword: String,
    max_volume: u32,
    cpc_values: Vec<f64>,
    rankings: Vec<RankingEntry>,
}

/// Merge occurrences across all successfully collected products and score
/// each keyword. Output is sorted by opportunity score, descending.
#[must_use]
pub fn aggregate(collections: &[ProductCollection]) -> Vec<AggregatedKeyword> {
    let successful: Vec<&ProductCollection> = collections
        .iter()
        .filter(|c| c.status.is_collected())
        .collect();
    let products_analyzed = u32::try_from(successful.len()).unwrap_or(u32::MAX);

    let mut accumulators: HashMap<String, KeywordAccumulator> = HashMap::new();

    for collection in &successful {
        for occ in &collection.occurrences {
            let acc = accumulators
                .entry(occ.keyword.clone())
                .or_insert_with(|| KeywordAccumulator {
                    keyword: occ.keyword.clone(),
                    max_volume: 0,
                    cpc_values: Vec::new(),
                    rankings: Vec::new(),
                });

            acc.max_volume = acc.max_volume.max(occ.search_volume);
            acc.cpc_values.push(occ.cpc);
            if let Some(position) = occ.position {
                acc.rankings.push(RankingEntry {
                    asin: collection.asin.clone(),
                    position,
                    traffic_share: occ.traffic_share,
                });
            }
        }
    }

    let mut aggregated: Vec<AggregatedKeyword> = accumulators
        .into_values()
        .map(|acc| finalize(acc, products_analyzed))
        .collect();

    aggregated.sort_by(|a, b| {
        b.opportunity_score
            .partial_cmp(&a.opportunity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    aggregated
}

fn finalize(acc: KeywordAccumulator, products_analyzed: u32) -> AggregatedKeyword {
    #[allow(clippy::cast_precision_loss)]
    let avg_cpc = if acc.cpc_values.is_empty() {
        0.0
    } else {
        acc.cpc_values.iter().sum::<f64>() / acc.cpc_values.len() as f64
    };

    let competitor_count = u32::try_from(acc.rankings.len()).unwrap_or(u32::MAX);
    let score = opportunity_score(acc.max_volume, avg_cpc, competitor_count, products_analyzed);

    AggregatedKeyword {
        keyword: acc.keyword,
        search_volume: acc.max_volume,
        avg_cpc,
        rankings: acc.rankings,
        opportunity_score: score,
    }
}
