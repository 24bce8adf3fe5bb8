//! Per-product strong/weak keyword breakdown.
//!
//! Pure transform over one product's occurrences, independent of every
//! other product. Failed products produce an all-zero record carrying the
//! failure status; this never errors.

use kwlens_core::{ComparisonKeyword, ProductCollection, ProductComparison};

/// Rank at or above which a keyword counts as "strong" for the product.
const STRONG_RANK_CUTOFF: u32 = 15;
/// How many occurrences to consider, by volume.
const TOP_KEYWORDS: usize = 20;
/// Cap per bucket.
const BUCKET_CAP: usize = 15;

/// Build the comparison record for one product.
#[must_use]
pub fn build_comparison(collection: &ProductCollection) -> ProductComparison {
    if !collection.status.is_collected() || collection.occurrences.is_empty() {
        return ProductComparison {
            asin: collection.asin.clone(),
            status: collection.status.clone(),
            total_keywords: 0,
            avg_search_volume: 0,
            strong: Vec::new(),
            weak: Vec::new(),
        };
    }

    let mut by_volume: Vec<&kwlens_core::KeywordOccurrence> =
        collection.occurrences.iter().collect();
    by_volume.sort_by(|a, b| b.search_volume.cmp(&a.search_volume));
    by_volume.truncate(TOP_KEYWORDS);

    let mut strong: Vec<ComparisonKeyword> = by_volume
        .iter()
        .filter(|occ| occ.position.is_some_and(|p| p <= STRONG_RANK_CUTOFF))
        .map(|occ| to_entry(occ))
        .collect();
    // Best rank first.
    strong.sort_by_key(|entry| entry.position.unwrap_or(u32::MAX));
    strong.truncate(BUCKET_CAP);

    let mut weak: Vec<ComparisonKeyword> = by_volume
        .iter()
        .filter(|occ| occ.position.is_none_or(|p| p > STRONG_RANK_CUTOFF))
        .map(|occ| to_entry(occ))
        .collect();
    // Highest missed volume first.
    weak.sort_by(|a, b| b.search_volume.cmp(&a.search_volume));
    weak.truncate(BUCKET_CAP);

    let total = u64::from(sum_volume(&by_volume));
    #[allow(clippy::cast_possible_truncation)]
    let avg = (total / by_volume.len() as u64) as u32;

    ProductComparison {
        asin: collection.asin.clone(),
        status: collection.status.clone(),
        total_keywords: u32::try_from(collection.occurrences.len()).unwrap_or(u32::MAX),
        avg_search_volume: avg,
        strong,
        weak,
    }
}

fn to_entry(occ: &kwlens_core::KeywordOccurrence) -> ComparisonKeyword {
    ComparisonKeyword {
        keyword: occ.keyword.clone(),
        search_volume: occ.search_volume,
        position: occ.position,
        traffic_share: occ.traffic_share,
    }
}

fn sum_volume(occurrences: &[&kwlens_core::KeywordOccurrence]) -> u32 {
    occurrences
        .iter()
        .fold(0u32, |acc, occ| acc.saturating_add(occ.search_volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::occurrence;
    use kwlens_core::ProductStatus;

    #[test]
    fn splits_strong_and_weak_at_rank_fifteen() {
        let collection = ProductCollection::collected(
            "B000000001",
            vec![
                occurrence("first", 4_000, 1.0, Some(2)),
                occurrence("second", 3_000, 1.0, Some(15)),
                occurrence("third", 5_000, 1.0, Some(16)),
                occurrence("fourth", 1_000, 1.0, None),
            ],
        );
        let comparison = build_comparison(&collection);

        assert_eq!(comparison.total_keywords, 4);
        let strong: Vec<&str> = comparison.strong.iter().map(|e| e.keyword.as_str()).collect();
        let weak: Vec<&str> = comparison.weak.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(strong, ["first", "second"], "sorted by rank ascending");
        assert_eq!(weak, ["third", "fourth"], "sorted by volume descending");
    }

    #[test]
    fn considers_only_top_twenty_by_volume() {
        let mut occurrences: Vec<_> = (0u32..30)
            .map(|i| occurrence(&format!("kw{i}"), 10_000 - i * 100, 1.0, Some(5)))
            .collect();
        // The lowest-volume row would rank strongly but is outside the top 20.
        occurrences.push(occurrence("straggler", 10, 1.0, Some(1)));
        let collection = ProductCollection::collected("B000000001", occurrences);

        let comparison = build_comparison(&collection);
        assert_eq!(comparison.strong.len(), 15, "bucket capped at 15");
        assert!(comparison.strong.iter().all(|e| e.keyword != "straggler"));
    }

    #[test]
    fn averages_volume_over_considered_keywords() {
        let collection = ProductCollection::collected(
            "B000000001",
            vec![
                occurrence("a", 1_000, 1.0, Some(1)),
                occurrence("b", 3_000, 1.0, Some(2)),
            ],
        );
        let comparison = build_comparison(&collection);
        assert_eq!(comparison.avg_search_volume, 2_000);
    }

    #[test]
    fn failed_product_yields_zero_record() {
        let collection = ProductCollection::failed("B000000001", "provider timeout".to_owned());
        let comparison = build_comparison(&collection);

        assert!(matches!(comparison.status, ProductStatus::Failed(ref e) if e == "provider timeout"));
        assert_eq!(comparison.total_keywords, 0);
        assert_eq!(comparison.avg_search_volume, 0);
        assert!(comparison.strong.is_empty());
        assert!(comparison.weak.is_empty());
    }

    #[test]
    fn empty_collection_yields_zero_record_without_error() {
        let collection = ProductCollection::collected("B000000001", Vec::new());
        let comparison = build_comparison(&collection);
        assert_eq!(comparison.total_keywords, 0);
        assert!(comparison.strong.is_empty());
    }
}
