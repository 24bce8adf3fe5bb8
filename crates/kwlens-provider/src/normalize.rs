//! Conversion from wire rows to domain occurrences.

use kwlens_core::{fold_keyword, KeywordAttributes, KeywordOccurrence};

use crate::types::KeywordRow;

/// Normalize one wire row into a domain occurrence.
///
/// Returns `None` for rows with an empty keyword after folding. A rank of 0
/// means "not ranking" on the wire and becomes `None`; negative or
/// non-finite CPC values are clamped to 0.0 (the provider occasionally
/// emits `-1` for "no data").
#[must_use]
pub fn normalize_row(row: KeywordRow) -> Option<KeywordOccurrence> {
    let keyword = fold_keyword(&row.keyword);
    if keyword.is_empty() {
        return None;
    }

    let cpc = if row.cpc.is_finite() && row.cpc > 0.0 {
        row.cpc
    } else {
        0.0
    };

    let position = row.rank_position.filter(|&p| p > 0);

    Some(KeywordOccurrence {
        keyword,
        search_volume: row.searches,
        cpc,
        position,
        traffic_share: row.traffic_percentage.filter(|t| t.is_finite() && *t >= 0.0),
        attrs: KeywordAttributes {
            products_count: row.products,
            ad_products: row.ad_products,
            purchases: row.purchases,
            purchase_rate: row.purchase_rate,
            bid_min: row.bid_min,
            bid_max: row.bid_max,
            supply_demand_ratio: row.supply_demand_ratio,
            title_density: row.title_density,
            relevancy: row.relevancy,
            monopoly_click_rate: row.monopoly_click_rate,
            avg_price: row.avg_price,
            conversion_rate: row.conversion_rate,
            spr: row.spr,
            word_count: row.word_count,
            amazon_choice: row.amazon_choice,
        },
    })
}

/// Normalize a page of rows, dropping unusable entries and duplicate
/// keywords (first occurrence wins).
#[must_use]
pub fn normalize_rows(rows: Vec<KeywordRow>) -> Vec<KeywordOccurrence> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter_map(normalize_row)
        .filter(|occ| seen.insert(occ.keyword.clone()))
        .collect()
}
