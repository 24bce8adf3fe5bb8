//! Keyword occurrences as collected per product, and the folding rule that
//! defines keyword identity everywhere in the pipeline.

use serde::{Deserialize, Serialize};

/// Canonical form of a keyword used as the natural key.
///
/// Trims surrounding whitespace and lowercases. Two occurrences whose folded
/// text is equal refer to the same keyword, both within one product's
/// occurrence list and across the aggregated universe.
#[must_use]
pub fn fold_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Optional enrichment attributes attached to a keyword occurrence.
///
/// All fields come from the provider and may be absent on the cheap
/// `reverseAsin` path; the mining path fills in more of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordAttributes {
    /// Number of products competing for the keyword.
    pub products_count: Option<u32>,
    /// Number of sponsored/ad products on the result page.
    pub ad_products: Option<u32>,
    pub purchases: Option<u32>,
    pub purchase_rate: Option<f64>,
    pub bid_min: Option<f64>,
    pub bid_max: Option<f64>,
    /// Competing products per unit of search demand; lower is better.
    pub supply_demand_ratio: Option<f64>,
    pub title_density: Option<f64>,
    pub relevancy: Option<f64>,
    pub monopoly_click_rate: Option<f64>,
    pub avg_price: Option<f64>,
    pub conversion_rate: Option<f64>,
    pub spr: Option<u32>,
    pub word_count: Option<u32>,
    pub amazon_choice: Option<bool>,
}

impl KeywordAttributes {
    /// Overlay `other` onto `self`, keeping existing values where `other`
    /// has none. Used when merging enrichment results back onto a record
    /// that must not lose fields it already carries.
    pub fn merge_from(&mut self, other: &KeywordAttributes) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                *dst = src.clone();
            }
        }
        take(&mut self.products_count, &other.products_count);
        take(&mut self.ad_products, &other.ad_products);
        take(&mut self.purchases, &other.purchases);
        take(&mut self.purchase_rate, &other.purchase_rate);
        take(&mut self.bid_min, &other.bid_min);
        take(&mut self.bid_max, &other.bid_max);
        take(&mut self.supply_demand_ratio, &other.supply_demand_ratio);
        take(&mut self.title_density, &other.title_density);
        take(&mut self.relevancy, &other.relevancy);
        take(&mut self.monopoly_click_rate, &other.monopoly_click_rate);
        take(&mut self.avg_price, &other.avg_price);
        take(&mut self.conversion_rate, &other.conversion_rate);
        take(&mut self.spr, &other.spr);
        take(&mut self.word_count, &other.word_count);
        take(&mut self.amazon_choice, &other.amazon_choice);
    }

    /// True when no enrichment field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &KeywordAttributes::default()
    }
}

/// One (product, keyword) observation as returned by the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordOccurrence {
    /// Folded keyword text (see [`fold_keyword`]).
    pub keyword: String,
    pub search_volume: u32,
    /// Cost-per-click in USD.
    pub cpc: f64,
    /// Organic ranking position of the product for this keyword, if it ranks.
    pub position: Option<u32>,
    /// Share of the keyword's traffic captured by the product, in percent.
    pub traffic_share: Option<f64>,
    #[serde(default, skip_serializing_if = "KeywordAttributes::is_empty")]
    pub attrs: KeywordAttributes,
}

/// A product's ranking for one keyword, as tracked in the aggregated universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub asin: String,
    pub position: u32,
    pub traffic_share: Option<f64>,
}

/// Collection outcome for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum ProductStatus {
    Collected,
    Failed(String),
}

impl ProductStatus {
    #[must_use]
    pub fn is_collected(&self) -> bool {
        matches!(self, ProductStatus::Collected)
    }
}

/// Keyword occurrences collected for one product, or the failure that
/// prevented collecting them. A failed product never aborts the run; it is
/// simply excluded from aggregation, comparison, and gap analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCollection {
    pub asin: String,
    pub status: ProductStatus,
    pub occurrences: Vec<KeywordOccurrence>,
}

impl ProductCollection {
    #[must_use]
    pub fn collected(asin: &str, occurrences: Vec<KeywordOccurrence>) -> Self {
        Self {
            asin: asin.to_owned(),
            status: ProductStatus::Collected,
            occurrences,
        }
    }

    #[must_use]
    pub fn failed(asin: &str, error: String) -> Self {
        Self {
            asin: asin.to_owned(),
            status: ProductStatus::Failed(error),
            occurrences: Vec::new(),
        }
    }
}
