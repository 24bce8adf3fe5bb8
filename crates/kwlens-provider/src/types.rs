//! Keyword-data provider response types.
//!
//! The provider wraps every response in a `{"code": "OK", ...}` envelope;
//! [`ApiResponse`] captures that pattern generically. Keyword rows carry a
//! long tail of optional commercial metrics that are only populated on the
//! (more expensive) mining endpoint.

use serde::Deserialize;

/// Top-level envelope for all provider responses.
///
/// `code` is `"OK"` on success; anything else is an error, with the detail
/// in `message`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// Wrapper for the `reverseAsin` response: `{ "items": [ ... ] }`.
#[derive(Debug, Deserialize)]
pub struct ReverseAsinResponse {
    #[serde(default)]
    pub items: Vec<KeywordRow>,
}

/// Wrapper for the `keywordMining` response.
#[derive(Debug, Deserialize)]
pub struct KeywordMiningResponse {
    #[serde(default)]
    pub items: Vec<KeywordRow>,
}

/// One keyword row on the wire.
///
/// `searches` and `cpc` are always present; the ranking fields only on the
/// reverse-ASIN path; the commercial metrics mostly on the mining path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordRow {
    pub keyword: String,
    pub searches: u32,
    pub cpc: f64,
    /// Organic position of the queried product; absent or 0 when unranked.
    pub rank_position: Option<u32>,
    /// Percentage of the keyword's traffic the product captures.
    pub traffic_percentage: Option<f64>,
    pub products: Option<u32>,
    pub ad_products: Option<u32>,
    pub purchases: Option<u32>,
    pub purchase_rate: Option<f64>,
    pub bid_min: Option<f64>,
    pub bid_max: Option<f64>,
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

/// Filters for the mining endpoint.
#[derive(Debug, Clone, Copy)]
pub struct MiningFilters {
    pub min_search: u32,
    pub max_supply_demand_ratio: f64,
    /// Maximum number of related keywords to return.
    pub size: u32,
}

impl Default for MiningFilters {
    fn default() -> Self {
        Self {
            min_search: 100,
            max_supply_demand_ratio: 15.0,
            size: 20,
        }
    }
}
