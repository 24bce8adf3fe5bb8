//! Result records produced by one research run (or one reconstruction).
//!
//! Everything here is derived data: computed once, sorted, capped, and then
//! never mutated. A re-research replaces the whole session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keywords::{KeywordAttributes, ProductCollection, ProductStatus, RankingEntry};
use crate::options::ResearchOptions;

/// One keyword merged across all successfully collected products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedKeyword {
    pub keyword: String,
    /// Maximum search volume observed across products. Volumes come from a
    /// single provider, so the max is provider-consistent.
    pub search_volume: u32,
    /// Mean CPC across all occurrences of the keyword.
    pub avg_cpc: f64,
    /// One entry per product that ranks for the keyword.
    pub rankings: Vec<RankingEntry>,
    /// Opportunity score in [1.0, 10.0], two decimals.
    pub opportunity_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    MarketGap,
    WeakCompetitors,
    LowCompetition,
    KeywordMining,
}

/// A keyword with its competitor-performance summary from the universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub keyword: String,
    pub search_volume: u32,
    pub avg_cpc: f64,
    /// Competitors with an organic position of 15 or better.
    pub competitors_in_top15: u32,
    /// Competitors with an organic position of 50 or better.
    pub competitors_ranking: u32,
    /// Mean position across all tracked competitor rankings; 0 when nobody ranks.
    pub avg_competitor_rank: f64,
    /// clamp(1, 10, 11 - avg_rank/10); 1 (best case) when nobody ranks.
    pub competitor_strength: f64,
    pub opportunity_type: OpportunityType,
    #[serde(default, skip_serializing_if = "KeywordAttributes::is_empty")]
    pub attrs: KeywordAttributes,
}

/// Opportunity output of one run: the primary product's targeted list plus
/// the full universe view used for overview statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpportunityReport {
    /// Targeted opportunities for the primary product, volume-descending,
    /// at most 15 entries.
    pub opportunities: Vec<OpportunityCandidate>,
    /// Every keyword in the universe with its competition summary, exposed
    /// even when the filter above excludes most of it.
    pub all_keywords_with_competition: Vec<OpportunityCandidate>,
    /// Extra keywords pulled from the mining endpoint for the top aggregated
    /// keywords; empty when mining was skipped or failed.
    pub mined: Vec<OpportunityCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    MarketGap,
    UserAdvantage,
    CompetitorWeakness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapImpact {
    Low,
    Medium,
    High,
}

/// One keyword classified into a gap scenario for the primary product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapRecord {
    pub keyword: String,
    pub search_volume: u32,
    pub avg_cpc: f64,
    pub gap_type: GapType,
    /// Integer score in [1, 10].
    pub gap_score: u8,
    /// The primary product's ranking for the keyword, if any.
    pub user_ranking: Option<RankingEntry>,
    pub competitor_rankings: Vec<RankingEntry>,
    pub recommendation: String,
    pub potential_impact: GapImpact,
    #[serde(default, skip_serializing_if = "KeywordAttributes::is_empty")]
    pub attrs: KeywordAttributes,
}

/// Aggregate counts over one run's gap set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    /// Gaps at or above the focus volume threshold.
    pub high_volume_gaps: u32,
    /// Gaps with volume in [2000, focus threshold).
    pub medium_volume_gaps: u32,
    pub avg_gap_volume: u32,
    /// Sum of search volumes across all gaps.
    pub total_gap_potential: u64,
}

/// Gap analysis output. Present only when at least two products were
/// successfully collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub gaps: Vec<GapRecord>,
    pub summary: GapSummary,
}

/// A keyword entry inside a per-product comparison bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonKeyword {
    pub keyword: String,
    pub search_volume: u32,
    pub position: Option<u32>,
    pub traffic_share: Option<f64>,
}

/// Per-product breakdown into strong and weak keyword buckets, computed
/// independently of all other products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductComparison {
    pub asin: String,
    pub status: ProductStatus,
    pub total_keywords: u32,
    pub avg_search_volume: u32,
    /// Keywords where the product ranks 15 or better, best rank first.
    pub strong: Vec<ComparisonKeyword>,
    /// Keywords where the product ranks below 15, highest volume first.
    pub weak: Vec<ComparisonKeyword>,
}

/// The complete output of one research run.
///
/// `products[0]` is the primary (user) product; the rest are competitors.
/// The ordering is caller-supplied and preserved end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    pub products: Vec<String>,
    pub options: ResearchOptions,
    /// Raw per-product collections in `products` order, including failures.
    /// These are what the persistent store normalizes into ranking rows, so
    /// a session can be rebuilt deterministically on a cache miss.
    pub collections: Vec<ProductCollection>,
    pub aggregated: Vec<AggregatedKeyword>,
    pub comparisons: Vec<ProductComparison>,
    pub opportunities: OpportunityReport,
    /// Absent (not an error) when fewer than two products collected.
    pub gaps: Option<GapAnalysis>,
    pub created_at: DateTime<Utc>,
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub products: Vec<String>,
    pub created_at: DateTime<Utc>,
}
