//! Targeted enrichment of the highest-priority keywords.
//!
//! Picks the best opportunity and gap keywords, deduplicates them, and
//! calls the expensive mining endpoint under a self-imposed rate limit
//! (sequential batches with fixed delays — no provider-side signal is
//! consulted). Every failure degrades to passing the record through
//! unenhanced; this phase can never fail the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kwlens_core::{fold_keyword, GapRecord, OpportunityCandidate, ProgressSender};
use kwlens_provider::MiningFilters;

use crate::traits::KeywordDataProvider;

/// At most this many opportunity keywords are enriched per run.
const MAX_OPPORTUNITY_PICKS: usize = 20;
/// At most this many gap keywords are enriched per run.
const MAX_GAP_PICKS: usize = 5;
/// The CPC the selection score treats as ideal commercial intent.
const TARGET_CPC: f64 = 1.50;

/// Rate-limit shape of the enrichment phase.
#[derive(Debug, Clone, Copy)]
pub struct EnhanceConfig {
    pub batch_size: usize,
    pub item_delay_ms: u64,
    pub batch_delay_ms: u64,
    /// Result-set size requested from the mining endpoint per keyword.
    pub mining_size: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            item_delay_ms: 1_000,
            batch_delay_ms: 2_000,
            mining_size: 10,
        }
    }
}

/// Which record a selected keyword belongs to.
enum Target {
    Opportunity(usize),
    Gap(usize),
}

/// Runs the enrichment phase over the selected keywords.
pub struct Enhancer {
    provider: Arc<dyn KeywordDataProvider>,
    config: EnhanceConfig,
}

impl Enhancer {
    #[must_use]
    pub fn new(provider: Arc<dyn KeywordDataProvider>, config: EnhanceConfig) -> Self {
        Self { provider, config }
    }

    /// Enrich the highest-priority keywords in place.
    ///
    /// Returns the number of records actually enhanced. Cancellation (a
    /// dropped progress receiver) stops the loop between items; per-keyword
    /// provider failures leave that record untouched.
    pub async fn enhance(
        &self,
        opportunities: &mut [OpportunityCandidate],
        gaps: &mut [GapRecord],
        progress: &ProgressSender,
    ) -> usize {
        let targets = select_targets(opportunities, gaps);
        if targets.is_empty() {
            return 0;
        }

        let filters = MiningFilters {
            min_search: 1,
            max_supply_demand_ratio: f64::MAX,
            size: self.config.mining_size,
        };

        let mut enhanced = 0usize;
        for (index, target) in targets.iter().enumerate() {
            if progress.is_cancelled() {
                tracing::info!(
                    enhanced,
                    remaining = targets.len() - index,
                    "enhancement cancelled — passing remaining keywords through"
                );
                break;
            }

            if index > 0 {
                let delay_ms = if index % self.config.batch_size == 0 {
                    self.config.batch_delay_ms
                } else {
                    self.config.item_delay_ms
                };
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }

            let keyword = match target {
                Target::Opportunity(i) => opportunities[*i].keyword.clone(),
                Target::Gap(i) => gaps[*i].keyword.clone(),
            };

            match self.provider.keyword_mining(&keyword, &filters).await {
                Ok(results) => {
                    if let Some(exact) = exact_match(&keyword, &results) {
                        match target {
                            Target::Opportunity(i) => {
                                opportunities[*i].attrs.merge_from(&exact.attrs);
                            }
                            Target::Gap(i) => gaps[*i].attrs.merge_from(&exact.attrs),
                        }
                        enhanced += 1;
                    } else {
                        tracing::debug!(keyword = %keyword, "no exact mining match — keeping original");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        keyword = %keyword,
                        error = %e,
                        "enrichment call failed — keeping original record"
                    );
                }
            }
        }

        enhanced
    }
}

/// Pick up to 20 opportunity and 5 gap keywords by enhancement score,
/// deduplicated by folded keyword text across both sets. A keyword that
/// appears in both sets is enriched once, through its opportunity record.
fn select_targets(opportunities: &[OpportunityCandidate], gaps: &[GapRecord]) -> Vec<Target> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut targets = Vec::new();

    let mut opportunity_order: Vec<usize> = (0..opportunities.len()).collect();
    opportunity_order.sort_by(|&a, &b| {
        opportunity_enhancement_score(&opportunities[b])
            .partial_cmp(&opportunity_enhancement_score(&opportunities[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for index in opportunity_order.into_iter().take(MAX_OPPORTUNITY_PICKS) {
        if seen.insert(fold_keyword(&opportunities[index].keyword)) {
            targets.push(Target::Opportunity(index));
        }
    }

    let mut gap_order: Vec<usize> = (0..gaps.len()).collect();
    gap_order.sort_by(|&a, &b| {
        gap_enhancement_score(&gaps[b])
            .partial_cmp(&gap_enhancement_score(&gaps[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut gap_picks = 0usize;
    for index in gap_order {
        if gap_picks == MAX_GAP_PICKS {
            break;
        }
        if seen.insert(fold_keyword(&gaps[index].keyword)) {
            targets.push(Target::Gap(index));
            gap_picks += 1;
        }
    }

    targets
}

/// Priority of an opportunity for the (expensive) enrichment call:
/// volume, inverse competition, CPC near the sweet spot, and a small
/// fundamentals bonus when both volume and competition clear sane bars.
fn opportunity_enhancement_score(candidate: &OpportunityCandidate) -> f64 {
    let volume_norm = (f64::from(candidate.search_volume) / 10_000.0).min(1.0);
    let quality = ((11.0 - candidate.competitor_strength) / 10.0).clamp(0.0, 1.0);
    let fundamentals =
        if candidate.search_volume > 1_000 && candidate.competitor_strength < 7.0 {
            1.0
        } else {
            0.0
        };
    weigh(volume_norm, quality, candidate.avg_cpc, fundamentals)
}

fn gap_enhancement_score(gap: &GapRecord) -> f64 {
    let volume_norm = (f64::from(gap.search_volume) / 10_000.0).min(1.0);
    let quality = f64::from(gap.gap_score) / 10.0;
    let fundamentals = if gap.search_volume > 1_000 && gap.competitor_rankings.len() < 7 {
        1.0
    } else {
        0.0
    };
    weigh(volume_norm, quality, gap.avg_cpc, fundamentals)
}

fn weigh(volume_norm: f64, quality: f64, cpc: f64, fundamentals: f64) -> f64 {
    let cpc_closeness = 1.0 - ((cpc - TARGET_CPC).abs() / TARGET_CPC).min(1.0);
    0.3 * volume_norm + 0.4 * quality + 0.2 * cpc_closeness + 0.1 * fundamentals
}

/// Case-insensitive exact keyword match within the mining results. No
/// match means no enhancement — the original record is kept verbatim
/// rather than adopting an unrelated keyword's metrics.
fn exact_match<'a>(
    keyword: &str,
    results: &'a [kwlens_core::KeywordOccurrence],
) -> Option<&'a kwlens_core::KeywordOccurrence> {
    let folded = fold_keyword(keyword);
    results.iter().find(|occ| fold_keyword(&occ.keyword) == folded)
}
