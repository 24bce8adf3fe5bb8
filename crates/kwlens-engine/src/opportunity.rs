//! Cross-product keyword universe and targeted opportunity discovery.
//!
//! The universe tracks, per keyword, how the *competitor* products (every
//! product except the primary) rank, plus best-effort commercial metrics.
//! The full universe is exposed for overview statistics; a filtered subset
//! qualifies keywords, and the final list handed to the primary product is
//! re-derived from its own occurrences with universe statistics attached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kwlens_core::{
    AggregatedKeyword, KeywordAttributes, OpportunityCandidate, OpportunityReport,
    OpportunityType, ProductCollection, ProgressSender, RankingEntry, ResearchOptions,
    ResearchPhase,
};
use kwlens_provider::MiningFilters;

use crate::traits::KeywordDataProvider;

/// Competitor positions beyond this are noise and not tracked.
const MAX_TRACKED_POSITION: u32 = 100;
/// Position cutoff for the "in top 15" competitor count.
const TOP15_CUTOFF: u32 = 15;
/// Position cutoff for the broader "ranking" competitor count.
const RANKING_CUTOFF: u32 = 50;
/// Filter ceilings applied to the qualified subset.
const AD_PRODUCTS_CEILING: f64 = 20.0;
const SUPPLY_DEMAND_CEILING: f64 = 15.0;
const PRODUCTS_CEILING: u32 = 100;
/// Cap on the final primary-product opportunity list.
const PRIMARY_CAP: usize = 15;
/// How many top aggregated keywords seed the mining call.
const MINING_SEEDS: usize = 3;

/// Per-keyword universe accumulator.
///
/// CPC, supply/demand, and ad-product counts use the `(old + new) / 2`
/// running average. That is an approximation, not a true mean — it is kept
/// on purpose because the reconstruction path must reproduce the same
/// numbers the live path computed.
#[derive(Debug)]
struct UniverseEntry {
    keyword: String,
    max_volume: u32,
    avg_cpc: Option<f64>,
    competitor_rankings: Vec<RankingEntry>,
    supply_demand_ratio: Option<f64>,
    ad_products: Option<f64>,
    products_count: Option<u32>,
    bid_min: Option<f64>,
    bid_max: Option<f64>,
    purchase_rate: Option<f64>,
    avg_price: Option<f64>,
}

impl UniverseEntry {
    fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_owned(),
            max_volume: 0,
            avg_cpc: None,
            competitor_rankings: Vec::new(),
            supply_demand_ratio: None,
            ad_products: None,
            products_count: None,
            bid_min: None,
            bid_max: None,
            purchase_rate: None,
            avg_price: None,
        }
    }

    fn absorb(&mut self, occ: &kwlens_core::KeywordOccurrence, asin: &str, is_competitor: bool) {
        self.max_volume = self.max_volume.max(occ.search_volume);
        self.avg_cpc = Some(running_avg(self.avg_cpc, occ.cpc));

        if is_competitor {
            if let Some(position) = occ.position {
                if position <= MAX_TRACKED_POSITION {
                    self.competitor_rankings.push(RankingEntry {
                        asin: asin.to_owned(),
                        position,
                        traffic_share: occ.traffic_share,
                    });
                }
            }
        }

        if let Some(ratio) = occ.attrs.supply_demand_ratio {
            self.supply_demand_ratio = Some(running_avg(self.supply_demand_ratio, ratio));
        }
        if let Some(ads) = occ.attrs.ad_products {
            self.ad_products = Some(running_avg(self.ad_products, f64::from(ads)));
        }
        if let Some(count) = occ.attrs.products_count {
            self.products_count = Some(self.products_count.map_or(count, |c| c.max(count)));
        }
        if let Some(bid) = occ.attrs.bid_min {
            self.bid_min = Some(self.bid_min.map_or(bid, |b: f64| b.min(bid)));
        }
        if let Some(bid) = occ.attrs.bid_max {
            self.bid_max = Some(self.bid_max.map_or(bid, |b: f64| b.max(bid)));
        }
        if let Some(rate) = occ.attrs.purchase_rate {
            self.purchase_rate = Some(running_avg(self.purchase_rate, rate));
        }
        if let Some(price) = occ.attrs.avg_price {
            self.avg_price = Some(running_avg(self.avg_price, price));
        }
    }

    fn to_candidate(&self) -> OpportunityCandidate {
        let competitors_in_top15 = count_at_or_under(&self.competitor_rankings, TOP15_CUTOFF);
        let competitors_ranking = count_at_or_under(&self.competitor_rankings, RANKING_CUTOFF);

        #[allow(clippy::cast_precision_loss)]
        let avg_competitor_rank = if self.competitor_rankings.is_empty() {
            0.0
        } else {
            self.competitor_rankings
                .iter()
                .map(|r| f64::from(r.position))
                .sum::<f64>()
                / self.competitor_rankings.len() as f64
        };

        // No ranking competitors is the best case: strength bottoms out at 1.
        let competitor_strength = if self.competitor_rankings.is_empty() {
            1.0
        } else {
            (11.0 - avg_competitor_rank / 10.0).clamp(1.0, 10.0)
        };

        let opportunity_type = if competitors_in_top15 == 0 {
            OpportunityType::MarketGap
        } else if competitor_strength <= 3.0 {
            OpportunityType::WeakCompetitors
        } else {
            OpportunityType::LowCompetition
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ad_products = self.ad_products.map(|a| a.round() as u32);

        OpportunityCandidate {
            keyword: self.keyword.clone(),
            search_volume: self.max_volume,
            avg_cpc: self.avg_cpc.unwrap_or(0.0),
            competitors_in_top15,
            competitors_ranking,
            avg_competitor_rank,
            competitor_strength,
            opportunity_type,
            attrs: KeywordAttributes {
                supply_demand_ratio: self.supply_demand_ratio,
                ad_products,
                products_count: self.products_count,
                bid_min: self.bid_min,
                bid_max: self.bid_max,
                purchase_rate: self.purchase_rate,
                avg_price: self.avg_price,
                ..KeywordAttributes::default()
            },
        }
    }
}

fn running_avg(current: Option<f64>, new: f64) -> f64 {
    match current {
        None => new,
        Some(old) => (old + new) / 2.0,
    }
}

fn count_at_or_under(rankings: &[RankingEntry], cutoff: u32) -> u32 {
    u32::try_from(rankings.iter().filter(|r| r.position <= cutoff).count()).unwrap_or(u32::MAX)
}

/// Builds the keyword universe and derives opportunity sets from it.
pub struct OpportunityFinder {
    provider: Arc<dyn KeywordDataProvider>,
}

impl OpportunityFinder {
    #[must_use]
    pub fn new(provider: Arc<dyn KeywordDataProvider>) -> Self {
        Self { provider }
    }

    /// Run opportunity discovery over the collected products.
    ///
    /// `collections` must be in research order: index 0 is the primary
    /// product whose occurrences drive the final cut. `aggregated` supplies
    /// the seeds for the supplemental mining call.
    pub async fn find(
        &self,
        collections: &[ProductCollection],
        aggregated: &[AggregatedKeyword],
        options: &ResearchOptions,
        progress: &ProgressSender,
    ) -> OpportunityReport {
        let universe = build_universe(collections);
        if universe.is_empty() {
            progress.send(ResearchPhase::OpportunityMining, "no keywords to mine", 70);
            return OpportunityReport::default();
        }

        let all_keywords = sorted_candidates(&universe);

        let qualified: HashSet<String> = all_keywords
            .iter()
            .filter(|c| passes_filters(c, options))
            .map(|c| c.keyword.clone())
            .collect();

        progress.send(
            ResearchPhase::OpportunityMining,
            format!("{} keywords qualified, mining related terms", qualified.len()),
            70,
        );

        let mined = self.mine_related(aggregated, &universe, options).await;

        // Final cut: the primary product's own keywords, universe stats
        // attached, volume-descending, capped.
        let mut opportunities: Vec<OpportunityCandidate> = collections
            .first()
            .filter(|primary| primary.status.is_collected())
            .map(|primary| {
                primary
                    .occurrences
                    .iter()
                    .filter(|occ| qualified.contains(&occ.keyword))
                    .filter_map(|occ| universe.get(&occ.keyword))
                    .map(UniverseEntry::to_candidate)
                    .collect()
            })
            .unwrap_or_default();
        opportunities.sort_by(|a, b| b.search_volume.cmp(&a.search_volume));
        opportunities.truncate(PRIMARY_CAP);

        OpportunityReport {
            opportunities,
            all_keywords_with_competition: all_keywords,
            mined,
        }
    }

    /// Best-effort mining of related keywords for the top aggregated seeds.
    /// Provider failures are logged and swallowed; an empty result is fine.
    async fn mine_related(
        &self,
        aggregated: &[AggregatedKeyword],
        universe: &HashMap<String, UniverseEntry>,
        options: &ResearchOptions,
    ) -> Vec<OpportunityCandidate> {
        let filters = MiningFilters {
            min_search: options.min_search_volume,
            max_supply_demand_ratio: SUPPLY_DEMAND_CEILING,
            size: 20,
        };

        let mut mined = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for seed in aggregated.iter().take(MINING_SEEDS) {
            match self.provider.keyword_mining(&seed.keyword, &filters).await {
                Ok(occurrences) => {
                    for occ in occurrences {
                        if universe.contains_key(&occ.keyword) || !seen.insert(occ.keyword.clone())
                        {
                            continue;
                        }
                        mined.push(OpportunityCandidate {
                            keyword: occ.keyword.clone(),
                            search_volume: occ.search_volume,
                            avg_cpc: occ.cpc,
                            competitors_in_top15: 0,
                            competitors_ranking: 0,
                            avg_competitor_rank: 0.0,
                            competitor_strength: 1.0,
                            opportunity_type: OpportunityType::KeywordMining,
                            attrs: occ.attrs,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        seed = %seed.keyword,
                        error = %e,
                        "keyword mining failed — continuing without related terms"
                    );
                }
            }
        }

        mined
    }
}

/// The full universe as candidates, highest volume first. Shared with the
/// session reconstructor so a rebuilt session reports the same universe
/// statistics the live run did.
pub(crate) fn universe_candidates(collections: &[ProductCollection]) -> Vec<OpportunityCandidate> {
    sorted_candidates(&build_universe(collections))
}

fn sorted_candidates(universe: &HashMap<String, UniverseEntry>) -> Vec<OpportunityCandidate> {
    let mut all: Vec<OpportunityCandidate> =
        universe.values().map(UniverseEntry::to_candidate).collect();
    all.sort_by(|a, b| {
        b.search_volume
            .cmp(&a.search_volume)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    all
}

/// Accumulate the universe from all successful collections. Competitor
/// ranking entries come from every product except the first (the primary).
fn build_universe(collections: &[ProductCollection]) -> HashMap<String, UniverseEntry> {
    let mut universe: HashMap<String, UniverseEntry> = HashMap::new();

    for (index, collection) in collections.iter().enumerate() {
        if !collection.status.is_collected() {
            continue;
        }
        let is_competitor = index > 0;
        for occ in &collection.occurrences {
            universe
                .entry(occ.keyword.clone())
                .or_insert_with(|| UniverseEntry::new(&occ.keyword))
                .absorb(occ, &collection.asin, is_competitor);
        }
    }

    universe
}

fn passes_filters(candidate: &OpportunityCandidate, options: &ResearchOptions) -> bool {
    if candidate.search_volume < options.min_search_volume
        || candidate.search_volume > options.max_search_volume
    {
        return false;
    }
    if candidate.competitors_in_top15 > options.max_competitors_in_top15 {
        return false;
    }
    if candidate.competitors_ranking < options.min_competitors_ranking {
        return false;
    }
    if candidate.competitor_strength > options.max_competitor_strength {
        return false;
    }
    if candidate
        .attrs
        .ad_products
        .is_some_and(|ads| f64::from(ads) > AD_PRODUCTS_CEILING)
    {
        return false;
    }
    if candidate
        .attrs
        .supply_demand_ratio
        .is_some_and(|ratio| ratio > SUPPLY_DEMAND_CEILING)
    {
        return false;
    }
    if candidate
        .attrs
        .products_count
        .is_some_and(|count| count > PRODUCTS_CEILING)
    {
        return false;
    }
    true
}
