//! Three-way gap classification for the primary product.
//!
//! Compares how the primary ("user") product ranks against every
//! competitor, keyword by keyword, and classifies exploitable situations:
//! nobody ranks (market gap), the user ranks and competitors don't (user
//! advantage), or competitors are weak where the user is absent
//! (competitor weakness). Defined only when at least two products were
//! successfully collected — with one product there is nothing to compare
//! against, and the analysis is simply absent.

use std::collections::HashMap;

use kwlens_core::{
    GapAnalysis, GapImpact, GapRecord, GapSummary, GapType, KeywordAttributes,
    ProductCollection, RankingEntry, ResearchOptions,
};

use crate::score::clamp_gap_score;

/// Positions at or under this count as "ranking well".
const RANKING_WELL_CUTOFF: u32 = 20;
/// Positions beyond this (or no ranking at all) count as "ranking poorly".
const RANKING_POORLY_FLOOR: u32 = 30;
/// Gap set cap.
const GAP_CAP: usize = 50;
/// CPC under this signals low commercial competition and earns +1.
const LOW_CPC_BONUS_CUTOFF: f64 = 0.50;
/// Volume floor for a medium potential-impact rating.
const MEDIUM_IMPACT_VOLUME: u32 = 2_000;

/// Per-keyword view assembled before classification.
struct KeywordView {
    keyword: String,
    max_volume: u32,
    cpc_values: Vec<f64>,
    user_ranking: Option<RankingEntry>,
    competitor_rankings: Vec<RankingEntry>,
}

/// Dynamic threshold scaled by competitor count.
///
/// Small fields need absolute floors (with two competitors, one counts);
/// large fields scale multiplicatively.
fn threshold(base: f64, competitor_count: u32) -> u32 {
    let n = f64::from(competitor_count);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = if competitor_count <= 2 {
        ((n * 0.5).floor() as u32).max(1)
    } else if competitor_count <= 5 {
        ((n * base * 0.9).floor() as u32).max(2)
    } else {
        (n * base).floor() as u32
    };
    value
}

/// Classify gaps across all keywords meeting the volume floor.
///
/// Returns `None` when fewer than two products were successfully collected
/// or when the primary product itself failed collection — the "user" role
/// is then undefined and the analysis is absent rather than an error.
#[must_use]
pub fn analyze_gaps(
    collections: &[ProductCollection],
    options: &ResearchOptions,
) -> Option<GapAnalysis> {
    let primary = collections.first()?;
    if !primary.status.is_collected() {
        return None;
    }
    let competitors: Vec<&ProductCollection> = collections[1..]
        .iter()
        .filter(|c| c.status.is_collected())
        .collect();
    if competitors.is_empty() {
        return None;
    }
    let competitor_count = u32::try_from(competitors.len()).unwrap_or(u32::MAX);

    let views = build_views(primary, &competitors, options);

    let mut gaps: Vec<GapRecord> = views
        .into_values()
        .filter_map(|view| classify(&view, competitor_count, options))
        .collect();

    gaps.sort_by(|a, b| {
        b.gap_score
            .cmp(&a.gap_score)
            .then_with(|| b.search_volume.cmp(&a.search_volume))
    });
    gaps.truncate(GAP_CAP);

    let summary = summarize(&gaps, options);
    Some(GapAnalysis { gaps, summary })
}

fn view_entry<'a>(
    views: &'a mut HashMap<String, KeywordView>,
    keyword: &str,
) -> &'a mut KeywordView {
    views.entry(keyword.to_owned()).or_insert_with(|| KeywordView {
        keyword: keyword.to_owned(),
        max_volume: 0,
        cpc_values: Vec::new(),
        user_ranking: None,
        competitor_rankings: Vec::new(),
    })
}

fn build_views(
    primary: &ProductCollection,
    competitors: &[&ProductCollection],
    options: &ResearchOptions,
) -> HashMap<String, KeywordView> {
    let mut views: HashMap<String, KeywordView> = HashMap::new();

    for occ in &primary.occurrences {
        if occ.search_volume < options.min_gap_volume {
            continue;
        }
        let view = view_entry(&mut views, &occ.keyword);
        view.max_volume = view.max_volume.max(occ.search_volume);
        view.cpc_values.push(occ.cpc);
        if let Some(position) = occ.position {
            view.user_ranking = Some(RankingEntry {
                asin: primary.asin.clone(),
                position,
                traffic_share: occ.traffic_share,
            });
        }
    }

    for collection in competitors {
        for occ in &collection.occurrences {
            if occ.search_volume < options.min_gap_volume {
                continue;
            }
            let view = view_entry(&mut views, &occ.keyword);
            view.max_volume = view.max_volume.max(occ.search_volume);
            view.cpc_values.push(occ.cpc);
            if let Some(position) = occ.position {
                view.competitor_rankings.push(RankingEntry {
                    asin: collection.asin.clone(),
                    position,
                    traffic_share: occ.traffic_share,
                });
            }
        }
    }

    views
}

fn classify(
    view: &KeywordView,
    competitor_count: u32,
    options: &ResearchOptions,
) -> Option<GapRecord> {
    let user_position = view.user_ranking.as_ref().map(|r| r.position);

    let competitors_ranking_well = u32::try_from(
        view.competitor_rankings
            .iter()
            .filter(|r| r.position <= RANKING_WELL_CUTOFF)
            .count(),
    )
    .unwrap_or(u32::MAX);
    let competitors_not_poor = u32::try_from(
        view.competitor_rankings
            .iter()
            .filter(|r| r.position <= RANKING_POORLY_FLOOR)
            .count(),
    )
    .unwrap_or(u32::MAX);
    // Poorly = beyond the floor or absent from the keyword entirely.
    let competitors_ranking_poorly = competitor_count.saturating_sub(competitors_not_poor);

    #[allow(clippy::cast_precision_loss)]
    let avg_cpc = if view.cpc_values.is_empty() {
        0.0
    } else {
        view.cpc_values.iter().sum::<f64>() / view.cpc_values.len() as f64
    };

    let user_ranks_well = user_position.is_some_and(|p| p <= RANKING_WELL_CUTOFF);
    let user_absent = user_position.is_none_or(|p| p > options.max_gap_position);

    let (gap_type, base_score) = if !user_ranks_well && competitors_ranking_well == 0 {
        (
            GapType::MarketGap,
            market_gap_score(view.max_volume, competitor_count),
        )
    } else if user_ranks_well
        && competitors_ranking_poorly >= threshold(0.7, competitor_count)
    {
        let beaten = count_beaten(view, user_position, competitor_count);
        (
            GapType::UserAdvantage,
            user_advantage_score(user_position, beaten),
        )
    } else if user_absent && competitors_ranking_poorly >= threshold(0.6, competitor_count) {
        (
            GapType::CompetitorWeakness,
            competitor_weakness_score(
                view.max_volume,
                competitors_ranking_poorly,
                competitor_count,
            ),
        )
    } else {
        return None;
    };

    let mut score = base_score;
    if avg_cpc < LOW_CPC_BONUS_CUTOFF {
        score += 1.0;
    }
    let gap_score = clamp_gap_score(score);

    let potential_impact = impact(gap_type, view.max_volume, options);

    Some(GapRecord {
        keyword: view.keyword.clone(),
        search_volume: view.max_volume,
        avg_cpc,
        gap_type,
        gap_score,
        user_ranking: view.user_ranking.clone(),
        competitor_rankings: view.competitor_rankings.clone(),
        recommendation: recommendation(gap_type, view, competitors_ranking_poorly, competitor_count),
        potential_impact,
        attrs: KeywordAttributes::default(),
    })
}

/// Competitors the user outranks: worse-positioned or absent entirely.
fn count_beaten(view: &KeywordView, user_position: Option<u32>, competitor_count: u32) -> u32 {
    let Some(user_pos) = user_position else {
        return 0;
    };
    let outranked = u32::try_from(
        view.competitor_rankings
            .iter()
            .filter(|r| r.position > user_pos)
            .count(),
    )
    .unwrap_or(u32::MAX);
    let absent = competitor_count.saturating_sub(
        u32::try_from(view.competitor_rankings.len()).unwrap_or(u32::MAX),
    );
    outranked.saturating_add(absent)
}

/// Volume-tiered base for an open market gap, discounted when the
/// competitor sample is too small to be confident nobody ranks.
fn market_gap_score(volume: u32, competitor_count: u32) -> f64 {
    let base = if volume >= 20_000 {
        10.0
    } else if volume >= 10_000 {
        9.0
    } else if volume >= 5_000 {
        8.0
    } else if volume >= 2_000 {
        6.0
    } else if volume >= 1_000 {
        5.0
    } else if volume >= 500 {
        4.0
    } else {
        3.0
    };
    if competitor_count < 5 {
        base - 1.0
    } else {
        base
    }
}

/// Rank-tiered base for a defended position, sweetened per two beaten
/// competitors.
fn user_advantage_score(user_position: Option<u32>, beaten: u32) -> f64 {
    let base = match user_position {
        Some(p) if p <= 3 => 10.0,
        Some(p) if p <= 6 => 9.0,
        Some(p) if p <= 10 => 8.0,
        Some(p) if p <= 15 => 7.0,
        _ => 5.0,
    };
    base + f64::from((beaten / 2).min(2))
}

/// Volume-tiered base for weak-competitor terrain, with bonuses for how
/// widespread and how numerous the weakness is.
fn competitor_weakness_score(volume: u32, poorly: u32, competitor_count: u32) -> f64 {
    let mut score = if volume >= 10_000 {
        7.0
    } else if volume >= 2_000 {
        6.0
    } else {
        5.0
    };
    if competitor_count > 0 && f64::from(poorly) / f64::from(competitor_count) >= 0.75 {
        score += 1.0;
    }
    if poorly >= 4 {
        score += 1.0;
    }
    score
}

fn impact(gap_type: GapType, volume: u32, options: &ResearchOptions) -> GapImpact {
    let tier = if volume >= options.focus_volume_threshold {
        GapImpact::High
    } else if volume >= MEDIUM_IMPACT_VOLUME {
        GapImpact::Medium
    } else {
        GapImpact::Low
    };
    // An already-held ranking is worth defending regardless of volume.
    if gap_type == GapType::UserAdvantage {
        tier.max(GapImpact::Medium)
    } else {
        tier
    }
}

fn recommendation(
    gap_type: GapType,
    view: &KeywordView,
    poorly: u32,
    competitor_count: u32,
) -> String {
    match gap_type {
        GapType::MarketGap => format!(
            "No product ranks in the top {RANKING_WELL_CUTOFF} for \"{}\"; a keyword-targeted listing update could capture it outright.",
            view.keyword
        ),
        GapType::UserAdvantage => {
            let position = view
                .user_ranking
                .as_ref()
                .map_or_else(|| "-".to_string(), |r| r.position.to_string());
            format!(
                "You rank #{position} while {poorly} of {competitor_count} competitors rank poorly; defend the position and harvest it with ads."
            )
        }
        GapType::CompetitorWeakness => format!(
            "{poorly} of {competitor_count} competitors rank poorly for \"{}\" and you are absent; even a mid-page ranking would capture share.",
            view.keyword
        ),
    }
}

/// Aggregate counts over a gap set. Also used by the session reconstructor
/// so a rebuilt summary matches the live one.
pub(crate) fn summarize(gaps: &[GapRecord], options: &ResearchOptions) -> GapSummary {
    let high = gaps
        .iter()
        .filter(|g| g.search_volume >= options.focus_volume_threshold)
        .count();
    let medium = gaps
        .iter()
        .filter(|g| {
            g.search_volume >= MEDIUM_IMPACT_VOLUME
                && g.search_volume < options.focus_volume_threshold
        })
        .count();
    let total: u64 = gaps.iter().map(|g| u64::from(g.search_volume)).sum();
    #[allow(clippy::cast_possible_truncation)]
    let avg = if gaps.is_empty() {
        0
    } else {
        (total / gaps.len() as u64) as u32
    };

    GapSummary {
        high_volume_gaps: u32::try_from(high).unwrap_or(u32::MAX),
        medium_volume_gaps: u32::try_from(medium).unwrap_or(u32::MAX),
        avg_gap_volume: avg,
        total_gap_potential: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::occurrence;

    fn options() -> ResearchOptions {
        ResearchOptions {
            min_gap_volume: 500,
            max_gap_position: 30,
            focus_volume_threshold: 5_000,
            ..ResearchOptions::default()
        }
    }

    fn user(occurrences: Vec<kwlens_core::KeywordOccurrence>) -> ProductCollection {
        ProductCollection::collected("B000000001", occurrences)
    }

    fn rival(asin: &str, occurrences: Vec<kwlens_core::KeywordOccurrence>) -> ProductCollection {
        ProductCollection::collected(asin, occurrences)
    }

    #[test]
    fn absent_with_fewer_than_two_successful_products() {
        let single = vec![user(vec![occurrence("mouse", 6_000, 1.0, Some(5))])];
        assert!(analyze_gaps(&single, &options()).is_none());

        let with_failed = vec![
            user(vec![occurrence("mouse", 6_000, 1.0, Some(5))]),
            ProductCollection::failed("B000000002", "timeout".to_owned()),
        ];
        assert!(analyze_gaps(&with_failed, &options()).is_none());
    }

    #[test]
    fn absent_when_primary_product_failed() {
        let collections = vec![
            ProductCollection::failed("B000000001", "timeout".to_owned()),
            rival("B000000002", vec![occurrence("mouse", 6_000, 1.0, Some(5))]),
            rival("B000000003", vec![occurrence("mouse", 6_000, 1.0, Some(9))]),
        ];
        assert!(analyze_gaps(&collections, &options()).is_none());
    }

    #[test]
    fn market_gap_when_nobody_ranks_well() {
        let collections = vec![
            user(vec![occurrence("niche term", 6_000, 1.0, None)]),
            rival("B000000002", vec![occurrence("niche term", 6_000, 1.0, Some(55))]),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();

        assert_eq!(analysis.gaps.len(), 1);
        let gap = &analysis.gaps[0];
        assert_eq!(gap.gap_type, GapType::MarketGap);
        // Volume 6000 → base 8, minus 1 for a small competitor sample.
        assert_eq!(gap.gap_score, 7);
        assert_eq!(gap.potential_impact, GapImpact::High);
    }

    #[test]
    fn well_ranked_competitor_blocks_market_gap_and_excludes_keyword() {
        // User unranked, one competitor at #3. Not a market gap (a
        // competitor ranks well), not a user advantage (user doesn't
        // rank), not competitor weakness (nobody ranks poorly) —
        // excluded from the gap set entirely.
        let collections = vec![
            user(vec![occurrence("contested", 6_000, 1.0, None)]),
            rival("B000000002", vec![occurrence("contested", 6_000, 1.0, Some(3))]),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();
        assert!(analysis.gaps.is_empty());
    }

    #[test]
    fn user_advantage_when_user_ranks_and_competitors_dont() {
        let collections = vec![
            user(vec![occurrence("our term", 3_000, 1.0, Some(2))]),
            rival("B000000002", vec![occurrence("our term", 3_000, 1.0, Some(80))]),
            rival("B000000003", vec![]),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();

        let gap = &analysis.gaps[0];
        assert_eq!(gap.gap_type, GapType::UserAdvantage);
        // Rank 2 → base 10, +1 for beating both competitors, clamped to 10.
        assert_eq!(gap.gap_score, 10);
        assert!(gap.potential_impact >= GapImpact::Medium);
        assert_eq!(gap.user_ranking.as_ref().unwrap().position, 2);
    }

    #[test]
    fn competitor_weakness_when_user_absent_and_field_is_weak() {
        // One competitor holds the term (blocking a market-gap call), the
        // other ranks deep on page two while the user is absent.
        let collections = vec![
            user(vec![occurrence("their weak spot", 3_000, 1.0, None)]),
            rival(
                "B000000002",
                vec![occurrence("their weak spot", 3_000, 1.0, Some(15))],
            ),
            rival(
                "B000000003",
                vec![occurrence("their weak spot", 3_000, 1.0, Some(90))],
            ),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();

        let gap = &analysis.gaps[0];
        assert_eq!(gap.gap_type, GapType::CompetitorWeakness);
        // Volume 3000 → base 6; 1 of 2 poorly (50% < 75%), no count bonus.
        assert_eq!(gap.gap_score, 6);
    }

    #[test]
    fn low_cpc_earns_a_bonus_point() {
        let collections = |cpc: f64| {
            vec![
                user(vec![occurrence("cheap clicks", 1_500, cpc, None)]),
                rival(
                    "B000000002",
                    vec![occurrence("cheap clicks", 1_500, cpc, Some(60))],
                ),
            ]
        };

        let pricey = analyze_gaps(&collections(1.2), &options()).unwrap();
        let cheap = analyze_gaps(&collections(0.3), &options()).unwrap();
        assert_eq!(
            cheap.gaps[0].gap_score,
            pricey.gaps[0].gap_score + 1,
            "sub-$0.50 CPC adds one point"
        );
    }

    #[test]
    fn low_volume_keywords_do_not_participate() {
        let collections = vec![
            user(vec![occurrence("tiny", 200, 1.0, None)]),
            rival("B000000002", vec![occurrence("tiny", 200, 1.0, Some(70))]),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();
        assert!(analysis.gaps.is_empty());
    }

    #[test]
    fn scores_are_integers_in_bounds() {
        let collections = vec![
            user(vec![
                occurrence("a", 25_000, 0.2, None),
                occurrence("b", 8_000, 1.0, Some(1)),
                occurrence("c", 900, 0.1, None),
            ]),
            rival(
                "B000000002",
                vec![
                    occurrence("a", 25_000, 0.2, Some(95)),
                    occurrence("b", 8_000, 1.0, Some(88)),
                    occurrence("c", 900, 0.1, Some(77)),
                ],
            ),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();
        for gap in &analysis.gaps {
            assert!((1..=10).contains(&gap.gap_score), "score {} out of bounds", gap.gap_score);
        }
    }

    #[test]
    fn summary_counts_and_totals() {
        let collections = vec![
            user(vec![
                occurrence("high", 9_000, 1.0, None),
                occurrence("medium", 3_000, 1.0, None),
                occurrence("low", 800, 1.0, None),
            ]),
            rival(
                "B000000002",
                vec![
                    occurrence("high", 9_000, 1.0, Some(60)),
                    occurrence("medium", 3_000, 1.0, Some(60)),
                    occurrence("low", 800, 1.0, Some(60)),
                ],
            ),
        ];
        let analysis = analyze_gaps(&collections, &options()).unwrap();
        let summary = &analysis.summary;

        assert_eq!(summary.high_volume_gaps, 1);
        assert_eq!(summary.medium_volume_gaps, 1);
        assert_eq!(summary.total_gap_potential, 12_800);
        assert_eq!(summary.avg_gap_volume, 4_266);
    }

    #[test]
    fn sorted_by_score_then_volume_and_capped() {
        let mut user_occs = Vec::new();
        let mut rival_occs = Vec::new();
        for i in 0u32..60 {
            let kw = format!("kw{i}");
            user_occs.push(occurrence(&kw, 1_000 + i, 1.0, None));
            rival_occs.push(occurrence(&kw, 1_000 + i, 1.0, Some(80)));
        }
        let collections = vec![user(user_occs), rival("B000000002", rival_occs)];
        let analysis = analyze_gaps(&collections, &options()).unwrap();

        assert_eq!(analysis.gaps.len(), 50, "capped at 50");
        for pair in analysis.gaps.windows(2) {
            assert!(
                pair[0].gap_score > pair[1].gap_score
                    || (pair[0].gap_score == pair[1].gap_score
                        && pair[0].search_volume >= pair[1].search_volume)
            );
        }
    }

    #[test]
    fn gap_analysis_is_deterministic() {
        let collections = vec![
            user(vec![occurrence("alpha", 4_000, 0.4, Some(5))]),
            rival("B000000002", vec![occurrence("alpha", 4_000, 0.4, Some(90))]),
        ];
        let a = analyze_gaps(&collections, &options()).unwrap();
        let b = analyze_gaps(&collections, &options()).unwrap();
        assert_eq!(a.gaps[0].gap_score, b.gaps[0].gap_score);
        assert_eq!(a.summary, b.summary);
    }
}
