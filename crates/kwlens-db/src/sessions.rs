//! Database operations for `research_sessions` and its child tables.
//!
//! A session is written atomically: the header row plus all normalized
//! child rows in one transaction. Reads return the rows the engine's
//! reconstructor consumes; no aggregation happens at the SQL layer.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use kwlens_core::{
    GapImpact, GapRecord, GapType, KeywordAttributes, OpportunityCandidate, OpportunityType,
    ProductStatus, RankingEntry, ResearchSession, SessionSummary,
};
use kwlens_engine::{SessionRows, StoredProduct, StoredRanking};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Header row from `research_sessions`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SessionHeaderRow {
    id: i64,
    options: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SessionProductRow {
    asin: String,
    ordinal: i32,
    status: String,
    error_message: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct KeywordRankingRow {
    asin: String,
    keyword: String,
    search_volume: i32,
    cpc: f64,
    position: Option<i32>,
    traffic_share: Option<f64>,
    products_count: Option<i32>,
    purchases: Option<i32>,
    purchase_rate: Option<f64>,
    supply_demand_ratio: Option<f64>,
    ad_products: Option<i32>,
    bid_min: Option<f64>,
    bid_max: Option<f64>,
    monopoly_click_rate: Option<f64>,
    title_density: Option<f64>,
    avg_price: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct OpportunityRow {
    keyword: String,
    search_volume: i32,
    avg_cpc: f64,
    opportunity_type: String,
    competitors_in_top15: i32,
    competitors_ranking: i32,
    avg_competitor_rank: f64,
    competitor_strength: f64,
    attributes: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct GapRow {
    keyword: String,
    search_volume: i32,
    avg_cpc: f64,
    gap_type: String,
    gap_score: i16,
    user_position: Option<i32>,
    user_traffic_share: Option<f64>,
    competitor_rankings: serde_json::Value,
    recommendation: String,
    potential_impact: String,
    attributes: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Enum <-> text mappings
// ---------------------------------------------------------------------------

fn opportunity_type_to_str(t: OpportunityType) -> &'static str {
    match t {
        OpportunityType::MarketGap => "market_gap",
        OpportunityType::WeakCompetitors => "weak_competitors",
        OpportunityType::LowCompetition => "low_competition",
        OpportunityType::KeywordMining => "keyword_mining",
    }
}

fn opportunity_type_from_str(s: &str) -> Result<OpportunityType, DbError> {
    match s {
        "market_gap" => Ok(OpportunityType::MarketGap),
        "weak_competitors" => Ok(OpportunityType::WeakCompetitors),
        "low_competition" => Ok(OpportunityType::LowCompetition),
        "keyword_mining" => Ok(OpportunityType::KeywordMining),
        other => Err(DbError::CorruptPayload(format!(
            "unknown opportunity type '{other}'"
        ))),
    }
}

fn gap_type_to_str(t: GapType) -> &'static str {
    match t {
        GapType::MarketGap => "market_gap",
        GapType::UserAdvantage => "user_advantage",
        GapType::CompetitorWeakness => "competitor_weakness",
    }
}

fn gap_type_from_str(s: &str) -> Result<GapType, DbError> {
    match s {
        "market_gap" => Ok(GapType::MarketGap),
        "user_advantage" => Ok(GapType::UserAdvantage),
        "competitor_weakness" => Ok(GapType::CompetitorWeakness),
        other => Err(DbError::CorruptPayload(format!("unknown gap type '{other}'"))),
    }
}

fn impact_to_str(i: GapImpact) -> &'static str {
    match i {
        GapImpact::Low => "low",
        GapImpact::Medium => "medium",
        GapImpact::High => "high",
    }
}

fn impact_from_str(s: &str) -> Result<GapImpact, DbError> {
    match s {
        "low" => Ok(GapImpact::Low),
        "medium" => Ok(GapImpact::Medium),
        "high" => Ok(GapImpact::High),
        other => Err(DbError::CorruptPayload(format!(
            "unknown potential impact '{other}'"
        ))),
    }
}

#[allow(clippy::cast_sign_loss)]
fn as_u32(value: i32) -> u32 {
    value.max(0) as u32
}

fn as_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Persist a completed session with all normalized child rows.
///
/// Runs in one transaction; a failure on any child insert rolls the whole
/// session back. Returns the generated public id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails.
pub async fn save_session(
    pool: &PgPool,
    user_id: &str,
    name: Option<&str>,
    session: &ResearchSession,
) -> Result<Uuid, DbError> {
    let public_id = Uuid::new_v4();
    let options =
        serde_json::to_value(&session.options).map_err(|e| DbError::CorruptPayload(e.to_string()))?;

    let mut tx = pool.begin().await?;

    let session_id: i64 = sqlx::query_scalar(
        "INSERT INTO research_sessions (public_id, user_id, name, options, created_at) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(public_id)
    .bind(user_id)
    .bind(name)
    .bind(options)
    .bind(session.created_at)
    .fetch_one(&mut *tx)
    .await?;

    for (ordinal, collection) in session.collections.iter().enumerate() {
        let (status, error_message) = match &collection.status {
            ProductStatus::Collected => ("collected", None),
            ProductStatus::Failed(e) => ("failed", Some(e.as_str())),
        };
        sqlx::query(
            "INSERT INTO session_products \
                 (session_id, asin, ordinal, status, error_message, keyword_count) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session_id)
        .bind(&collection.asin)
        .bind(i32::try_from(ordinal).unwrap_or(i32::MAX))
        .bind(status)
        .bind(error_message)
        .bind(i32::try_from(collection.occurrences.len()).unwrap_or(i32::MAX))
        .execute(&mut *tx)
        .await?;

        for occ in &collection.occurrences {
            sqlx::query(
                "INSERT INTO keyword_rankings \
                     (session_id, asin, keyword, search_volume, cpc, position, traffic_share, \
                      products_count, purchases, purchase_rate, supply_demand_ratio, ad_products, \
                      bid_min, bid_max, monopoly_click_rate, title_density, avg_price) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            )
            .bind(session_id)
            .bind(&collection.asin)
            .bind(&occ.keyword)
            .bind(as_i32(occ.search_volume))
            .bind(occ.cpc)
            .bind(occ.position.map(as_i32))
            .bind(occ.traffic_share)
            .bind(occ.attrs.products_count.map(as_i32))
            .bind(occ.attrs.purchases.map(as_i32))
            .bind(occ.attrs.purchase_rate)
            .bind(occ.attrs.supply_demand_ratio)
            .bind(occ.attrs.ad_products.map(as_i32))
            .bind(occ.attrs.bid_min)
            .bind(occ.attrs.bid_max)
            .bind(occ.attrs.monopoly_click_rate)
            .bind(occ.attrs.title_density)
            .bind(occ.attrs.avg_price)
            .execute(&mut *tx)
            .await?;
        }
    }

    let opportunity_rows = session
        .opportunities
        .opportunities
        .iter()
        .chain(&session.opportunities.mined);
    for candidate in opportunity_rows {
        let attributes = serde_json::to_value(&candidate.attrs)
            .map_err(|e| DbError::CorruptPayload(e.to_string()))?;
        sqlx::query(
            "INSERT INTO session_opportunities \
                 (session_id, keyword, search_volume, avg_cpc, opportunity_type, \
                  competitors_in_top15, competitors_ranking, avg_competitor_rank, \
                  competitor_strength, attributes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(session_id)
        .bind(&candidate.keyword)
        .bind(as_i32(candidate.search_volume))
        .bind(candidate.avg_cpc)
        .bind(opportunity_type_to_str(candidate.opportunity_type))
        .bind(as_i32(candidate.competitors_in_top15))
        .bind(as_i32(candidate.competitors_ranking))
        .bind(candidate.avg_competitor_rank)
        .bind(candidate.competitor_strength)
        .bind(attributes)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(analysis) = &session.gaps {
        for gap in &analysis.gaps {
            let competitor_rankings = serde_json::to_value(&gap.competitor_rankings)
                .map_err(|e| DbError::CorruptPayload(e.to_string()))?;
            let attributes = serde_json::to_value(&gap.attrs)
                .map_err(|e| DbError::CorruptPayload(e.to_string()))?;
            sqlx::query(
                "INSERT INTO session_gaps \
                     (session_id, keyword, search_volume, avg_cpc, gap_type, gap_score, \
                      user_position, user_traffic_share, competitor_rankings, recommendation, \
                      potential_impact, attributes) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(session_id)
            .bind(&gap.keyword)
            .bind(as_i32(gap.search_volume))
            .bind(gap.avg_cpc)
            .bind(gap_type_to_str(gap.gap_type))
            .bind(i16::from(gap.gap_score))
            .bind(gap.user_ranking.as_ref().map(|r| as_i32(r.position)))
            .bind(gap.user_ranking.as_ref().and_then(|r| r.traffic_share))
            .bind(competitor_rankings)
            .bind(&gap.recommendation)
            .bind(impact_to_str(gap.potential_impact))
            .bind(attributes)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        %public_id,
        user = user_id,
        products = session.products.len(),
        "research session persisted"
    );
    Ok(public_id)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// List a user's sessions, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_sessions(pool: &PgPool, user_id: &str) -> Result<Vec<SessionSummary>, DbError> {
    #[derive(sqlx::FromRow)]
    struct ListRow {
        id: i64,
        public_id: Uuid,
        name: Option<String>,
        created_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, ListRow>(
        "SELECT id, public_id, name, created_at \
         FROM research_sessions \
         WHERE user_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let products: Vec<String> = sqlx::query_scalar(
            "SELECT asin FROM session_products WHERE session_id = $1 ORDER BY ordinal",
        )
        .bind(row.id)
        .fetch_all(pool)
        .await?;

        summaries.push(SessionSummary {
            id: row.public_id,
            name: row.name,
            products,
            created_at: row.created_at,
        });
    }
    Ok(summaries)
}

/// Fetch the normalized rows for one session, or `None` for an unknown id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or
/// [`DbError::CorruptPayload`] when stored JSON does not deserialize.
pub async fn fetch_session_rows(
    pool: &PgPool,
    user_id: &str,
    session_id: Uuid,
) -> Result<Option<SessionRows>, DbError> {
    let Some(header) = sqlx::query_as::<_, SessionHeaderRow>(
        "SELECT id, options, created_at \
         FROM research_sessions \
         WHERE public_id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let options = serde_json::from_value(header.options)
        .map_err(|e| DbError::CorruptPayload(format!("options: {e}")))?;

    let products: Vec<StoredProduct> = sqlx::query_as::<_, SessionProductRow>(
        "SELECT asin, ordinal, status, error_message \
         FROM session_products \
         WHERE session_id = $1 \
         ORDER BY ordinal",
    )
    .bind(header.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| StoredProduct {
        asin: row.asin,
        ordinal: as_u32(row.ordinal),
        status: if row.status == "failed" {
            ProductStatus::Failed(row.error_message.unwrap_or_default())
        } else {
            ProductStatus::Collected
        },
    })
    .collect();

    // The user ranking inside a gap row belongs to the primary product.
    let primary_asin = products
        .first()
        .map(|p: &StoredProduct| p.asin.clone())
        .unwrap_or_default();

    let rankings = sqlx::query_as::<_, KeywordRankingRow>(
        "SELECT asin, keyword, search_volume, cpc, position, traffic_share, \
                products_count, purchases, purchase_rate, supply_demand_ratio, ad_products, \
                bid_min, bid_max, monopoly_click_rate, title_density, avg_price \
         FROM keyword_rankings \
         WHERE session_id = $1 \
         ORDER BY id",
    )
    .bind(header.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| StoredRanking {
        asin: row.asin,
        keyword: row.keyword,
        search_volume: as_u32(row.search_volume),
        cpc: row.cpc,
        position: row.position.map(as_u32),
        traffic_share: row.traffic_share,
        attrs: KeywordAttributes {
            products_count: row.products_count.map(as_u32),
            purchases: row.purchases.map(as_u32),
            purchase_rate: row.purchase_rate,
            supply_demand_ratio: row.supply_demand_ratio,
            ad_products: row.ad_products.map(as_u32),
            bid_min: row.bid_min,
            bid_max: row.bid_max,
            monopoly_click_rate: row.monopoly_click_rate,
            title_density: row.title_density,
            avg_price: row.avg_price,
            ..KeywordAttributes::default()
        },
    })
    .collect();

    let opportunity_rows = sqlx::query_as::<_, OpportunityRow>(
        "SELECT keyword, search_volume, avg_cpc, opportunity_type, competitors_in_top15, \
                competitors_ranking, avg_competitor_rank, competitor_strength, attributes \
         FROM session_opportunities \
         WHERE session_id = $1 \
         ORDER BY id",
    )
    .bind(header.id)
    .fetch_all(pool)
    .await?;

    let mut opportunities = Vec::new();
    let mut mined = Vec::new();
    for row in opportunity_rows {
        let opportunity_type = opportunity_type_from_str(&row.opportunity_type)?;
        let attrs = serde_json::from_value(row.attributes)
            .map_err(|e| DbError::CorruptPayload(format!("opportunity attributes: {e}")))?;
        let candidate = OpportunityCandidate {
            keyword: row.keyword,
            search_volume: as_u32(row.search_volume),
            avg_cpc: row.avg_cpc,
            competitors_in_top15: as_u32(row.competitors_in_top15),
            competitors_ranking: as_u32(row.competitors_ranking),
            avg_competitor_rank: row.avg_competitor_rank,
            competitor_strength: row.competitor_strength,
            opportunity_type,
            attrs,
        };
        if opportunity_type == OpportunityType::KeywordMining {
            mined.push(candidate);
        } else {
            opportunities.push(candidate);
        }
    }

    let gaps = sqlx::query_as::<_, GapRow>(
        "SELECT keyword, search_volume, avg_cpc, gap_type, gap_score, user_position, \
                user_traffic_share, competitor_rankings, recommendation, potential_impact, \
                attributes \
         FROM session_gaps \
         WHERE session_id = $1 \
         ORDER BY id",
    )
    .bind(header.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| -> Result<GapRecord, DbError> {
        let competitor_rankings: Vec<RankingEntry> =
            serde_json::from_value(row.competitor_rankings)
                .map_err(|e| DbError::CorruptPayload(format!("gap rankings: {e}")))?;
        let attrs = serde_json::from_value(row.attributes)
            .map_err(|e| DbError::CorruptPayload(format!("gap attributes: {e}")))?;
        Ok(GapRecord {
            keyword: row.keyword.clone(),
            search_volume: as_u32(row.search_volume),
            avg_cpc: row.avg_cpc,
            gap_type: gap_type_from_str(&row.gap_type)?,
            gap_score: u8::try_from(row.gap_score.clamp(1, 10)).unwrap_or(1),
            user_ranking: row.user_position.map(|p| RankingEntry {
                asin: primary_asin.clone(),
                position: as_u32(p),
                traffic_share: row.user_traffic_share,
            }),
            competitor_rankings,
            recommendation: row.recommendation,
            potential_impact: impact_from_str(&row.potential_impact)?,
            attrs,
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(SessionRows {
        options,
        products,
        rankings,
        opportunities,
        mined,
        gaps,
        created_at: header.created_at,
    }))
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Delete a session and (via cascade) all child rows.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, [`DbError::Sqlx`] on
/// query failure.
pub async fn delete_session(pool: &PgPool, user_id: &str, session_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM research_sessions WHERE public_id = $1 AND user_id = $2")
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Rename a session.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, [`DbError::Sqlx`] on
/// query failure.
pub async fn rename_session(
    pool: &PgPool,
    user_id: &str,
    session_id: Uuid,
    name: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE research_sessions \
         SET name = $1, updated_at = NOW() \
         WHERE public_id = $2 AND user_id = $3",
    )
    .bind(name)
    .bind(session_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opportunity_type_round_trips() {
        for t in [
            OpportunityType::MarketGap,
            OpportunityType::WeakCompetitors,
            OpportunityType::LowCompetition,
            OpportunityType::KeywordMining,
        ] {
            assert_eq!(opportunity_type_from_str(opportunity_type_to_str(t)).unwrap(), t);
        }
    }

    #[test]
    fn gap_type_round_trips() {
        for t in [
            GapType::MarketGap,
            GapType::UserAdvantage,
            GapType::CompetitorWeakness,
        ] {
            assert_eq!(gap_type_from_str(gap_type_to_str(t)).unwrap(), t);
        }
    }

    #[test]
    fn unknown_enum_text_is_corrupt_payload() {
        assert!(matches!(
            opportunity_type_from_str("surprise"),
            Err(DbError::CorruptPayload(_))
        ));
        assert!(matches!(
            gap_type_from_str("surprise"),
            Err(DbError::CorruptPayload(_))
        ));
        assert!(matches!(
            impact_from_str("surprise"),
            Err(DbError::CorruptPayload(_))
        ));
    }

    #[test]
    fn negative_db_values_clamp_to_zero() {
        assert_eq!(as_u32(-5), 0);
        assert_eq!(as_u32(42), 42);
    }
}
