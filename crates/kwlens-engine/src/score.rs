//! Opportunity and gap score curves.
//!
//! Every constant lives here and nowhere else: the live pipeline and the
//! session reconstructor both call into this module, which is what makes a
//! reconstructed session indistinguishable from a freshly computed one.
//! Scores are 1–10; the weighted raw score is pushed through a compression
//! curve so most keywords land in the 3–6 band and only genuinely rare
//! combinations reach 8+.

/// Weight of the volume component in the raw score.
const VOLUME_WEIGHT: f64 = 0.25;
/// Weight of the competition-scarcity component in the raw score.
const COMPETITION_WEIGHT: f64 = 0.60;
/// Weight of the commercial-intent (CPC) component in the raw score.
const CPC_WEIGHT: f64 = 0.15;

/// Score search volume into the 1–10 band. The 5k–10k range is the sweet
/// spot: enough demand to matter, not yet a head term.
#[must_use]
pub fn volume_score(volume: u32) -> f64 {
    let v = f64::from(volume);
    if (5_000.0..=10_000.0).contains(&v) {
        10.0
    } else if (2_000.0..5_000.0).contains(&v) {
        8.0
    } else if (1_000.0..2_000.0).contains(&v) {
        6.0
    } else if v > 10_000.0 && v <= 25_000.0 {
        7.0
    } else if (500.0..1_000.0).contains(&v) {
        4.0
    } else if v > 25_000.0 {
        3.0
    } else {
        2.0
    }
}

/// How many competitors a keyword of this volume would be expected to have.
#[must_use]
fn expected_competitors(volume: u32) -> f64 {
    let v = f64::from(volume);
    if v >= 10_000.0 {
        (v / 200.0).min(50.0)
    } else if v >= 5_000.0 {
        (v / 300.0).min(30.0)
    } else if v >= 1_000.0 {
        (v / 400.0).min(20.0)
    } else {
        (v / 500.0).min(10.0)
    }
}

/// Score competition scarcity: the fewer actual ranking competitors
/// relative to the volume-adjusted expectation, the higher the score.
///
/// `products_analyzed` scales the expectation down when few products were
/// researched — with 2 products we simply cannot have observed many
/// competitors, so the bar is lowered accordingly.
#[must_use]
pub fn competition_score(volume: u32, competitor_count: u32, products_analyzed: u32) -> f64 {
    if competitor_count == 0 {
        return 10.0;
    }
    let confidence = (f64::from(products_analyzed) / 5.0).min(1.2);
    let adjusted = expected_competitors(volume) * confidence;
    if adjusted <= 0.0 {
        return 1.0;
    }
    let ratio = f64::from(competitor_count) / adjusted;
    if ratio <= 0.2 {
        8.0
    } else if ratio <= 0.4 {
        6.0
    } else if ratio <= 0.6 {
        5.0
    } else if ratio <= 0.8 {
        4.0
    } else if ratio <= 1.0 {
        3.0
    } else if ratio <= 1.2 {
        2.0
    } else {
        1.0
    }
}

/// Score CPC as a commercial-intent signal. $1.20–1.80 is the sweet spot:
/// buyers are paying for clicks but the auction is not yet saturated.
#[must_use]
pub fn cpc_score(cpc: f64) -> f64 {
    if !cpc.is_finite() {
        return 2.0;
    }
    if (1.20..=1.80).contains(&cpc) {
        10.0
    } else if (0.90..1.20).contains(&cpc) {
        9.0
    } else if cpc > 1.80 && cpc <= 2.00 {
        8.0
    } else if (0.70..0.90).contains(&cpc) {
        7.0
    } else if (0.50..0.70).contains(&cpc) {
        6.0
    } else if cpc > 2.00 && cpc <= 10.00 {
        (12.0 - cpc * 1.25).clamp(2.0, 10.0)
    } else if (0.30..0.50).contains(&cpc) {
        4.0
    } else {
        // Below $0.30 there is no commercial intent; above $10 the auction
        // is out of reach.
        2.0
    }
}

/// The full opportunity score: weighted raw score, compression curve,
/// clamp, round to two decimals.
#[must_use]
pub fn opportunity_score(
    volume: u32,
    avg_cpc: f64,
    competitor_count: u32,
    products_analyzed: u32,
) -> f64 {
    let raw = volume_score(volume) * VOLUME_WEIGHT
        + competition_score(volume, competitor_count, products_analyzed) * COMPETITION_WEIGHT
        + cpc_score(avg_cpc) * CPC_WEIGHT;

    let mut compressed = if raw >= 8.0 {
        raw * 0.65 + 2.8
    } else if raw >= 6.5 {
        raw * 0.75 + 2.0
    } else if raw >= 5.0 {
        raw * 0.85 + 0.975
    } else {
        raw
    };
    if compressed > 7.0 {
        compressed = 7.0 + (compressed - 7.0) * 0.5;
    }

    let clamped = compressed.clamp(1.0, 10.0);
    if !clamped.is_finite() {
        return 1.0;
    }
    (clamped * 100.0).round() / 100.0
}

/// Clamp a gap score to the integer range [1, 10]; non-finite inputs
/// coerce to 1 rather than surfacing as an error.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_gap_score(score: f64) -> u8 {
    if !score.is_finite() {
        return 1;
    }
    score.round().clamp(1.0, 10.0) as u8
}
