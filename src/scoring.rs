//! Scoring Engine
//!
//! Pure functions deriving scalar health metrics from one anomaly's
//! accumulated history. No shared mutable state — every history is scored
//! independently, which is what lets the engine fan scoring out across
//! anomalies.
//!
//! # Scores
//!
//! - **Confidence** = 0.4·alignment + 0.4·persistence + 0.2·magnitude.
//!   Alignment inverts the mean coefficient of variation of the four
//!   tracked physical series; persistence is the matched-year fraction;
//!   magnitude saturates at 80 % wall loss. Deliberately unclamped —
//!   degenerate inputs can push it outside [0, 1].
//! - **Severity**: logistic of the negated mean year-over-year decay of
//!   the remaining-strength ratio. Always in (0, 1); exactly 0.5 when the
//!   ratio is flat.
//! - **Growth rate**: volumetric proxy ΔV/Δyears between first and last
//!   matched observations, clipped at 0 (defects are assumed never to
//!   shrink — a modeling assumption, not a law).
//! - **Persistence (years)**: span between first and last matched year.

use crate::types::AnomalyHistory;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Depth fraction at which the magnitude term saturates.
pub const MAGNITUDE_DEPTH_THRESHOLD: f64 = 0.8;

/// Confidence term weights: alignment, persistence, magnitude.
pub const CONFIDENCE_WEIGHTS: (f64, f64, f64) = (0.4, 0.4, 0.2);

/// Derived health metrics for one tracked anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub confidence: f64,
    pub severity: f64,
    pub growth_rate: f64,
    pub persistence_years: i32,
}

/// Score one anomaly's full history.
pub fn score(history: &AnomalyHistory) -> Scores {
    let (w_align, w_persist, w_magnitude) = CONFIDENCE_WEIGHTS;
    let confidence = w_align * alignment_term(history)
        + w_persist * persistence_term(history)
        + w_magnitude * magnitude_term(history);

    Scores {
        confidence,
        severity: severity_score(history),
        growth_rate: growth_rate(history),
        persistence_years: persistence_years(history),
    }
}

/// Consistency of the four tracked physical series across matched years:
/// `1 − mean(CV)` where CV = population std-dev / mean.
///
/// Only strictly positive matched values enter each series (absent and
/// non-physical values carry no consistency information); an empty series
/// or a zero mean contributes CV 0.
pub fn alignment_term(history: &AnomalyHistory) -> f64 {
    let series: [Vec<f64>; 4] = [
        collect_positive(history, |f| Some(f.j_len)),
        collect_positive(history, |f| Some(f.log_dist)),
        collect_positive(history, |f| f.elevation),
        collect_positive(history, |f| f.rotation),
    ];

    let cv_sum: f64 = series.iter().map(|s| coefficient_of_variation(s)).sum();
    1.0 - cv_sum / 4.0
}

/// Fraction of processed years where the anomaly was matched.
pub fn persistence_term(history: &AnomalyHistory) -> f64 {
    if history.observations.is_empty() {
        return 0.0;
    }
    history.matched_count() as f64 / history.observations.len() as f64
}

/// Latest-known depth scaled against the saturation threshold.
pub fn magnitude_term(history: &AnomalyHistory) -> f64 {
    let depth = history.latest_known().map_or(0.0, |l| l.depth);
    if depth <= 0.0 {
        return 0.0;
    }
    (depth / MAGNITUDE_DEPTH_THRESHOLD).min(1.0)
}

/// Logistic-mapped mean decay rate of the remaining-strength ratio.
///
/// For each consecutive matched pair, the decay contribution is
/// `Δrpr / Δyear`; the contributions are averaged and negated so that a
/// shrinking ratio (worsening defect) pushes severity above 0.5. Fewer
/// than two matched observations give the neutral 0.5.
pub fn severity_score(history: &AnomalyHistory) -> f64 {
    let observed: Vec<(i32, f64)> = history
        .matched_observations()
        .map(|(year, f)| (year, f.remaining_strength_ratio))
        .collect();

    let decay_rate_sum = if observed.len() < 2 {
        0.0
    } else {
        let total: f64 = observed
            .windows(2)
            .map(|pair| {
                let (y0, r0) = pair[0];
                let (y1, r1) = pair[1];
                (r1 - r0) / f64::from(y1 - y0)
            })
            .sum();
        -total / (observed.len() - 1) as f64
    };

    1.0 / (1.0 + (-decay_rate_sum).exp())
}

/// Volumetric growth proxy `ΔV / Δyears` with V = depth × length × width,
/// using the first and last matched observations. Requires two matched
/// years with reported extents; negative results are clipped to 0.
pub fn growth_rate(history: &AnomalyHistory) -> f64 {
    let observed: Vec<(i32, Option<f64>)> = history
        .matched_observations()
        .map(|(year, f)| (year, f.volume()))
        .collect();
    if observed.len() < 2 {
        return 0.0;
    }

    let (first_year, first_volume) = observed[0];
    let (last_year, last_volume) = observed[observed.len() - 1];
    let delta_years = f64::from(last_year - first_year);
    match (first_volume, last_volume) {
        (Some(v0), Some(vf)) if delta_years > 0.0 => ((vf - v0) / delta_years).max(0.0),
        _ => 0.0,
    }
}

/// Span in years between the first and last matched observation; 0 for
/// fewer than two matched years.
pub fn persistence_years(history: &AnomalyHistory) -> i32 {
    let years: Vec<i32> = history.matched_observations().map(|(y, _)| y).collect();
    match (years.first(), years.last()) {
        (Some(&first), Some(&last)) if years.len() >= 2 => last - first,
        _ => 0,
    }
}

fn collect_positive(
    history: &AnomalyHistory,
    field: impl Fn(&crate::types::ObservedFields) -> Option<f64>,
) -> Vec<f64> {
    history
        .matched_observations()
        .filter_map(|(_, f)| field(f))
        .filter(|v| *v > 0.0)
        .collect()
}

fn coefficient_of_variation(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mean = series.iter().mean();
    if mean == 0.0 {
        return 0.0;
    }
    series.iter().population_std_dev() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnomalyHistory, Observation, ObservedFields};

    fn fields(rpr: f64, depth: f64) -> ObservedFields {
        ObservedFields {
            j_len: 40.0,
            log_dist: 100.0,
            elevation: Some(800.0),
            rotation: Some(90.0),
            depth,
            length: Some(2.0),
            width: Some(1.0),
            remaining_strength_ratio: rpr,
        }
    }

    fn history(observations: Vec<Observation>) -> AnomalyHistory {
        AnomalyHistory {
            anomaly_no: 1,
            observations,
        }
    }

    #[test]
    fn test_severity_neutral_for_flat_ratio() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::matched(2015, fields(0.9, 0.1)),
        ]);
        assert!((severity_score(&h) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_severity_neutral_for_single_match() {
        let h = history(vec![Observation::matched(2007, fields(0.9, 0.1))]);
        assert!((severity_score(&h) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_severity_open_interval_and_direction() {
        let worsening = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::matched(2015, fields(0.5, 0.5)),
        ]);
        let improving = history(vec![
            Observation::matched(2007, fields(0.5, 0.5)),
            Observation::matched(2015, fields(0.9, 0.1)),
        ]);
        let bad = severity_score(&worsening);
        let good = severity_score(&improving);
        assert!(bad > 0.5 && bad < 1.0, "worsening severity: {bad}");
        assert!(good < 0.5 && good > 0.0, "improving severity: {good}");
    }

    #[test]
    fn test_severity_skips_gap_years() {
        // 2007 and 2022 matched, 2015 a gap: decay uses only the two
        // matched observations over the 15-year span.
        let h = history(vec![
            Observation::matched(2007, fields(1.0, 0.0)),
            Observation::gap(2015),
            Observation::matched(2022, fields(0.7, 0.3)),
        ]);
        let expected_decay: f64 = -(0.7 - 1.0) / 15.0;
        let expected = 1.0 / (1.0 + (-expected_decay).exp());
        assert!((severity_score(&h) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_growth_rate_non_negative() {
        let shrinking = history(vec![
            Observation::matched(2007, fields(0.5, 0.5)),
            Observation::matched(2015, fields(0.9, 0.1)),
        ]);
        assert_eq!(growth_rate(&shrinking), 0.0);
    }

    #[test]
    fn test_growth_rate_volumetric_delta() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::matched(2015, fields(0.5, 0.5)),
        ]);
        // V = depth × 2.0 × 1.0 → ΔV = (0.5 − 0.1) × 2 = 0.8 over 8 years
        assert!((growth_rate(&h) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_growth_rate_requires_two_matched_years() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::gap(2015),
        ]);
        assert_eq!(growth_rate(&h), 0.0);
    }

    #[test]
    fn test_growth_rate_zero_without_extents() {
        let mut missing = fields(0.9, 0.1);
        missing.width = None;
        let h = history(vec![
            Observation::matched(2007, missing),
            Observation::matched(2015, fields(0.5, 0.5)),
        ]);
        assert_eq!(growth_rate(&h), 0.0);
    }

    #[test]
    fn test_persistence_years_span() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::gap(2015),
            Observation::matched(2022, fields(0.8, 0.2)),
        ]);
        assert_eq!(persistence_years(&h), 15);
    }

    #[test]
    fn test_persistence_years_zero_for_single_match() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::gap(2015),
        ]);
        assert_eq!(persistence_years(&h), 0);
    }

    #[test]
    fn test_persistence_term_fraction() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::gap(2015),
            Observation::matched(2022, fields(0.8, 0.2)),
        ]);
        assert!((persistence_term(&h) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_alignment_term_perfect_consistency() {
        // Identical values every year → every CV is 0 → term is 1.
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.1)),
            Observation::matched(2015, fields(0.9, 0.1)),
        ]);
        assert!((alignment_term(&h) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_alignment_term_empty_series_contributes_zero() {
        let mut sparse = fields(0.9, 0.1);
        sparse.elevation = None;
        sparse.rotation = None;
        let h = history(vec![Observation::matched(2007, sparse)]);
        // Remaining two singleton series have CV 0 as well.
        assert!((alignment_term(&h) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_magnitude_term_saturates() {
        let h = history(vec![Observation::matched(2007, fields(0.1, 0.9))]);
        assert!((magnitude_term(&h) - 1.0).abs() < 1e-12);

        let shallow = history(vec![Observation::matched(2007, fields(0.9, 0.4))]);
        assert!((magnitude_term(&shallow) - 0.5).abs() < 1e-12);

        let zero = history(vec![Observation::matched(2007, fields(1.0, 0.0))]);
        assert_eq!(magnitude_term(&zero), 0.0);
    }

    #[test]
    fn test_confidence_composition() {
        let h = history(vec![
            Observation::matched(2007, fields(0.9, 0.4)),
            Observation::matched(2015, fields(0.9, 0.4)),
        ]);
        // alignment 1.0, persistence 1.0, magnitude 0.5
        let s = score(&h);
        assert!((s.confidence - (0.4 + 0.4 + 0.2 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_never_matched_history_scores_neutrally() {
        let h = history(vec![Observation::gap(2007), Observation::gap(2015)]);
        let s = score(&h);
        assert!((s.severity - 0.5).abs() < 1e-12);
        assert_eq!(s.growth_rate, 0.0);
        assert_eq!(s.persistence_years, 0);
        // alignment term degenerates to 1.0 (all-empty series), persistence
        // and magnitude to 0.
        assert!((s.confidence - 0.4).abs() < 1e-12);
    }
}
