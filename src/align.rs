//! Banded DTW Aligner
//!
//! Constrained dynamic-time-warping correspondence between a baseline
//! feature matrix and a later survey's feature matrix. The accumulated-cost
//! matrix is restricted to a Sakoe-Chiba band of half-width `window` around
//! the diagonal, bounding the computation to O(n·window) time and space so
//! the aligner stays tractable on surveys with tens of thousands of
//! detections.
//!
//! The backtrace tie-break is fixed and load-bearing for reproducibility:
//! on equal predecessor cost, diagonal (match) wins over up (deletion),
//! which wins over left (insertion). Candidate moves that leave the band
//! carry infinite cost and can never win against a finite one.
//!
//! The raw warping path is then filtered: a pair survives only if the true
//! Euclidean distance between its two feature vectors is within the
//! acceptance threshold, and when DTW maps one baseline index to several
//! current indices, the first occurrence in ascending-baseline order wins.

use crate::config::AlignmentConfig;
use crate::signal::{euclidean, FeatureVector};
use std::collections::BTreeMap;

/// Partial correspondence `baseline_index → current_index`.
///
/// `BTreeMap` keeps iteration deterministic, which in turn keeps full-run
/// output byte-identical across reruns.
pub type AlignmentMapping = BTreeMap<usize, usize>;

/// Result of aligning one survey against the baseline.
#[derive(Debug, Clone)]
pub struct DtwAlignment {
    pub mapping: AlignmentMapping,
    /// Accumulated warping cost at the matrix corner. Infinite when the
    /// band leaves no finite path from (0,0) to (n,m).
    pub total_cost: f64,
}

impl DtwAlignment {
    /// Identity mapping `{i → i}` for n detections, zero cost. Used for the
    /// baseline survey aligned against itself.
    pub fn identity(n: usize) -> Self {
        Self {
            mapping: (0..n).map(|i| (i, i)).collect(),
            total_cost: 0.0,
        }
    }

    /// Number of mapping entries whose current-survey target is also used
    /// by another baseline index. A non-injective mapping is legal but
    /// worth surfacing in diagnostics.
    pub fn duplicate_target_count(&self) -> usize {
        let mut uses: BTreeMap<usize, usize> = BTreeMap::new();
        for target in self.mapping.values() {
            *uses.entry(*target).or_insert(0) += 1;
        }
        uses.values().filter(|&&c| c > 1).map(|c| c - 1).sum()
    }
}

/// Align `current` against `base`, returning the filtered partial mapping.
///
/// Degenerate inputs (either side empty, or a band that strands the matrix
/// corner) produce an empty mapping, never an error — downstream treats
/// that as "no anomalies matched this year".
pub fn align(
    base: &[FeatureVector],
    current: &[FeatureVector],
    config: &AlignmentConfig,
) -> DtwAlignment {
    let n = base.len();
    let m = current.len();
    if n == 0 || m == 0 {
        return DtwAlignment {
            mapping: AlignmentMapping::new(),
            total_cost: if n == 0 && m == 0 { 0.0 } else { f64::INFINITY },
        };
    }

    let cost = fill_cost_matrix(base, current, config.window);
    let total_cost = cost.get(n, m);
    if !total_cost.is_finite() {
        // |n − m| exceeds the band: no warping path reaches the corner.
        return DtwAlignment {
            mapping: AlignmentMapping::new(),
            total_cost,
        };
    }

    let path = backtrace(&cost, n, m);
    let mapping = filter_path(&path, base, current, config.distance_threshold);

    // `cost` drops here; the banded matrix must not outlive the mapping.
    DtwAlignment { mapping, total_cost }
}

/// Fill the banded accumulated-cost matrix.
///
/// `C[0][0] = 0`; every other cell starts at +∞ and row `i` is only
/// computed for `j ∈ [max(1, i−window), min(m, i+window)]`.
fn fill_cost_matrix(base: &[FeatureVector], current: &[FeatureVector], window: usize) -> BandedMatrix {
    let n = base.len();
    let m = current.len();
    let mut cost = BandedMatrix::new(n, m, window);

    for i in 1..=n {
        let lo = 1.max(i.saturating_sub(window));
        let hi = m.min(i + window);
        for j in lo..=hi {
            let dist = euclidean(&base[i - 1], &current[j - 1]);
            let best = cost
                .get(i - 1, j) // insertion
                .min(cost.get(i, j - 1)) // deletion
                .min(cost.get(i - 1, j - 1)); // match
            if best.is_finite() {
                cost.set(i, j, dist + best);
            }
        }
    }

    cost
}

/// Walk back from (n, m) to (0, 0), collecting visited (i−1, j−1) pairs in
/// chronological (baseline-ascending) order.
fn backtrace(cost: &BandedMatrix, n: usize, m: usize) -> Vec<(usize, usize)> {
    let mut path = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        path.push((i - 1, j - 1));
        let diagonal = cost.get(i - 1, j - 1);
        let up = cost.get(i - 1, j);
        let left = cost.get(i, j - 1);
        // Fixed tie-break: diagonal, then up, then left.
        if diagonal <= up && diagonal <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    path.reverse();
    path
}

/// Apply the true-distance threshold, then dedupe repeated baseline indices
/// keeping the first occurrence in ascending-baseline order.
fn filter_path(
    path: &[(usize, usize)],
    base: &[FeatureVector],
    current: &[FeatureVector],
    threshold: f64,
) -> AlignmentMapping {
    let mut mapping = AlignmentMapping::new();
    for &(bi, cj) in path {
        if euclidean(&base[bi], &current[cj]) > threshold {
            continue;
        }
        mapping.entry(bi).or_insert(cj);
    }
    mapping
}

// ============================================================================
// Banded cost-matrix storage
// ============================================================================

/// Sakoe-Chiba-banded (n+1)×(m+1) matrix: each row stores only its band of
/// columns, so memory is O(n·window) rather than O(n·m). Reads outside the
/// stored band return +∞.
struct BandedMatrix {
    rows: Vec<RowBand>,
}

struct RowBand {
    lo: usize,
    values: Vec<f64>,
}

impl BandedMatrix {
    fn new(n: usize, m: usize, window: usize) -> Self {
        let mut rows = Vec::with_capacity(n + 1);
        // Row 0 holds only the C[0][0] = 0 seed.
        rows.push(RowBand {
            lo: 0,
            values: vec![0.0],
        });
        for i in 1..=n {
            let lo = 1.max(i.saturating_sub(window));
            let hi = m.min(i + window);
            let width = if hi >= lo { hi - lo + 1 } else { 0 };
            rows.push(RowBand {
                lo,
                values: vec![f64::INFINITY; width],
            });
        }
        Self { rows }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        let row = &self.rows[i];
        if j < row.lo || j >= row.lo + row.values.len() {
            f64::INFINITY
        } else {
            row.values[j - row.lo]
        }
    }

    fn set(&mut self, i: usize, j: usize, value: f64) {
        let row = &mut self.rows[i];
        debug_assert!(j >= row.lo && j < row.lo + row.values.len());
        row.values[j - row.lo] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axial(values: &[f64]) -> Vec<FeatureVector> {
        values.iter().map(|&v| [v, 0.0, 0.0, 0.0]).collect()
    }

    fn config(window: usize, threshold: f64) -> AlignmentConfig {
        AlignmentConfig {
            window,
            distance_threshold: threshold,
        }
    }

    #[test]
    fn test_identical_signals_give_identity_mapping_zero_cost() {
        let signal = axial(&[1.0, 0.5, 2.0, 0.9, 1.4]);
        let result = align(&signal, &signal, &config(500, 2.0));
        assert_eq!(result.total_cost, 0.0);
        for i in 0..signal.len() {
            assert_eq!(result.mapping.get(&i), Some(&i));
        }
        assert_eq!(result.mapping.len(), signal.len());
    }

    #[test]
    fn test_empty_inputs_give_empty_mapping() {
        let signal = axial(&[1.0, 2.0]);
        assert!(align(&[], &signal, &config(500, 2.0)).mapping.is_empty());
        assert!(align(&signal, &[], &config(500, 2.0)).mapping.is_empty());
        assert!(align(&[], &[], &config(500, 2.0)).mapping.is_empty());
    }

    #[test]
    fn test_mapping_respects_band() {
        let base = axial(&[1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.7, 1.8, 1.9]);
        let curr = axial(&[1.05, 1.15, 1.25, 1.35, 1.45, 1.55, 1.65, 1.75, 1.85, 1.95]);
        let window = 2;
        let result = align(&base, &curr, &config(window, 10.0));
        for (&bi, &cj) in &result.mapping {
            assert!(
                bi.abs_diff(cj) <= window,
                "pair ({bi}, {cj}) outside band {window}"
            );
        }
    }

    #[test]
    fn test_threshold_filters_distant_pairs() {
        let base = axial(&[1.0, 5.0]);
        let curr = axial(&[1.0, 9.0]);
        let result = align(&base, &curr, &config(500, 2.0));
        // Index 0 matches exactly; index 1 sits 4.0 away, over τ = 2.0.
        assert_eq!(result.mapping.get(&0), Some(&0));
        assert!(!result.mapping.contains_key(&1));
    }

    #[test]
    fn test_all_pairs_within_threshold() {
        let base = axial(&[1.0, 0.5, 2.0, 0.9]);
        let curr = axial(&[1.1, 0.4, 2.2, 1.0]);
        let threshold = 2.0;
        let result = align(&base, &curr, &config(500, threshold));
        for (&bi, &cj) in &result.mapping {
            assert!(euclidean(&base[bi], &curr[cj]) <= threshold);
        }
    }

    #[test]
    fn test_first_occurrence_wins_when_baseline_index_repeats() {
        // One baseline point against two identical current points: the
        // warping path visits (0, 0) and (0, 1); the mapping keeps (0, 0).
        let base = axial(&[1.0]);
        let curr = axial(&[1.0, 1.0]);
        let result = align(&base, &curr, &config(500, 2.0));
        assert_eq!(result.mapping.get(&0), Some(&0));
        assert_eq!(result.mapping.len(), 1);
    }

    #[test]
    fn test_non_injective_mapping_allowed_and_counted() {
        // Two identical baseline points against one current point: both map
        // to current index 0.
        let base = axial(&[1.0, 1.0]);
        let curr = axial(&[1.0]);
        let result = align(&base, &curr, &config(500, 2.0));
        assert_eq!(result.mapping.get(&0), Some(&0));
        assert_eq!(result.mapping.get(&1), Some(&0));
        assert_eq!(result.duplicate_target_count(), 1);
    }

    #[test]
    fn test_insertion_shift_recovered() {
        // Current survey has one extra detection inserted at the front;
        // the originals should still match their counterparts.
        let base = axial(&[1.0, 0.5, 2.0]);
        let curr = axial(&[7.0, 1.0, 0.5, 2.0]);
        let result = align(&base, &curr, &config(500, 0.1));
        assert_eq!(result.mapping.get(&0), Some(&1));
        assert_eq!(result.mapping.get(&1), Some(&2));
        assert_eq!(result.mapping.get(&2), Some(&3));
    }

    #[test]
    fn test_unreachable_corner_yields_empty_mapping() {
        // Length mismatch far beyond the band: no finite path exists.
        let base = axial(&[1.0; 10]);
        let curr = axial(&[1.0, 1.0]);
        let result = align(&base, &curr, &config(2, 2.0));
        assert!(result.mapping.is_empty());
        assert!(result.total_cost.is_infinite());
    }

    #[test]
    fn test_identity_helper() {
        let identity = DtwAlignment::identity(3);
        assert_eq!(identity.mapping.len(), 3);
        assert_eq!(identity.mapping.get(&2), Some(&2));
        assert_eq!(identity.total_cost, 0.0);
        assert_eq!(identity.duplicate_target_count(), 0);
    }

    #[test]
    fn test_reruns_are_deterministic() {
        let base = axial(&[1.0, 1.0, 0.5, 0.5, 2.0]);
        let curr = axial(&[0.5, 1.0, 1.0, 0.5, 2.0]);
        let a = align(&base, &curr, &config(3, 2.0));
        let b = align(&base, &curr, &config(3, 2.0));
        assert_eq!(a.mapping, b.mapping);
        assert_eq!(a.total_cost.to_bits(), b.total_cost.to_bits());
    }
}
