//! Signal Extractor
//!
//! Turns one survey's detections into the weighted numeric feature matrix
//! the aligner consumes — one 4-dimensional vector per detection, in
//! detection order.
//!
//! Term order and weights (see [`FeatureWeights`] defaults):
//! 1. joint length / 40, weight 2.0 — the most physically stable
//!    fingerprint across surveys
//! 2. relative position (clamped 0–45) / 40, weight 1.0 — disambiguates
//!    within a joint
//! 3. sin(angle), weight 0.5
//! 4. cos(angle), weight 0.5 — the cyclic pair disambiguates
//!    circumferentially distinct defects at the same axial position

use crate::config::FeatureWeights;
use crate::types::{defaults, AnomalyDetection};

/// One detection's position in the weighted feature space.
pub type FeatureVector = [f64; 4];

/// Build the feature matrix for one survey, in detection order.
pub fn extract_signal(
    detections: &[AnomalyDetection],
    weights: &FeatureWeights,
) -> Vec<FeatureVector> {
    detections
        .iter()
        .map(|d| feature_vector(d, weights))
        .collect()
}

/// Encode a single detection.
pub fn feature_vector(d: &AnomalyDetection, weights: &FeatureWeights) -> FeatureVector {
    let angle_rad = defaults::angle(d).to_radians();
    [
        weights.j_len * (defaults::j_len(d) / defaults::DEFAULT_J_LEN),
        weights.relative_position
            * (defaults::relative_position(d) / defaults::RELATIVE_POSITION_SCALE),
        weights.angle_sin * angle_rad.sin(),
        weights.angle_cos * angle_rad.cos(),
    ]
}

/// Euclidean distance between two feature vectors.
pub fn euclidean(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
