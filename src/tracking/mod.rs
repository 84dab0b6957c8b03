//! Longitudinal tracking: history aggregation and new-anomaly registration.
//!
//! - `aggregator`: walks surveys chronologically, mapping each one back to
//!   the baseline and accumulating per-anomaly histories
//! - `registrar`: turns never-matched detections of the most recent survey
//!   into newly tracked anomalies

pub mod aggregator;
pub mod registrar;

pub use aggregator::{aggregate, AggregationOutcome};
pub use registrar::register_new_anomalies;

use crate::types::{AnomalyHistory, FeatureType};
use serde::{Deserialize, Serialize};

/// One physical anomaly under longitudinal tracking: its canonical seed
/// fields plus the accumulated multi-year history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedAnomaly {
    pub joint_no: Option<i64>,
    /// Log distance of the seeding detection (baseline row, or first-seen
    /// row for registrar entries).
    pub start_distance: f64,
    pub anomaly_type: FeatureType,
    pub history: AnomalyHistory,
}
