//! Master Table Builder
//!
//! Assembles the final longitudinal rows from baseline seed fields, the
//! latest-known projection of each history, and the derived scores. The
//! `anomaly_no` column is re-sequenced 1..N here, independent of any
//! string identifiers used upstream.

use crate::scoring::Scores;
use crate::tracking::TrackedAnomaly;
use crate::types::{defaults, MasterRecord};

/// Build one row per tracked anomaly, in tracking order.
///
/// `scores[k]` must correspond to `anomalies[k]`.
pub fn build_master_table(anomalies: &[TrackedAnomaly], scores: &[Scores]) -> Vec<MasterRecord> {
    anomalies
        .iter()
        .zip(scores.iter())
        .enumerate()
        .map(|(idx, (anomaly, s))| {
            let latest = anomaly.history.latest_known();
            MasterRecord {
                anomaly_no: idx as u32 + 1,
                joint_no: anomaly.joint_no,
                start_distance: anomaly.start_distance,
                anomaly_type: anomaly.anomaly_type.clone(),
                confidence: s.confidence,
                severity: s.severity,
                persistence_years: s.persistence_years,
                growth_rate: s.growth_rate,
                viewed: false,
                j_len: latest.as_ref().map_or(defaults::DEFAULT_J_LEN, |l| l.j_len),
                log_dist: latest
                    .as_ref()
                    .map_or(anomaly.start_distance, |l| l.log_dist),
                elevation: latest.as_ref().and_then(|l| l.elevation),
                rotation: latest.as_ref().and_then(|l| l.rotation),
                ml_depth: latest.as_ref().map(|l| l.depth),
                width: latest.as_ref().and_then(|l| l.width),
                remaining_strength_ratio: latest.as_ref().map(|l| l.remaining_strength_ratio),
            }
        })
        .collect()
}
