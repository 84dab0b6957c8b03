//! New-Anomaly Registrar
//!
//! After all surveys are aggregated, detections of the most recent survey
//! that were never the target of any baseline match become newly tracked
//! anomalies — defects that did not exist at baseline time. Each gets the
//! next sequential anomaly number and a single-year history; earlier years
//! are implicitly absent rather than recorded as gaps.

use crate::types::{AnomalyHistory, Observation, ObservedFields, Survey};
use std::collections::BTreeSet;
use tracing::info;

use super::TrackedAnomaly;

/// Register every unconsumed detection of the most recent survey.
///
/// `consumed` is the most recent year's consumed-index set from the
/// aggregator; `next_anomaly_no` is one past the highest number already
/// assigned.
pub fn register_new_anomalies(
    latest: &Survey,
    consumed: &BTreeSet<usize>,
    next_anomaly_no: u32,
) -> Vec<TrackedAnomaly> {
    let mut registered = Vec::new();
    let mut next_no = next_anomaly_no;

    for (idx, detection) in latest.detections.iter().enumerate() {
        if consumed.contains(&idx) {
            continue;
        }
        let mut history = AnomalyHistory::new(next_no);
        history.observations.push(Observation::matched(
            latest.year,
            ObservedFields::from_detection(detection),
        ));
        registered.push(TrackedAnomaly {
            joint_no: detection.joint_number,
            start_distance: detection.distance,
            anomaly_type: detection.feature_type.clone(),
            history,
        });
        next_no += 1;
    }

    if !registered.is_empty() {
        info!(
            year = latest.year,
            count = registered.len(),
            "registered new anomalies not present at baseline"
        );
    }
    registered
}
