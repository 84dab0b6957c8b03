//! History Aggregator
//!
//! Walks surveys in chronological order and accumulates one multi-year
//! history per baseline anomaly. The baseline survey is mapped to itself
//! with an identity mapping; every later survey contributes either a
//! matched observation (physical fields resolved through the central
//! defaults) or an explicit gap. Unmatched years never fabricate values —
//! scoring treats them as gaps, not zeros.
//!
//! As a side effect the aggregator records, per survey year, the set of
//! current-survey indices consumed by some baseline match; the registrar
//! uses the most recent year's set to find newly formed anomalies.

use crate::align::DtwAlignment;
use crate::types::{AnomalyHistory, Observation, ObservedFields, Survey};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::TrackedAnomaly;

/// Everything the aggregation pass produces.
#[derive(Debug)]
pub struct AggregationOutcome {
    /// One tracked anomaly per baseline detection, `anomaly_no` 1..N in
    /// baseline row order.
    pub anomalies: Vec<TrackedAnomaly>,
    /// Per survey year, the current-survey indices matched by some
    /// baseline anomaly.
    pub consumed: BTreeMap<i32, BTreeSet<usize>>,
}

/// Accumulate per-anomaly histories across all surveys.
///
/// `alignments[k]` must be the mapping for `surveys[k]` versus the
/// baseline; index 0 is the baseline's identity mapping. Surveys are
/// assumed already validated as chronologically increasing.
pub fn aggregate(surveys: &[Survey], alignments: &[DtwAlignment]) -> AggregationOutcome {
    let baseline = &surveys[0];
    let mut anomalies: Vec<TrackedAnomaly> = baseline
        .detections
        .iter()
        .enumerate()
        .map(|(i, d)| TrackedAnomaly {
            joint_no: d.joint_number,
            start_distance: d.distance,
            anomaly_type: d.feature_type.clone(),
            history: AnomalyHistory::new(i as u32 + 1),
        })
        .collect();

    let mut consumed: BTreeMap<i32, BTreeSet<usize>> = BTreeMap::new();

    for (survey, alignment) in surveys.iter().zip(alignments.iter()) {
        let year_consumed = consumed.entry(survey.year).or_default();

        for (i, anomaly) in anomalies.iter_mut().enumerate() {
            match alignment.mapping.get(&i) {
                Some(&cj) => {
                    let fields = ObservedFields::from_detection(&survey.detections[cj]);
                    anomaly
                        .history
                        .observations
                        .push(Observation::matched(survey.year, fields));
                    year_consumed.insert(cj);
                }
                None => {
                    anomaly
                        .history
                        .observations
                        .push(Observation::gap(survey.year));
                }
            }
        }

        let duplicates = alignment.duplicate_target_count();
        if duplicates > 0 {
            warn!(
                year = survey.year,
                duplicates,
                "non-injective alignment: multiple baseline anomalies share a current detection"
            );
        }
        debug!(
            year = survey.year,
            matched = alignment.mapping.len(),
            detections = survey.detections.len(),
            "aggregated survey"
        );
    }

    AggregationOutcome { anomalies, consumed }
}
