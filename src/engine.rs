//! Tracking Engine Orchestrator
//!
//! The explicit entry point for a full alignment-and-tracking run:
//! signal extraction → per-year banded DTW versus the baseline → history
//! aggregation → new-anomaly registration → scoring → master table.
//!
//! The engine is a single synchronous batch computation and is stateless
//! across runs. The two hot paths are fanned out with rayon: per-year
//! alignments only read the baseline signal plus one survey's signal, and
//! per-anomaly scoring reads one history each.

use crate::align::{align, DtwAlignment};
use crate::config::EngineConfig;
use crate::master::build_master_table;
use crate::scoring::{score, Scores};
use crate::signal::extract_signal;
use crate::tracking::{aggregate, register_new_anomalies};
use crate::types::{AnomalyHistory, MasterRecord, Survey};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Fatal input/configuration errors, surfaced to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no surveys supplied — at least a baseline survey is required")]
    EmptySurveySequence,
    #[error("surveys out of chronological order: year {next} follows year {previous}")]
    UnsortedSurveys { previous: i32, next: i32 },
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Per-year alignment statistics for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearAlignmentStats {
    pub year: i32,
    /// Detections in that survey.
    pub detections: usize,
    /// Baseline anomalies matched into that survey.
    pub matched: usize,
    /// Extra baseline anomalies sharing an already-used current detection
    /// (non-injective mapping — legal, but flagged).
    pub duplicate_targets: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentDiagnostics {
    pub years: Vec<YearAlignmentStats>,
    pub new_anomalies: usize,
}

/// Full engine output: the master table plus per-anomaly histories and
/// alignment diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingReport {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<MasterRecord>,
    pub histories: Vec<AnomalyHistory>,
    pub diagnostics: AlignmentDiagnostics,
}

/// The alignment-and-longitudinal-tracking engine.
pub struct TrackingEngine {
    config: EngineConfig,
}

impl TrackingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline over a chronologically ordered survey
    /// sequence (baseline first) and produce the master table.
    pub fn run(&self, surveys: &[Survey]) -> Result<TrackingReport, EngineError> {
        self.config.validate()?;
        validate_sequence(surveys)?;

        let baseline = &surveys[0];
        info!(
            surveys = surveys.len(),
            baseline_year = baseline.year,
            baseline_detections = baseline.detections.len(),
            "starting tracking run"
        );

        // Feature matrices, one per survey, in detection order.
        let signals: Vec<_> = surveys
            .par_iter()
            .map(|s| extract_signal(&s.detections, &self.config.features))
            .collect();

        // Baseline maps to itself; every later year aligns independently
        // against the baseline signal.
        let baseline_signal = &signals[0];
        let mut alignments = Vec::with_capacity(surveys.len());
        alignments.push(DtwAlignment::identity(baseline.detections.len()));
        alignments.extend(
            signals[1..]
                .par_iter()
                .map(|signal| align(baseline_signal, signal, &self.config.alignment))
                .collect::<Vec<_>>(),
        );

        let outcome = aggregate(surveys, &alignments);
        let mut anomalies = outcome.anomalies;

        // Detections of the most recent survey never consumed by a
        // baseline match become newly tracked anomalies.
        let latest = surveys.last().unwrap_or(baseline);
        let empty = std::collections::BTreeSet::new();
        let consumed_latest = outcome.consumed.get(&latest.year).unwrap_or(&empty);
        let registered =
            register_new_anomalies(latest, consumed_latest, anomalies.len() as u32 + 1);
        let new_count = registered.len();
        anomalies.extend(registered);

        let scores: Vec<Scores> = anomalies.par_iter().map(|a| score(&a.history)).collect();
        let records = build_master_table(&anomalies, &scores);

        let diagnostics = AlignmentDiagnostics {
            years: surveys
                .iter()
                .zip(alignments.iter())
                .map(|(s, a)| YearAlignmentStats {
                    year: s.year,
                    detections: s.detections.len(),
                    matched: a.mapping.len(),
                    duplicate_targets: a.duplicate_target_count(),
                })
                .collect(),
            new_anomalies: new_count,
        };

        info!(
            tracked = records.len(),
            new = new_count,
            "tracking run complete"
        );

        Ok(TrackingReport {
            generated_at: Utc::now(),
            records,
            histories: anomalies.into_iter().map(|a| a.history).collect(),
            diagnostics,
        })
    }
}

/// Reject an empty sequence or out-of-order years.
///
/// Ordering is load-bearing: latest-known overwrite semantics and the
/// decay-rate sign both depend on strictly increasing years.
fn validate_sequence(surveys: &[Survey]) -> Result<(), EngineError> {
    if surveys.is_empty() {
        return Err(EngineError::EmptySurveySequence);
    }
    for pair in surveys.windows(2) {
        if pair[1].year <= pair[0].year {
            return Err(EngineError::UnsortedSurveys {
                previous: pair[0].year,
                next: pair[1].year,
            });
        }
    }
    Ok(())
}
