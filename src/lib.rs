//! PIPETRACK: Longitudinal Pipeline Anomaly Tracking
//!
//! Aligns physical defect detections across independently collected
//! in-line-inspection surveys and produces one longitudinal record per
//! physical anomaly with derived health metrics.
//!
//! ## Architecture
//!
//! - **Signal Extractor**: weighted feature matrix per survey
//! - **Banded DTW Aligner**: constrained correspondence versus the baseline
//! - **History Aggregator / Registrar**: per-anomaly multi-year histories,
//!   plus registration of newly formed defects
//! - **Scoring Engine**: confidence, severity, growth rate, persistence
//! - **Master Table Builder**: final longitudinal row set

pub mod align;
pub mod config;
pub mod engine;
pub mod loader;
pub mod master;
pub mod scoring;
pub mod signal;
pub mod tracking;
pub mod types;

// Re-export engine configuration
pub use config::{AlignmentConfig, EngineConfig, FeatureWeights};

// Re-export commonly used types
pub use types::{
    AnomalyDetection, AnomalyHistory, FeatureType, LatestKnown, MasterRecord, Observation,
    ObservedFields, Survey,
};

// Re-export the engine surface
pub use engine::{AlignmentDiagnostics, EngineError, TrackingEngine, TrackingReport};

// Re-export alignment primitives for diagnostics tooling
pub use align::{align, AlignmentMapping, DtwAlignment};
pub use scoring::Scores;
