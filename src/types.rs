//! Core data model: survey detections, per-anomaly histories, master records.
//!
//! All records are strongly typed with explicit `Option` fields for values
//! that upstream surveys may omit. Default resolution for absent fields is
//! centralised in the [`defaults`] module — nothing else in the crate is
//! allowed to invent a fallback value inline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default-resolution rules for optional detection fields.
///
/// These are the only fallbacks the engine applies. They affect alignment
/// results, so changing any of them is a versioned behavioural change.
pub mod defaults {
    use super::AnomalyDetection;

    /// Joint length assumed when a survey does not report one (ft).
    ///
    /// 40 ft is the standard line-pipe joint length; it doubles as the
    /// normaliser so a typical joint contributes ~1.0 to the feature vector.
    pub const DEFAULT_J_LEN: f64 = 40.0;

    /// Upper clamp for relative position within a joint (ft).
    pub const MAX_RELATIVE_POSITION: f64 = 45.0;

    /// Normaliser for the relative-position feature term.
    pub const RELATIVE_POSITION_SCALE: f64 = 40.0;

    /// Resolved joint length: reported value, else [`DEFAULT_J_LEN`].
    pub fn j_len(d: &AnomalyDetection) -> f64 {
        d.j_len.unwrap_or(DEFAULT_J_LEN)
    }

    /// Resolved relative position: reported value clamped to
    /// `[0, MAX_RELATIVE_POSITION]`, else 0.
    pub fn relative_position(d: &AnomalyDetection) -> f64 {
        d.relative_position
            .unwrap_or(0.0)
            .clamp(0.0, MAX_RELATIVE_POSITION)
    }

    /// Resolved circumferential angle in degrees: reported value, else 0.
    pub fn angle(d: &AnomalyDetection) -> f64 {
        d.angle.unwrap_or(0.0)
    }

    /// Resolved depth fraction (0–1): reported value, else 0.
    pub fn depth(d: &AnomalyDetection) -> f64 {
        d.depth_percent.unwrap_or(0.0)
    }

    /// Remaining-strength ratio: direct field when the survey reports one,
    /// else `1 − depth`.
    pub fn remaining_strength(d: &AnomalyDetection) -> f64 {
        d.remaining_strength_ratio
            .unwrap_or_else(|| 1.0 - depth(d))
    }
}

// ============================================================================
// Survey input
// ============================================================================

/// Classified anomaly feature type from the upstream formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeatureType {
    MetalLoss,
    Dent,
    Cluster,
    /// Any type the upstream formatter passes through unclassified.
    Other(String),
}

impl From<String> for FeatureType {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "metal-loss" | "metal loss" | "ml" | "metal loss-manufacturing anomaly" => {
                Self::MetalLoss
            }
            "dent" => Self::Dent,
            "cluster" | "c" => Self::Cluster,
            _ => Self::Other(s),
        }
    }
}

impl From<FeatureType> for String {
    fn from(t: FeatureType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MetalLoss => write!(f, "metal-loss"),
            Self::Dent => write!(f, "dent"),
            Self::Cluster => write!(f, "cluster"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One detection row of one survey, in the canonical per-survey schema
/// produced by the external formatting collaborator. Immutable once handed
/// to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetection {
    /// Upstream string identifier (e.g. "ML-104"). Informational only —
    /// canonical identity is positional, not string-based.
    #[serde(default)]
    pub feature_id: Option<String>,
    /// Log distance from launcher (ft).
    pub distance: f64,
    #[serde(default)]
    pub joint_number: Option<i64>,
    /// Distance from the upstream girth weld (ft).
    #[serde(default)]
    pub relative_position: Option<f64>,
    /// Circumferential position in degrees, 0–360.
    #[serde(default)]
    pub angle: Option<f64>,
    pub feature_type: FeatureType,
    /// Depth as a fraction of wall thickness, 0–1.
    #[serde(default)]
    pub depth_percent: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub wall_thickness: Option<f64>,
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Joint length (ft) — the primary alignment fingerprint.
    #[serde(default)]
    pub j_len: Option<f64>,
    /// Direct remaining-strength ratio when the vendor reports one.
    #[serde(default)]
    pub remaining_strength_ratio: Option<f64>,
}

/// One full inspection pass of the pipeline at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub year: i32,
    pub detections: Vec<AnomalyDetection>,
}

impl Survey {
    pub fn new(year: i32, detections: Vec<AnomalyDetection>) -> Self {
        Self { year, detections }
    }
}

// ============================================================================
// Per-anomaly history
// ============================================================================

/// Physical values observed for an anomaly in one matched survey year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedFields {
    pub j_len: f64,
    pub log_dist: f64,
    pub elevation: Option<f64>,
    /// Circumferential angle (degrees) — "rotation" in the master table.
    pub rotation: Option<f64>,
    pub depth: f64,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub remaining_strength_ratio: f64,
}

impl ObservedFields {
    /// Resolve observed fields from a detection via the central defaults.
    pub fn from_detection(d: &AnomalyDetection) -> Self {
        Self {
            j_len: defaults::j_len(d),
            log_dist: d.distance,
            elevation: d.elevation,
            rotation: d.angle,
            depth: defaults::depth(d),
            length: d.length,
            width: d.width,
            remaining_strength_ratio: defaults::remaining_strength(d),
        }
    }

    /// Volumetric defect proxy `depth × length × width`, when both lateral
    /// extents were reported.
    pub fn volume(&self) -> Option<f64> {
        match (self.length, self.width) {
            (Some(l), Some(w)) => Some(self.depth * l * w),
            _ => None,
        }
    }
}

/// One survey year in an anomaly's history: either a match carrying the
/// observed physical fields, or a gap carrying none.
///
/// The `matched == false → fields == None` invariant is enforced by
/// construction — [`Observation::gap`] takes no fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    pub matched: bool,
    pub fields: Option<ObservedFields>,
}

impl Observation {
    pub fn matched(year: i32, fields: ObservedFields) -> Self {
        Self {
            year,
            matched: true,
            fields: Some(fields),
        }
    }

    pub fn gap(year: i32) -> Self {
        Self {
            year,
            matched: false,
            fields: None,
        }
    }
}

/// Chronological multi-year record for one tracked anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyHistory {
    /// Stable canonical identity (assigned at baseline, extended by the
    /// registrar, re-sequenced 1..N in the final table).
    pub anomaly_no: u32,
    /// Observations in strictly increasing year order, one per processed
    /// survey since this anomaly entered tracking.
    pub observations: Vec<Observation>,
}

impl AnomalyHistory {
    pub fn new(anomaly_no: u32) -> Self {
        Self {
            anomaly_no,
            observations: Vec::new(),
        }
    }

    /// Matched observations with their fields, in chronological order.
    pub fn matched_observations(&self) -> impl Iterator<Item = (i32, &ObservedFields)> {
        self.observations
            .iter()
            .filter(|o| o.matched)
            .filter_map(|o| o.fields.as_ref().map(|f| (o.year, f)))
    }

    /// Number of matched years.
    pub fn matched_count(&self) -> usize {
        self.observations.iter().filter(|o| o.matched).count()
    }

    /// Derived "most recent available" projection: each field takes the
    /// value from the last matched year that carried it. Returns `None`
    /// for an anomaly never matched in any year.
    pub fn latest_known(&self) -> Option<LatestKnown> {
        let mut latest: Option<LatestKnown> = None;
        for (_, fields) in self.matched_observations() {
            let slot = latest.get_or_insert_with(LatestKnown::default);
            slot.j_len = fields.j_len;
            slot.log_dist = fields.log_dist;
            slot.depth = fields.depth;
            slot.remaining_strength_ratio = fields.remaining_strength_ratio;
            if fields.elevation.is_some() {
                slot.elevation = fields.elevation;
            }
            if fields.rotation.is_some() {
                slot.rotation = fields.rotation;
            }
            if fields.length.is_some() {
                slot.length = fields.length;
            }
            if fields.width.is_some() {
                slot.width = fields.width;
            }
        }
        latest
    }
}

/// Latest-known physical values for an anomaly, derived from its history
/// rather than mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestKnown {
    pub j_len: f64,
    pub log_dist: f64,
    pub elevation: Option<f64>,
    pub rotation: Option<f64>,
    pub depth: f64,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub remaining_strength_ratio: f64,
}

// ============================================================================
// Output table
// ============================================================================

/// Final longitudinal row for one tracked anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Sequential identity, re-assigned 1..N when the table is built.
    pub anomaly_no: u32,
    pub joint_no: Option<i64>,
    /// Baseline log distance (or first-seen distance for registrar rows).
    pub start_distance: f64,
    pub anomaly_type: FeatureType,
    pub confidence: f64,
    pub severity: f64,
    /// Span in years between first and last matched observation.
    pub persistence_years: i32,
    pub growth_rate: f64,
    /// Operator review flag — passthrough for the downstream UI, always
    /// seeded false.
    pub viewed: bool,
    pub j_len: f64,
    pub log_dist: f64,
    pub elevation: Option<f64>,
    pub rotation: Option<f64>,
    pub ml_depth: Option<f64>,
    pub width: Option<f64>,
    pub remaining_strength_ratio: Option<f64>,
}
