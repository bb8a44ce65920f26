//! Generated report artifacts. Immutable once created.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The single "latest" weekly efficiency report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub id: String,
    pub week_starting: NaiveDate,
    pub summary: String,
    pub pivot_recommendation: String,
    /// 0-100
    pub efficiency_score: u8,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalKind {
    Weekly,
    Monthly,
    GpSummary,
}

impl ClinicalKind {
    pub fn label(&self) -> &'static str {
        match self {
            ClinicalKind::Weekly => "weekly",
            ClinicalKind::Monthly => "monthly",
            ClinicalKind::GpSummary => "GP summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalMarkers {
    /// 0-100
    pub mood_stability: u8,
    /// 0-100
    pub goal_alignment: u8,
    pub risk_assessment: RiskLevel,
}

/// Append-only clinical history entry. Exempt from friction decay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalReport {
    pub id: String,
    pub kind: ClinicalKind,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub date_generated: NaiveDate,
    pub content: String,
    pub clinical_markers: ClinicalMarkers,
}

/// Convert a model-supplied score into the `0..=100` range, rejecting
/// anything outside it rather than clamping.
pub fn score_from(value: f64) -> Option<u8> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Some(value.round() as u8)
    } else {
        None
    }
}
