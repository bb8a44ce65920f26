//! Report Generator: weekly efficiency reports on a cadence, clinical reports
//! on demand.
//!
//! Nothing is persisted unless the model output decodes and every score is in
//! range. The cadence timestamp only advances after a stored weekly report, so
//! a failed attempt is retried at the next opportunity.

use crate::api_types::Message;
use crate::decode::extract_json_object;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{PromptAssembler, STRUCTURED_SYSTEM};
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};
use sentinel_core::config::RetentionConfig;
use sentinel_core::policy::report_due;
use sentinel_core::report::score_from;
use sentinel_core::{
    ClinicalKind, ClinicalMarkers, ClinicalReport, Clock, RiskLevel, SentinelError,
    TemporalSchedule, UserBaseline, WeeklyReport,
};
use sentinel_memory::Records;
use serde::Deserialize;
use std::sync::Arc;

const TARGET: &str = "sentinel::report";

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome<T> {
    Generated(T),
    /// The cadence window has not elapsed.
    NotDue,
    /// Preconditions missing (no baseline or schedule yet).
    Skipped(String),
    /// Gateway or decode failure; nothing was stored.
    Failed(SentinelError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyPayload {
    summary: String,
    pivot_recommendation: String,
    efficiency_score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkersPayload {
    mood_stability: f64,
    goal_alignment: f64,
    risk_assessment: RiskLevel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClinicalPayload {
    content: String,
    clinical_markers: MarkersPayload,
}

pub struct ReportGenerator {
    client: Arc<dyn LlmClient>,
    records: Records,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
    max_tokens: u32,
}

impl ReportGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        records: Records,
        clock: Arc<dyn Clock>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            client,
            records,
            clock,
            retention,
            max_tokens: 2048,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Generate the weekly report iff the cadence window has elapsed.
    pub async fn run_if_due(
        &self,
        baseline: Option<&UserBaseline>,
        schedule: Option<&TemporalSchedule>,
    ) -> Result<ReportOutcome<WeeklyReport>> {
        let last = self.records.last_report_time().await?;
        let now = self.clock.now_ms();
        if !report_due(last, now, self.retention.report_interval_ms) {
            tracing::debug!(target: TARGET, "Weekly report not due (last at {:?})", last);
            return Ok(ReportOutcome::NotDue);
        }
        self.generate_weekly(baseline, schedule).await
    }

    /// Generate and store a weekly report regardless of cadence.
    pub async fn generate_weekly(
        &self,
        baseline: Option<&UserBaseline>,
        schedule: Option<&TemporalSchedule>,
    ) -> Result<ReportOutcome<WeeklyReport>> {
        let (Some(baseline), Some(schedule)) = (baseline, schedule) else {
            tracing::debug!(target: TARGET, "Weekly report skipped: no baseline or schedule");
            return Ok(ReportOutcome::Skipped("no baseline or schedule yet".to_string()));
        };

        let now = self.clock.now_ms();
        let friction = schedule.recent_friction(now, self.retention.report_interval_ms);
        let prompt = PromptAssembler::weekly(baseline, &schedule.tasks, &friction);

        let text = match self.ask(prompt).await? {
            Ok(text) => text,
            Err(reason) => return Ok(ReportOutcome::Failed(reason)),
        };
        let report = match decode_weekly(&text, self.week_starting(), now) {
            Ok(r) => r,
            Err(reason) => {
                tracing::warn!(target: TARGET, "Discarding weekly report: {}", reason);
                return Ok(ReportOutcome::Failed(reason));
            }
        };

        self.records.save_weekly_report(&report).await?;
        self.records.set_last_report_time(now).await?;
        tracing::info!(
            target: TARGET,
            "Weekly report stored (efficiency {})",
            report.efficiency_score
        );
        Ok(ReportOutcome::Generated(report))
    }

    /// Generate a clinical report and append it to the history. Never touches
    /// the weekly cadence timestamp.
    pub async fn generate_clinical(
        &self,
        kind: ClinicalKind,
        baseline: Option<&UserBaseline>,
        schedule: Option<&TemporalSchedule>,
    ) -> Result<ReportOutcome<ClinicalReport>> {
        let Some(baseline) = baseline else {
            return Ok(ReportOutcome::Skipped("no baseline yet".to_string()));
        };

        let now = self.clock.now_ms();
        let friction = schedule
            .map(|s| s.recent_friction(now, self.retention.report_interval_ms))
            .unwrap_or_default();
        let history = self.records.clinical_history().await?;
        let keep = self.retention.clinical_context_reports;
        let prior = &history[history.len().saturating_sub(keep)..];
        let prompt = PromptAssembler::clinical(kind, baseline, &friction, prior);

        let text = match self.ask(prompt).await? {
            Ok(text) => text,
            Err(reason) => return Ok(ReportOutcome::Failed(reason)),
        };
        let report = match decode_clinical(&text, kind, self.clock.today(), now) {
            Ok(r) => r,
            Err(reason) => {
                tracing::warn!(target: TARGET, "Discarding {} report: {}", kind.label(), reason);
                return Ok(ReportOutcome::Failed(reason));
            }
        };

        self.records.append_clinical_report(&report).await?;
        tracing::info!(
            target: TARGET,
            "Clinical {} report stored (history now {})",
            kind.label(),
            history.len() + 1
        );
        Ok(ReportOutcome::Generated(report))
    }

    /// Outer `Err` only for a missing credential; other gateway failures are
    /// reported as the inner `Err`.
    async fn ask(&self, prompt: String) -> Result<std::result::Result<String, SentinelError>> {
        match self
            .client
            .complete(
                STRUCTURED_SYSTEM,
                vec![Message::user(prompt)],
                CompletionParams::structured(self.max_tokens),
            )
            .await
        {
            Ok(r) => Ok(Ok(r.content)),
            Err(e) => {
                let kind = SentinelError::classify(&e);
                if kind == SentinelError::MissingCredential {
                    return Err(e);
                }
                tracing::warn!(target: TARGET, "Report request failed: {}", kind);
                Ok(Err(kind))
            }
        }
    }

    /// Monday of the current week.
    fn week_starting(&self) -> NaiveDate {
        let today = self.clock.today();
        let offset = u64::from(today.weekday().num_days_from_monday());
        today.checked_sub_days(Days::new(offset)).unwrap_or(today)
    }
}

fn malformed(reason: impl ToString) -> SentinelError {
    SentinelError::MalformedOutput(reason.to_string())
}

fn decode_weekly(
    text: &str,
    week_starting: NaiveDate,
    now: i64,
) -> Result<WeeklyReport, SentinelError> {
    let payload: WeeklyPayload = extract_json_object(text).map_err(malformed)?;
    let efficiency_score = score_from(payload.efficiency_score).ok_or_else(|| {
        malformed(format!("efficiency score {} out of range", payload.efficiency_score))
    })?;
    Ok(WeeklyReport {
        id: sentinel_core::generate_id(),
        week_starting,
        summary: payload.summary,
        pivot_recommendation: payload.pivot_recommendation,
        efficiency_score,
        created_at: now,
    })
}

fn decode_clinical(
    text: &str,
    kind: ClinicalKind,
    today: NaiveDate,
    now: i64,
) -> Result<ClinicalReport, SentinelError> {
    let payload: ClinicalPayload = extract_json_object(text).map_err(malformed)?;
    let m = payload.clinical_markers;
    let mood_stability = score_from(m.mood_stability)
        .ok_or_else(|| malformed(format!("mood stability {} out of range", m.mood_stability)))?;
    let goal_alignment = score_from(m.goal_alignment)
        .ok_or_else(|| malformed(format!("goal alignment {} out of range", m.goal_alignment)))?;
    Ok(ClinicalReport {
        id: sentinel_core::generate_id(),
        kind,
        created_at: now,
        date_generated: today,
        content: payload.content,
        clinical_markers: ClinicalMarkers {
            mood_stability,
            goal_alignment,
            risk_assessment: m.risk_assessment,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
    }

    #[test]
    fn test_decode_weekly_in_prose() {
        let text = r#"Report follows: {"summary":"Solid week","pivotRecommendation":"Guard mornings","efficiencyScore":71.6} end"#;
        let r = decode_weekly(text, monday(), 42).unwrap();
        assert_eq!(r.efficiency_score, 72);
        assert_eq!(r.pivot_recommendation, "Guard mornings");
        assert_eq!(r.created_at, 42);
    }

    #[test]
    fn test_decode_weekly_rejects_out_of_range() {
        let text = r#"{"summary":"x","pivotRecommendation":"y","efficiencyScore":140}"#;
        match decode_weekly(text, monday(), 0) {
            Err(SentinelError::MalformedOutput(reason)) => assert!(reason.contains("140")),
            other => panic!("unexpected decode result: {:?}", other),
        }
        assert!(matches!(
            decode_weekly("no report today", monday(), 0),
            Err(SentinelError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_decode_clinical() {
        let text = r#"{"content":"Stable.","clinicalMarkers":{"moodStability":64,"goalAlignment":80,"riskAssessment":"low"}}"#;
        let r = decode_clinical(text, ClinicalKind::GpSummary, monday(), 7).unwrap();
        assert_eq!(r.clinical_markers.mood_stability, 64);
        assert_eq!(r.clinical_markers.risk_assessment, RiskLevel::Low);
        assert_eq!(r.kind, ClinicalKind::GpSummary);

        let bad_risk = r#"{"content":"?","clinicalMarkers":{"moodStability":64,"goalAlignment":80,"riskAssessment":"severe"}}"#;
        assert!(decode_clinical(bad_risk, ClinicalKind::Weekly, monday(), 7).is_err());
    }
}
