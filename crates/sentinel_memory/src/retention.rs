//! Session-start decay pass over friction logs.
//!
//! The only automatic deletion in the system. Reports are never touched.

use crate::records::Records;
use anyhow::Result;
use sentinel_core::TemporalSchedule;

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionReport {
    /// The schedule after pruning (or as loaded, if nothing was stale).
    pub schedule: Option<TemporalSchedule>,
    pub removed: usize,
}

/// Load the schedule, drop friction logs older than `max_age_ms`, and
/// persist only if something was actually removed.
pub async fn apply_retention(
    records: &Records,
    now_ms: i64,
    max_age_ms: i64,
) -> Result<RetentionReport> {
    let Some(mut schedule) = records.load_schedule().await? else {
        return Ok(RetentionReport {
            schedule: None,
            removed: 0,
        });
    };

    let removed = schedule.retain_recent_friction(now_ms, max_age_ms);
    if removed > 0 {
        records.save_schedule(&schedule).await?;
        tracing::info!(
            target: "sentinel::retention",
            "Pruned {} friction logs older than {} days",
            removed,
            max_age_ms / 86_400_000
        );
    } else {
        tracing::debug!(target: "sentinel::retention", "No stale friction logs");
    }

    Ok(RetentionReport {
        schedule: Some(schedule),
        removed,
    })
}
