//! Typed access to the persisted records.
//!
//! Every aggregate is stored whole under its own key as JSON, so a write
//! either replaces the full value or fails; readers never see half a schedule.

use crate::store::KvStore;
use anyhow::{Context, Result};
use sentinel_core::{ClinicalReport, TemporalSchedule, UserBaseline, WeeklyReport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub mod keys {
    pub const BASELINE: &str = "sentinel_baseline";
    pub const SCHEDULE: &str = "sentinel_schedule";
    pub const WEEKLY_REPORT: &str = "sentinel_weekly_report";
    pub const CLINICAL_REPORTS: &str = "sentinel_clinical_reports";
    pub const LAST_REPORT_TIME: &str = "last_report_time";

    pub const ALL: [&str; 5] = [
        BASELINE,
        SCHEDULE,
        WEEKLY_REPORT,
        CLINICAL_REPORTS,
        LAST_REPORT_TIME,
    ];
}

#[derive(Clone)]
pub struct Records {
    store: Arc<dyn KvStore>,
}

impl Records {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to deserialize record {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize record {}", key))?;
        self.store.set(key, &raw).await
    }

    // ---- baseline ----

    pub async fn load_baseline(&self) -> Result<Option<UserBaseline>> {
        self.load_json(keys::BASELINE).await
    }

    pub async fn save_baseline(&self, baseline: &UserBaseline) -> Result<()> {
        self.save_json(keys::BASELINE, baseline).await
    }

    // ---- schedule ----

    pub async fn load_schedule(&self) -> Result<Option<TemporalSchedule>> {
        self.load_json(keys::SCHEDULE).await
    }

    pub async fn save_schedule(&self, schedule: &TemporalSchedule) -> Result<()> {
        self.save_json(keys::SCHEDULE, schedule).await?;
        tracing::debug!(
            "Schedule {} saved ({} tasks, {} friction logs)",
            schedule.date,
            schedule.tasks.len(),
            schedule.friction_logs.len()
        );
        Ok(())
    }

    // ---- reports ----

    pub async fn load_weekly_report(&self) -> Result<Option<WeeklyReport>> {
        self.load_json(keys::WEEKLY_REPORT).await
    }

    pub async fn save_weekly_report(&self, report: &WeeklyReport) -> Result<()> {
        self.save_json(keys::WEEKLY_REPORT, report).await
    }

    pub async fn clinical_history(&self) -> Result<Vec<ClinicalReport>> {
        Ok(self
            .load_json(keys::CLINICAL_REPORTS)
            .await?
            .unwrap_or_default())
    }

    /// Append to the clinical history; existing entries are never rewritten.
    pub async fn append_clinical_report(&self, report: &ClinicalReport) -> Result<()> {
        let mut history = self.clinical_history().await?;
        history.push(report.clone());
        self.save_json(keys::CLINICAL_REPORTS, &history).await
    }

    pub async fn last_report_time(&self) -> Result<Option<i64>> {
        match self.store.get(keys::LAST_REPORT_TIME).await? {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(ts) => Ok(Some(ts)),
                Err(e) => {
                    // Treat garbage as "never", which makes a report due.
                    tracing::warn!("Ignoring unreadable last report time {:?}: {}", raw, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set_last_report_time(&self, now_ms: i64) -> Result<()> {
        self.store
            .set(keys::LAST_REPORT_TIME, &now_ms.to_string())
            .await
    }

    /// Remove every record, report history included.
    pub async fn purge(&self) -> Result<()> {
        self.store.purge().await
    }
}
