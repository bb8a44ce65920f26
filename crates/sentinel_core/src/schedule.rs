//! Pure mutations on the schedule aggregate.
//!
//! Nothing here touches storage. Callers take a copy, mutate it and persist
//! the whole aggregate, so a half-applied edit is never observable.

use crate::model::{
    FrictionImpact, FrictionLog, ScheduledTask, Strictness, TaskKind, TaskStatus,
    TemporalSchedule, WallTime,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task fields as supplied by a user or a model; identity and status optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub start_time: WallTime,
    pub duration: u32,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub strictness: Strictness,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaskDraft {
    pub fn new(title: &str, start_time: WallTime, duration: u32, kind: TaskKind) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            start_time,
            duration,
            kind,
            strictness: Strictness::default(),
            status: None,
            description: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.duration == 0 {
            return Err(format!("task {:?} has a zero duration", self.title));
        }
        if self.title.trim().is_empty() {
            return Err("task title is empty".to_string());
        }
        Ok(())
    }

    /// Materialise the draft, minting an id when none (or a blank one) was given.
    pub fn into_task(self) -> ScheduledTask {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => crate::generate_id(),
        };
        ScheduledTask {
            id,
            title: self.title,
            start_time: self.start_time,
            duration: self.duration,
            kind: self.kind,
            strictness: self.strictness,
            status: self.status.unwrap_or_default(),
            description: self.description,
        }
    }
}

/// Partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub start_time: Option<WallTime>,
    pub duration: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<TaskKind>,
    pub strictness: Option<Strictness>,
    pub status: Option<TaskStatus>,
    pub description: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, task: &mut ScheduledTask) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(start) = self.start_time {
            task.start_time = start;
        }
        // A zero duration would break the aggregate invariant; ignore it.
        if let Some(duration) = self.duration.filter(|d| *d > 0) {
            task.duration = duration;
        }
        if let Some(kind) = self.kind {
            task.kind = kind;
        }
        if let Some(strictness) = self.strictness {
            task.strictness = strictness;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
    }
}

impl TemporalSchedule {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            tasks: Vec::new(),
            cognitive_peaks: Vec::new(),
            friction_logs: Vec::new(),
        }
    }

    pub fn with_tasks(date: NaiveDate, tasks: Vec<ScheduledTask>) -> Self {
        Self {
            tasks,
            ..Self::new(date)
        }
    }

    pub fn task(&self, id: &str) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks sorted by start time for display. Overlaps are allowed.
    pub fn ordered_tasks(&self) -> Vec<&ScheduledTask> {
        let mut ordered: Vec<&ScheduledTask> = self.tasks.iter().collect();
        ordered.sort_by_key(|t| t.start_time);
        ordered
    }

    /// Returns `false` when no task carries `id`.
    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                patch.apply(task);
                true
            }
            None => false,
        }
    }

    /// Returns `false` when no task carries `id`.
    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn push_task(&mut self, draft: TaskDraft) -> ScheduledTask {
        let task = draft.into_task();
        self.tasks.push(task.clone());
        task
    }

    pub fn replace_tasks(&mut self, tasks: Vec<ScheduledTask>) {
        self.tasks = tasks;
    }

    pub fn record_friction(&mut self, task_id: &str, reason: &str, timestamp: i64) -> FrictionLog {
        let log = FrictionLog {
            task_id: task_id.to_string(),
            timestamp,
            reason: reason.to_string(),
            impact: FrictionImpact::Medium,
        };
        self.friction_logs.push(log.clone());
        log
    }

    /// Drop friction logs older than `max_age_ms` relative to `now_ms`.
    ///
    /// A log survives iff `now_ms - timestamp <= max_age_ms`.
    /// Returns how many entries were removed.
    pub fn retain_recent_friction(&mut self, now_ms: i64, max_age_ms: i64) -> usize {
        let before = self.friction_logs.len();
        self.friction_logs
            .retain(|log| now_ms.saturating_sub(log.timestamp) <= max_age_ms);
        before - self.friction_logs.len()
    }

    /// Friction logs recorded within `window_ms` before `now_ms`.
    pub fn recent_friction(&self, now_ms: i64, window_ms: i64) -> Vec<&FrictionLog> {
        self.friction_logs
            .iter()
            .filter(|log| now_ms.saturating_sub(log.timestamp) <= window_ms)
            .collect()
    }

    /// The task running at `now`: `start <= now < start + duration`.
    pub fn active_task_at(&self, now: WallTime) -> Option<&ScheduledTask> {
        let minute = now.minutes_since_midnight();
        self.tasks.iter().find(|t| {
            let start = t.start_time.minutes_since_midnight();
            minute >= start && minute < t.end_minute()
        })
    }

    /// Derived UI intensity in `[0.1, 0.8]` from the task active at `now`.
    pub fn intensity_at(&self, now: WallTime) -> f32 {
        intensity_for(self.active_task_at(now).map(|t| t.kind))
    }
}

/// Idle or resting maps to the floor intensity.
pub fn intensity_for(kind: Option<TaskKind>) -> f32 {
    match kind {
        Some(TaskKind::DeepWork) => 0.8,
        Some(TaskKind::Strategic) => 0.6,
        Some(TaskKind::Routine) => 0.3,
        Some(TaskKind::Rest) | None => 0.1,
    }
}
