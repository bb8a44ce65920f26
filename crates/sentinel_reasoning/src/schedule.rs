//! Schedule Engine: generation and persisted mutations of the schedule aggregate.
//!
//! Every mutation takes the current aggregate, applies the change to a copy
//! and writes the whole copy before returning it. An unknown task id is a
//! silent no-op: the input comes back unchanged and nothing is written.

use crate::api_types::Message;
use crate::decode::decode_tasks;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{friction_notice, PromptAssembler, STRUCTURED_SYSTEM};
use anyhow::{Context, Result};
use sentinel_core::{
    Clock, ScheduledTask, SentinelError, TaskDraft, TaskPatch, TaskStatus, TemporalSchedule,
    UserBaseline,
};
use sentinel_memory::Records;
use std::sync::Arc;
use tokio::sync::mpsc;

const TARGET: &str = "sentinel::schedule";

/// Synthesized message for the dialogue stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemNotice {
    pub text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    Generated(TemporalSchedule),
    /// Nothing usable came back; the stored schedule was not touched.
    Unchanged { reason: String },
}

pub struct ScheduleEngine {
    client: Arc<dyn LlmClient>,
    records: Records,
    clock: Arc<dyn Clock>,
    notices: mpsc::UnboundedSender<SystemNotice>,
    max_tokens: u32,
}

impl ScheduleEngine {
    pub fn new(
        client: Arc<dyn LlmClient>,
        records: Records,
        clock: Arc<dyn Clock>,
        notices: mpsc::UnboundedSender<SystemNotice>,
    ) -> Self {
        Self {
            client,
            records,
            clock,
            notices,
            max_tokens: 2048,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Ask the model for a full-day plan inside `[wake, sleep)`.
    ///
    /// Only a missing credential or a store failure is an `Err`; gateway
    /// failures and unusable output leave the stored schedule untouched.
    pub async fn generate(
        &self,
        baseline: &UserBaseline,
        current: Option<&TemporalSchedule>,
    ) -> Result<GenerateOutcome> {
        let prompt = PromptAssembler::generation(baseline);
        let response = match self
            .client
            .complete(
                STRUCTURED_SYSTEM,
                vec![Message::user(prompt)],
                CompletionParams::structured(self.max_tokens),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let kind = SentinelError::classify(&e);
                if kind == SentinelError::MissingCredential {
                    return Err(e);
                }
                tracing::warn!(target: TARGET, "Schedule generation failed: {}", kind);
                return Ok(GenerateOutcome::Unchanged {
                    reason: kind.to_string(),
                });
            }
        };

        let tasks = match decode_tasks(&response.content) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(target: TARGET, "Discarding generated schedule: {}", e);
                return Ok(GenerateOutcome::Unchanged {
                    reason: e.to_string(),
                });
            }
        };

        let total = tasks.len();
        let tasks: Vec<ScheduledTask> = tasks
            .into_iter()
            .filter(|t| t.start_time.within(baseline.wake_time, baseline.sleep_time))
            .collect();
        if tasks.len() < total {
            tracing::debug!(
                target: TARGET,
                "Dropped {} generated tasks outside {}-{}",
                total - tasks.len(),
                baseline.wake_time,
                baseline.sleep_time
            );
        }
        if tasks.is_empty() {
            tracing::warn!(target: TARGET, "Generated schedule had no tasks inside the waking window");
            return Ok(GenerateOutcome::Unchanged {
                reason: "no task inside the waking window".to_string(),
            });
        }

        let mut schedule = TemporalSchedule::with_tasks(self.clock.today(), tasks);
        if let Some(prev) = current {
            schedule.friction_logs = prev.friction_logs.clone();
        }
        self.records
            .save_schedule(&schedule)
            .await
            .context("Failed to persist generated schedule")?;
        tracing::info!(
            target: TARGET,
            "Generated schedule for {} with {} tasks",
            schedule.date,
            schedule.tasks.len()
        );
        Ok(GenerateOutcome::Generated(schedule))
    }

    /// Append a task, creating today's schedule if none exists yet.
    pub async fn add_task(
        &self,
        current: Option<&TemporalSchedule>,
        draft: TaskDraft,
    ) -> Result<(TemporalSchedule, ScheduledTask)> {
        draft.validate().map_err(anyhow::Error::msg)?;
        let mut next = current
            .cloned()
            .unwrap_or_else(|| TemporalSchedule::new(self.clock.today()));
        let task = next.push_task(draft);
        self.records.save_schedule(&next).await?;
        tracing::debug!(target: TARGET, "Added task {} ({})", task.id, task.title);
        Ok((next, task))
    }

    pub async fn update_task(
        &self,
        schedule: &TemporalSchedule,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<TemporalSchedule> {
        let mut next = schedule.clone();
        if !next.update_task(task_id, patch) {
            tracing::debug!(target: TARGET, "update_task: no task with id {}", task_id);
            return Ok(next);
        }
        self.records.save_schedule(&next).await?;
        Ok(next)
    }

    pub async fn delete_task(
        &self,
        schedule: &TemporalSchedule,
        task_id: &str,
    ) -> Result<TemporalSchedule> {
        let mut next = schedule.clone();
        if !next.delete_task(task_id) {
            tracing::debug!(target: TARGET, "delete_task: no task with id {}", task_id);
            return Ok(next);
        }
        self.records.save_schedule(&next).await?;
        Ok(next)
    }

    /// Flip a task between pending and completed. Other states become completed.
    pub async fn toggle_complete(
        &self,
        schedule: &TemporalSchedule,
        task_id: &str,
    ) -> Result<TemporalSchedule> {
        let Some(task) = schedule.task(task_id) else {
            tracing::debug!(target: TARGET, "toggle_complete: no task with id {}", task_id);
            return Ok(schedule.clone());
        };
        let status = match task.status {
            TaskStatus::Completed => TaskStatus::Pending,
            _ => TaskStatus::Completed,
        };
        self.update_task(schedule, task_id, &TaskPatch::status(status))
            .await
    }

    /// Record friction against `task_id` and queue a notice for the dialogue.
    ///
    /// The id is a weak reference; logging against a deleted task is allowed.
    pub async fn add_friction(
        &self,
        schedule: &TemporalSchedule,
        task_id: &str,
        reason: &str,
    ) -> Result<TemporalSchedule> {
        let now = self.clock.now_ms();
        let mut next = schedule.clone();
        next.record_friction(task_id, reason, now);
        self.records.save_schedule(&next).await?;

        let title = schedule
            .task(task_id)
            .map(|t| t.title.as_str())
            .unwrap_or("unknown task");
        let notice = SystemNotice {
            text: friction_notice(title, task_id, reason),
            timestamp: now,
        };
        if self.notices.send(notice).is_err() {
            tracing::debug!(target: TARGET, "Notice channel closed; friction notice dropped");
        }
        tracing::info!(target: TARGET, "Friction logged on {}: {}", task_id, reason);
        Ok(next)
    }
}
