//! Conversational Sync Controller.
//!
//! A cheap keyword check on the assistant reply decides whether to spend a
//! second, structured call asking what exactly changed. Every failure after
//! the trigger is silent: the schedule stays bit-for-bit as it was.

use crate::api_types::Message;
use crate::decode::{decode_tasks, DecodeError};
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{PromptAssembler, STRUCTURED_SYSTEM};
use anyhow::Result;
use sentinel_core::{Clock, SentinelError, TemporalSchedule};
use sentinel_memory::Records;
use std::sync::Arc;

const TARGET: &str = "sentinel::sync";

const TRIGGER_KEYWORDS: [&str; 4] = ["schedule", "move", "update", "plan"];

pub const SYNC_CONFIRMATION: &str =
    "SYSTEM: Temporal map synchronized. I've adjusted your schedule based on our intelligence exchange.";

/// Case-insensitive substring match against the trigger keywords.
pub fn is_schedule_relevant(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    TRIGGER_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The reply did not trip the trigger; no follow-up call was made.
    NotRelevant,
    NoChange,
    Applied(TemporalSchedule),
    /// The follow-up call failed, or its reply decoded to no task array
    /// (`MalformedOutput`).
    Failed(SentinelError),
}

pub struct SyncController {
    client: Arc<dyn LlmClient>,
    records: Records,
    clock: Arc<dyn Clock>,
    max_tokens: u32,
}

impl SyncController {
    pub fn new(client: Arc<dyn LlmClient>, records: Records, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            records,
            clock,
            max_tokens: 2048,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Reconcile one dialogue turn with the stored schedule.
    ///
    /// Only a store failure while persisting an applied update is an `Err`.
    pub async fn reconcile(
        &self,
        current: Option<&TemporalSchedule>,
        user_text: &str,
        reply: &str,
    ) -> Result<SyncOutcome> {
        if !is_schedule_relevant(reply) {
            return Ok(SyncOutcome::NotRelevant);
        }

        let tasks = current.map(|s| s.tasks.as_slice()).unwrap_or_default();
        let prompt = PromptAssembler::sync(tasks, user_text, reply);
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
                tracing::warn!(target: TARGET, "Sync follow-up failed: {}", kind);
                return Ok(SyncOutcome::Failed(kind));
            }
        };

        let new_tasks = match decode_tasks(&response.content) {
            Ok(tasks) => tasks,
            Err(DecodeError::NoChange) => {
                tracing::debug!(target: TARGET, "Model reported NO_CHANGE");
                return Ok(SyncOutcome::NoChange);
            }
            Err(e) => {
                tracing::warn!(target: TARGET, "Ignoring unparsable sync reply: {}", e);
                return Ok(SyncOutcome::Failed(SentinelError::MalformedOutput(e.to_string())));
            }
        };

        let mut next = current
            .cloned()
            .unwrap_or_else(|| TemporalSchedule::new(self.clock.today()));
        next.replace_tasks(new_tasks);
        self.records.save_schedule(&next).await?;
        tracing::info!(
            target: TARGET,
            "Temporal map synchronized ({} tasks)",
            next.tasks.len()
        );
        Ok(SyncOutcome::Applied(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_keywords() {
        assert!(is_schedule_relevant("Let's MOVE your run to 18:00."));
        assert!(is_schedule_relevant("I updated nothing, but consider it."));
        assert!(is_schedule_relevant("What is the plan?"));
        assert!(is_schedule_relevant("Your Schedule looks dense."));
        assert!(is_schedule_relevant("Planning matters")); // substring match
        assert!(!is_schedule_relevant("Why do you avoid the hard task?"));
        assert!(!is_schedule_relevant(""));
    }
}
