//! Session controller: the single owner of application state.
//!
//! All user-facing operations go through `Session`. It holds the
//! conversation, the cached baseline and schedule, the engines, and the two
//! timers; sub-components get what they need by argument.

use crate::api_types::StreamEvent;
use crate::conversation::{context_window, ChatMessage, ChatRole};
use crate::credentials::{require_key, CredentialProvider};
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::PromptAssembler;
use crate::report::{ReportGenerator, ReportOutcome};
use crate::schedule::{GenerateOutcome, ScheduleEngine, SystemNotice};
use crate::sync::{SyncController, SyncOutcome, SYNC_CONFIRMATION};
use crate::timers::{spawn_intensity_monitor, Cooldown};
use anyhow::Result;
use sentinel_core::config::{LlmConfig, RetentionConfig, SessionConfig};
use sentinel_core::{
    ClinicalKind, ClinicalReport, Clock, ScheduledTask, SentinelConfig, SentinelError, TaskDraft,
    TaskPatch, TemporalSchedule, UserBaseline, WeeklyReport,
};
use sentinel_memory::{apply_retention, Records};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const RATE_LIMIT_BANNER: &str = "Global Traffic surge. System cooling (15s)...";

const STATUS_PROCESSING: &str = "Processing...";
const STATUS_SYNCING: &str = "Analyzing Temporal Impact...";
const STATUS_GENERATING: &str = "Synthesizing Temporal Map...";

/// Everything the UI renders.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub messages: Vec<ChatMessage>,
    pub baseline: Option<UserBaseline>,
    pub schedule: Option<TemporalSchedule>,
    pub latest_report: Option<WeeklyReport>,
    /// Transient progress line.
    pub status: Option<String>,
    /// Blocking error banner.
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapOutcome {
    pub onboarded: bool,
    /// Friction logs removed by the decay pass.
    pub pruned: usize,
    pub report: ReportOutcome<WeeklyReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank input; nothing happened.
    Empty,
    /// A cooldown is running; seconds left.
    CoolingDown(u64),
    Completed { reply: String, sync: SyncOutcome },
    /// Aborted by the caller; the partial reply stays as it was.
    Cancelled,
    Failed(SentinelError),
}

enum StreamEnd {
    Finished,
    Cancelled,
    Failed(anyhow::Error),
}

pub struct Session {
    state: AppState,
    session_config: SessionConfig,
    llm_config: LlmConfig,
    retention_config: RetentionConfig,
    client: Arc<dyn LlmClient>,
    credentials: Arc<dyn CredentialProvider>,
    records: Records,
    clock: Arc<dyn Clock>,
    engine: ScheduleEngine,
    sync: SyncController,
    reports: ReportGenerator,
    notices: mpsc::UnboundedReceiver<SystemNotice>,
    cooldown: Cooldown,
    schedule_tx: watch::Sender<Option<TemporalSchedule>>,
    status_tx: watch::Sender<Option<String>>,
    intensity: Option<watch::Receiver<f32>>,
    monitor: Option<JoinHandle<()>>,
    token: CancellationToken,
}

impl Session {
    pub fn new(
        config: &SentinelConfig,
        client: Arc<dyn LlmClient>,
        credentials: Arc<dyn CredentialProvider>,
        records: Records,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let max_tokens = config.llm.max_tokens;

        let engine = ScheduleEngine::new(client.clone(), records.clone(), clock.clone(), notice_tx)
            .with_max_tokens(max_tokens);
        let sync = SyncController::new(client.clone(), records.clone(), clock.clone())
            .with_max_tokens(max_tokens);
        let reports = ReportGenerator::new(
            client.clone(),
            records.clone(),
            clock.clone(),
            config.retention.clone(),
        )
        .with_max_tokens(max_tokens);
        let cooldown = Cooldown::new(
            token.clone(),
            Duration::from_millis(config.session.countdown_interval_ms.max(1)),
        );
        let (schedule_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(None);

        Self {
            state: AppState::default(),
            session_config: config.session.clone(),
            llm_config: config.llm.clone(),
            retention_config: config.retention.clone(),
            client,
            credentials,
            records,
            clock,
            engine,
            sync,
            reports,
            notices,
            cooldown,
            schedule_tx,
            status_tx,
            intensity: None,
            monitor: None,
            token,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Follows `AppState::status` while a long call is in flight.
    pub fn subscribe_status(&self) -> watch::Receiver<Option<String>> {
        self.status_tx.subscribe()
    }

    fn set_status(&mut self, status: Option<&str>) {
        self.state.status = status.map(str::to_string);
        self.status_tx.send_replace(self.state.status.clone());
    }

    pub fn cooldown_remaining(&self) -> u64 {
        self.cooldown.remaining()
    }

    /// Current UI intensity; computed directly when the monitor is not running.
    pub fn intensity(&self) -> f32 {
        match &self.intensity {
            Some(rx) => *rx.borrow(),
            None => match &self.state.schedule {
                Some(s) => s.intensity_at(self.clock.wall_time()),
                None => sentinel_core::schedule::intensity_for(None),
            },
        }
    }

    pub fn subscribe_intensity(&self) -> Option<watch::Receiver<f32>> {
        self.intensity.clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load persisted state, run the decay pass, start the intensity monitor
    /// and generate the weekly report if it is due.
    pub async fn bootstrap(&mut self) -> Result<BootstrapOutcome> {
        let now = self.clock.now_ms();
        self.state.baseline = self.records.load_baseline().await?;

        let retention =
            apply_retention(&self.records, now, self.retention_config.friction_max_age_ms).await?;
        self.set_schedule(retention.schedule);
        self.state.latest_report = self.records.load_weekly_report().await?;

        if self.monitor.is_none() {
            let (rx, handle) = spawn_intensity_monitor(
                self.schedule_tx.subscribe(),
                self.clock.clone(),
                Duration::from_secs(self.session_config.intensity_interval_secs.max(1)),
                self.token.child_token(),
            );
            self.intensity = Some(rx);
            self.monitor = Some(handle);
        }

        let report = if self.state.baseline.is_some() {
            let outcome = self
                .reports
                .run_if_due(self.state.baseline.as_ref(), self.state.schedule.as_ref())
                .await;
            self.absorb_weekly(outcome)?
        } else {
            ReportOutcome::Skipped("awaiting onboarding".to_string())
        };

        tracing::info!(
            "Session ready (onboarded: {}, pruned: {})",
            self.state.baseline.is_some(),
            retention.removed
        );
        Ok(BootstrapOutcome {
            onboarded: self.state.baseline.is_some(),
            pruned: retention.removed,
            report,
        })
    }

    /// Cancel both timers and wait for them to exit.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        self.cooldown.shutdown().await;
        if let Some(handle) = self.monitor.take() {
            let _ = handle.await;
        }
        self.intensity = None;
        tracing::debug!("Session timers stopped");
    }

    /// Persist the onboarding baseline and open the dialogue with it.
    pub async fn complete_onboarding(&mut self, baseline: UserBaseline) -> Result<TurnOutcome> {
        self.records.save_baseline(&baseline).await?;
        let opening = PromptAssembler::onboarding_message(&baseline);
        self.state.baseline = Some(baseline);
        tracing::info!("Baseline stored; starting initialization sync");
        self.send_message(&opening, CancellationToken::new()).await
    }

    /// Clear every persisted record, the in-memory vault and the session state.
    pub async fn purge(&mut self) -> Result<()> {
        self.records.purge().await?;
        self.credentials.purge();
        self.cooldown.stop();
        while self.notices.try_recv().is_ok() {}
        self.state = AppState::default();
        self.set_schedule(None);
        tracing::info!("All records purged");
        Ok(())
    }

    // ========================================================================
    // Dialogue
    // ========================================================================

    /// Append queued system notices to the conversation. Returns how many.
    pub fn drain_notices(&mut self) -> usize {
        let mut count = 0;
        while let Ok(notice) = self.notices.try_recv() {
            self.state
                .messages
                .push(ChatMessage::new(ChatRole::System, notice.text, notice.timestamp));
            count += 1;
        }
        count
    }

    /// Run one dialogue turn, then reconcile the schedule with it.
    ///
    /// Once `cancel` fires, the message list is not touched again for this
    /// turn and no sync is attempted.
    pub async fn send_message(
        &mut self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Empty);
        }
        if self.cooldown.is_active() {
            return Ok(TurnOutcome::CoolingDown(self.cooldown.remaining()));
        }
        if let Err(e) = self.ensure_credential() {
            return Ok(TurnOutcome::Failed(e));
        }

        self.drain_notices();
        self.state.error = None;
        let now = self.clock.now_ms();
        self.state
            .messages
            .push(ChatMessage::new(ChatRole::User, text, now));
        let context = context_window(&self.state.messages, self.session_config.context_window);
        let placeholder = ChatMessage::new(ChatRole::Assistant, "", now);
        let placeholder_id = placeholder.id.clone();
        self.state.messages.push(placeholder);

        self.state.loading = true;
        self.set_status(Some(STATUS_PROCESSING));
        let system = PromptAssembler::dialogue_system(self.state.baseline.as_ref());
        let params = CompletionParams {
            max_tokens: self.llm_config.max_tokens,
            temperature: self.llm_config.temperature,
        };

        let end = self
            .stream_into(&placeholder_id, &system, context, params, &cancel)
            .await;
        let outcome = match end {
            StreamEnd::Cancelled => {
                tracing::info!("Dialogue turn cancelled");
                TurnOutcome::Cancelled
            }
            StreamEnd::Failed(e) => self.handle_turn_failure(&placeholder_id, &e),
            StreamEnd::Finished => {
                let reply = self
                    .message_text(&placeholder_id)
                    .unwrap_or_default();
                let sync = self.reconcile(text, &reply).await;
                self.cooldown.start(self.session_config.success_cooldown_secs);
                TurnOutcome::Completed { reply, sync }
            }
        };

        self.state.loading = false;
        self.set_status(None);
        Ok(outcome)
    }

    async fn stream_into(
        &mut self,
        placeholder_id: &str,
        system: &str,
        context: Vec<crate::api_types::Message>,
        params: CompletionParams,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            r = self.client.stream_complete(system, context, params) => r,
        };
        let mut rx = match started {
            Ok(rx) => rx,
            Err(e) => return StreamEnd::Failed(e),
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                ev = rx.recv() => ev,
            };
            match event {
                Some(StreamEvent::TextDelta(delta)) => {
                    if let Some(msg) = self.message_mut(placeholder_id) {
                        msg.text.push_str(&delta);
                    }
                }
                Some(StreamEvent::Done { .. }) | None => return StreamEnd::Finished,
                Some(StreamEvent::Error(e)) => return StreamEnd::Failed(anyhow::anyhow!(e)),
            }
        }
    }

    fn handle_turn_failure(&mut self, placeholder_id: &str, err: &anyhow::Error) -> TurnOutcome {
        let kind = SentinelError::classify(err);
        self.state.messages.retain(|m| m.id != placeholder_id);

        match &kind {
            SentinelError::MissingCredential => {
                self.state.error = Some(kind.to_string());
            }
            SentinelError::RateLimited(_) => {
                tracing::warn!("Dialogue rate limited: {}", kind);
                self.state.error = Some(RATE_LIMIT_BANNER.to_string());
                self.cooldown.start(self.session_config.failure_cooldown_secs);
            }
            _ => {
                tracing::warn!("Dialogue failed: {}", kind);
                self.state.messages.push(ChatMessage::new(
                    ChatRole::SystemError,
                    format!("Signal lost: {}", kind),
                    self.clock.now_ms(),
                ));
                self.cooldown.start(self.session_config.failure_cooldown_secs);
            }
        }
        TurnOutcome::Failed(kind)
    }

    async fn reconcile(&mut self, user_text: &str, reply: &str) -> SyncOutcome {
        self.set_status(Some(STATUS_SYNCING));
        let outcome = match self
            .sync
            .reconcile(self.state.schedule.as_ref(), user_text, reply)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(target: "sentinel::sync", "Sync could not be persisted: {:#}", e);
                SyncOutcome::Failed(SentinelError::classify(&e))
            }
        };

        if let SyncOutcome::Applied(schedule) = &outcome {
            self.set_schedule(Some(schedule.clone()));
            self.state.messages.push(ChatMessage::new(
                ChatRole::System,
                SYNC_CONFIRMATION,
                self.clock.now_ms(),
            ));
        }
        outcome
    }

    // ========================================================================
    // Schedule
    // ========================================================================

    pub async fn generate_schedule(&mut self) -> Result<GenerateOutcome> {
        let Some(baseline) = self.state.baseline.clone() else {
            return Ok(GenerateOutcome::Unchanged {
                reason: "no baseline yet".to_string(),
            });
        };
        self.ensure_credential()?;

        self.state.loading = true;
        self.set_status(Some(STATUS_GENERATING));
        let result = self
            .engine
            .generate(&baseline, self.state.schedule.as_ref())
            .await;
        self.state.loading = false;
        self.set_status(None);

        let outcome = self.note_credential_failure(result)?;
        if let GenerateOutcome::Generated(schedule) = &outcome {
            self.set_schedule(Some(schedule.clone()));
        }
        Ok(outcome)
    }

    pub async fn add_task(&mut self, draft: TaskDraft) -> Result<ScheduledTask> {
        let (next, task) = self
            .engine
            .add_task(self.state.schedule.as_ref(), draft)
            .await?;
        self.set_schedule(Some(next));
        Ok(task)
    }

    pub async fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> Result<()> {
        let Some(current) = &self.state.schedule else {
            return Ok(());
        };
        let next = self.engine.update_task(current, task_id, &patch).await?;
        self.set_schedule(Some(next));
        Ok(())
    }

    pub async fn delete_task(&mut self, task_id: &str) -> Result<()> {
        let Some(current) = &self.state.schedule else {
            return Ok(());
        };
        let next = self.engine.delete_task(current, task_id).await?;
        self.set_schedule(Some(next));
        Ok(())
    }

    pub async fn toggle_complete(&mut self, task_id: &str) -> Result<()> {
        let Some(current) = &self.state.schedule else {
            return Ok(());
        };
        let next = self.engine.toggle_complete(current, task_id).await?;
        self.set_schedule(Some(next));
        Ok(())
    }

    /// Log friction and queue the matching system notice.
    pub async fn log_friction(&mut self, task_id: &str, reason: &str) -> Result<()> {
        let Some(current) = &self.state.schedule else {
            tracing::debug!(target: "sentinel::schedule", "log_friction: no schedule loaded");
            return Ok(());
        };
        let next = self.engine.add_friction(current, task_id, reason).await?;
        self.set_schedule(Some(next));
        Ok(())
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub async fn generate_weekly_report(&mut self) -> Result<ReportOutcome<WeeklyReport>> {
        self.ensure_credential()?;
        let outcome = self
            .reports
            .generate_weekly(self.state.baseline.as_ref(), self.state.schedule.as_ref())
            .await;
        self.absorb_weekly(outcome)
    }

    pub async fn generate_clinical_report(
        &mut self,
        kind: ClinicalKind,
    ) -> Result<ReportOutcome<ClinicalReport>> {
        self.ensure_credential()?;
        let outcome = self
            .reports
            .generate_clinical(kind, self.state.baseline.as_ref(), self.state.schedule.as_ref())
            .await;
        self.note_credential_failure(outcome)
    }

    pub async fn clinical_history(&self) -> Result<Vec<ClinicalReport>> {
        self.records.clinical_history().await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn absorb_weekly(
        &mut self,
        outcome: Result<ReportOutcome<WeeklyReport>>,
    ) -> Result<ReportOutcome<WeeklyReport>> {
        let outcome = match outcome {
            Err(e) if SentinelError::classify(&e) == SentinelError::MissingCredential => {
                tracing::warn!(target: "sentinel::report", "Weekly report skipped: credential missing");
                ReportOutcome::Skipped(SentinelError::MissingCredential.to_string())
            }
            other => other?,
        };
        if let ReportOutcome::Generated(report) = &outcome {
            self.state.latest_report = Some(report.clone());
        }
        Ok(outcome)
    }

    /// Raise the key-missing banner if `result` failed for that reason.
    fn note_credential_failure<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if SentinelError::classify(e) == SentinelError::MissingCredential {
                self.state.error = Some(SentinelError::MissingCredential.to_string());
            }
        }
        result
    }

    fn ensure_credential(&mut self) -> std::result::Result<(), SentinelError> {
        if self.client.requires_credential() {
            if let Err(e) = require_key(self.credentials.as_ref()) {
                self.state.error = Some(e.to_string());
                return Err(e);
            }
        }
        Ok(())
    }

    fn set_schedule(&mut self, schedule: Option<TemporalSchedule>) {
        self.state.schedule = schedule.clone();
        self.schedule_tx.send_replace(schedule);
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.state.messages.iter_mut().find(|m| m.id == id)
    }

    fn message_text(&self, id: &str) -> Option<String> {
        self.state
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.text.clone())
    }
}
