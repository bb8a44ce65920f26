//! The two session polling loops: the send cooldown countdown and the UI
//! intensity monitor. Both stop when their cancellation token fires.

use sentinel_core::{Clock, TemporalSchedule};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Cooldown
// ============================================================================

/// Countdown that blocks new sends while `remaining > 0`.
///
/// Restarting replaces the running countdown rather than stacking another.
pub struct Cooldown {
    remaining: watch::Sender<u64>,
    parent: CancellationToken,
    tick: Duration,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Cooldown {
    /// `tick` is the wall time of one countdown step (one "second").
    pub fn new(parent: CancellationToken, tick: Duration) -> Self {
        let (remaining, _) = watch::channel(0);
        Self {
            remaining,
            parent,
            tick,
            running: Mutex::new(None),
        }
    }

    pub fn start(&self, secs: u64) {
        self.stop();
        if secs == 0 || self.parent.is_cancelled() {
            return;
        }
        self.remaining.send_replace(secs);

        let token = self.parent.child_token();
        let remaining = self.remaining.clone();
        let tick = self.tick;
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        let left = remaining.borrow().saturating_sub(1);
                        remaining.send_replace(left);
                        if left == 0 {
                            break;
                        }
                    }
                }
            }
        });
        tracing::debug!("Cooldown engaged for {}s", secs);

        if let Ok(mut running) = self.running.lock() {
            *running = Some((token, handle));
        }
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.remaining() > 0
    }

    /// Cancel any running countdown and clear the counter.
    pub fn stop(&self) {
        let previous = self.running.lock().ok().and_then(|mut r| r.take());
        if let Some((token, _handle)) = previous {
            token.cancel();
        }
        self.remaining.send_replace(0);
    }

    /// Cancel and wait for the countdown task to exit.
    pub async fn shutdown(&self) {
        let previous = self.running.lock().ok().and_then(|mut r| r.take());
        if let Some((token, handle)) = previous {
            token.cancel();
            let _ = handle.await;
        }
        self.remaining.send_replace(0);
    }
}

// ============================================================================
// Intensity monitor
// ============================================================================

fn current_intensity(schedule: &watch::Receiver<Option<TemporalSchedule>>, clock: &dyn Clock) -> f32 {
    let now = clock.wall_time();
    match schedule.borrow().as_ref() {
        Some(s) => s.intensity_at(now),
        None => sentinel_core::schedule::intensity_for(None),
    }
}

/// Recompute the intensity every `period`, and immediately whenever the
/// schedule changes.
pub fn spawn_intensity_monitor(
    mut schedule: watch::Receiver<Option<TemporalSchedule>>,
    clock: Arc<dyn Clock>,
    period: Duration,
    token: CancellationToken,
) -> (watch::Receiver<f32>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(current_intensity(&schedule, clock.as_ref()));

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut schedule_open = true;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                changed = schedule.changed(), if schedule_open => {
                    if changed.is_err() {
                        schedule_open = false;
                        continue;
                    }
                }
                _ = interval.tick() => {}
            }
            let level = current_intensity(&schedule, clock.as_ref());
            if (level - *tx.borrow()).abs() > f32::EPSILON {
                tracing::debug!("UI intensity now {:.1}", level);
            }
            tx.send_replace(level);
        }
    });

    (rx, handle)
}
