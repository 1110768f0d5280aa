//! Timer controller: the sole writer of the canonical snapshot.
//!
//! Every mutation goes through the same choreography: update the in-memory
//! snapshot, stamp `last_update_date`, persist the full snapshot, then push
//! to the notification scheduler and the live-activity surface. Persistence
//! must succeed for the operation to report success; the downstream pushes
//! are fire-and-forget and only logged on failure -- the in-memory snapshot
//! stays authoritative for the current process lifetime either way.
//!
//! There is no countdown thread. Expiry is discovered lazily whenever the
//! snapshot is observed, because `remaining_seconds` and `has_expired` are
//! pure functions of wall-clock time.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{Result, TimerError};
use crate::notify::{LiveActivitySink, NotificationRequest, NotificationScheduler, TimerProjection};
use crate::storage::{Config, SnapshotStore};
use crate::timer::reconciler::{self, RecoveryOutcome, RecoveryPolicy};
use crate::timer::{Phase, RestTimerState};

/// Runtime options, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub notifications_enabled: bool,
    pub live_activity_enabled: bool,
    /// Heart-rate updates arriving faster than this are dropped.
    pub heart_rate_throttle: Duration,
    pub recovery: RecoveryPolicy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            live_activity_enabled: true,
            heart_rate_throttle: Duration::seconds(5),
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            notifications_enabled: cfg.notifications.enabled,
            live_activity_enabled: cfg.live_activity.enabled,
            heart_rate_throttle: Duration::seconds(i64::from(cfg.timer.heart_rate_throttle_secs)),
            recovery: RecoveryPolicy::with_max_age_hours(cfg.recovery.max_state_age_hours),
        }
    }
}

/// Parameters for starting a rest period.
#[derive(Debug, Clone)]
pub struct StartRest {
    pub workout_id: Uuid,
    pub workout_name: String,
    pub exercise_index: u32,
    pub set_index: u32,
    pub total_seconds: u32,
    pub current_exercise_name: Option<String>,
    pub next_exercise_name: Option<String>,
}

/// Owns the authoritative in-memory snapshot and mediates all phase
/// transitions. Everything else -- UI, widget surface, reconciler-on-read --
/// is a reader.
pub struct RestTimerController {
    store: Box<dyn SnapshotStore>,
    scheduler: Box<dyn NotificationScheduler>,
    live_activity: Box<dyn LiveActivitySink>,
    options: ControllerOptions,
    state: Option<RestTimerState>,
    last_heart_rate_update: Option<DateTime<Utc>>,
}

impl RestTimerController {
    pub fn new(
        store: Box<dyn SnapshotStore>,
        scheduler: Box<dyn NotificationScheduler>,
        live_activity: Box<dyn LiveActivitySink>,
    ) -> Self {
        Self::with_options(store, scheduler, live_activity, ControllerOptions::default())
    }

    pub fn with_options(
        store: Box<dyn SnapshotStore>,
        scheduler: Box<dyn NotificationScheduler>,
        live_activity: Box<dyn LiveActivitySink>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            store,
            scheduler,
            live_activity,
            options,
            state: None,
            last_heart_rate_update: None,
        }
    }

    /// Seeds the controller from the persisted slot.
    ///
    /// Runs the recovery reconciler, adopts whatever snapshot survived and
    /// re-registers the downstream consumers as if a fresh transition had
    /// happened. Call once at process start, before any read.
    pub fn restore(&mut self) -> Result<RecoveryOutcome> {
        let now = Utc::now();
        let outcome = reconciler::reconcile_at(self.store.as_ref(), &self.options.recovery, now)?;
        self.state = outcome.state().cloned();
        self.sync_downstream(now);
        Ok(outcome)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Plain read of the in-memory snapshot; never mutates.
    pub fn snapshot(&self) -> Option<&RestTimerState> {
        self.state.as_ref()
    }

    /// The current snapshot, with lazy expiry: observing a running timer
    /// past its `end_date` transitions it to `expired` and persists that.
    pub fn current_snapshot(&mut self) -> Result<Option<RestTimerState>> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        Ok(self.state.clone())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts a new rest period, replacing any previous timer.
    pub fn start(&mut self, request: StartRest) -> Result<RestTimerState> {
        if request.total_seconds == 0 {
            return Err(TimerError::InvalidValue {
                field: "total_seconds",
                message: "rest duration must be positive".into(),
            });
        }
        if let Some(old) = &self.state {
            tracing::info!(workout = %old.workout_name, "replacing active rest timer");
        }

        let state = RestTimerState::create(
            request.workout_id,
            request.workout_name,
            request.exercise_index,
            request.set_index,
            request.total_seconds,
            request.current_exercise_name,
            request.next_exercise_name,
        );
        let now = state.start_date;
        tracing::info!(
            workout = %state.workout_name,
            seconds = state.total_seconds,
            "rest timer started"
        );
        self.apply(Some(state.clone()), now)?;
        self.last_heart_rate_update = None;
        Ok(state)
    }

    /// Pauses the running timer, freezing the remaining seconds.
    ///
    /// Idempotent while paused: a second pause returns the same frozen
    /// snapshot.
    pub fn pause(&mut self) -> Result<RestTimerState> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        let state = self.state.as_ref().ok_or(TimerError::NoActiveTimer)?;
        match state.phase {
            Phase::Paused => Ok(state.clone()),
            Phase::Running => {
                let mut next = state.clone();
                next.frozen_remaining_seconds = Some(next.remaining_seconds_at(now));
                next.phase = Phase::Paused;
                next.last_update_date = now;
                self.apply(Some(next.clone()), now)?;
                Ok(next)
            }
            from => Err(TimerError::InvalidPhaseTransition {
                from,
                operation: "pause",
            }),
        }
    }

    /// Resumes a paused timer: `end_date` becomes `now + frozen remaining`.
    pub fn resume(&mut self) -> Result<RestTimerState> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        let state = self.state.as_ref().ok_or(TimerError::NoActiveTimer)?;
        if state.phase != Phase::Paused {
            return Err(TimerError::InvalidPhaseTransition {
                from: state.phase,
                operation: "resume",
            });
        }
        let mut next = state.clone();
        let remaining = next
            .frozen_remaining_seconds
            .take()
            .unwrap_or_else(|| next.remaining_seconds_at(now));
        next.end_date = now + Duration::seconds(i64::from(remaining));
        next.phase = Phase::Running;
        next.last_update_date = now;
        self.apply(Some(next.clone()), now)?;
        Ok(next)
    }

    /// Adds (or, with a negative delta, removes) rest time.
    ///
    /// Valid while the timer is active. The configured total moves by the
    /// same delta so `progress` keeps its denominator; clamping the
    /// remaining time to zero forces the `expired` phase.
    pub fn extend(&mut self, seconds: i64) -> Result<RestTimerState> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        let state = self.state.as_ref().ok_or(TimerError::NoActiveTimer)?;
        let mut next = state.clone();
        // Deltas come straight from callers; saturate rather than overflow,
        // and clamp to u32 before any Duration math.
        next.total_seconds =
            clamp_seconds(i64::from(next.total_seconds).saturating_add(seconds).max(1));
        match next.phase {
            Phase::Running => {
                let remaining = clamp_seconds(
                    i64::from(next.remaining_seconds_at(now))
                        .saturating_add(seconds)
                        .max(0),
                );
                next.end_date = now + Duration::seconds(i64::from(remaining));
                if remaining == 0 {
                    next.phase = Phase::Expired;
                }
            }
            Phase::Paused => {
                let frozen = clamp_seconds(
                    i64::from(next.frozen_remaining_seconds.unwrap_or(0))
                        .saturating_add(seconds)
                        .max(0),
                );
                if frozen == 0 {
                    next.frozen_remaining_seconds = None;
                    next.end_date = now;
                    next.phase = Phase::Expired;
                } else {
                    next.frozen_remaining_seconds = Some(frozen);
                }
            }
            from => {
                return Err(TimerError::InvalidPhaseTransition {
                    from,
                    operation: "extend",
                })
            }
        }
        next.last_update_date = now;
        tracing::info!(
            delta = seconds,
            remaining = next.remaining_seconds_at(now),
            "rest timer adjusted"
        );
        self.apply(Some(next.clone()), now)?;
        Ok(next)
    }

    /// Rewrites the remaining time outright (and optionally the total).
    pub fn set_rest(&mut self, remaining: u32, total: Option<u32>) -> Result<RestTimerState> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        let state = self.state.as_ref().ok_or(TimerError::NoActiveTimer)?;
        if !state.is_active() {
            return Err(TimerError::InvalidPhaseTransition {
                from: state.phase,
                operation: "set rest",
            });
        }
        let mut next = state.clone();
        next.total_seconds = total
            .unwrap_or_else(|| next.total_seconds.max(remaining))
            .max(1);
        if remaining == 0 {
            next.frozen_remaining_seconds = None;
            next.end_date = now;
            next.phase = Phase::Expired;
        } else if next.phase == Phase::Paused {
            next.frozen_remaining_seconds = Some(remaining);
        } else {
            next.end_date = now + Duration::seconds(i64::from(remaining));
        }
        next.last_update_date = now;
        self.apply(Some(next.clone()), now)?;
        Ok(next)
    }

    /// Records a heart-rate reading on the snapshot.
    ///
    /// Readings outside 30..=250 BPM are rejected; readings arriving faster
    /// than the configured throttle are dropped without a mutation.
    pub fn update_heart_rate(&mut self, bpm: u32) -> Result<RestTimerState> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        let state = self.state.as_ref().ok_or(TimerError::NoActiveTimer)?;
        if !(30..=250).contains(&bpm) {
            return Err(TimerError::InvalidValue {
                field: "heart_rate",
                message: format!("{bpm} BPM outside 30..=250"),
            });
        }
        if let Some(last) = self.last_heart_rate_update {
            if now - last < self.options.heart_rate_throttle {
                tracing::debug!(bpm, "heart-rate update throttled");
                return Ok(state.clone());
            }
        }
        let mut next = state.clone();
        next.current_heart_rate = Some(bpm);
        next.last_update_date = now;
        self.last_heart_rate_update = Some(now);
        self.apply(Some(next.clone()), now)?;
        Ok(next)
    }

    /// Acknowledges an expired timer: `expired -> completed`, then the slot
    /// is freed. Terminal.
    pub fn acknowledge(&mut self) -> Result<RestTimerState> {
        let now = Utc::now();
        self.touch_expiry(now)?;
        let state = self.state.as_ref().ok_or(TimerError::NoActiveTimer)?;
        if state.phase != Phase::Expired {
            return Err(TimerError::InvalidPhaseTransition {
                from: state.phase,
                operation: "acknowledge",
            });
        }
        let mut done = state.clone();
        done.phase = Phase::Completed;
        done.last_update_date = now;
        self.apply(Some(done.clone()), now)?;
        // Terminal phase: free the slot right away, nothing re-reads it.
        self.apply(None, now)?;
        Ok(done)
    }

    /// Stops and discards the timer: clears the slot, cancels the pending
    /// notification and ends the live activity. Propagate-and-forget.
    pub fn stop(&mut self) -> Result<()> {
        let now = Utc::now();
        if let Some(state) = &self.state {
            tracing::info!(workout = %state.workout_name, "rest timer stopped");
        }
        self.apply(None, now)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Lazy `running -> expired` transition, performed as a side effect of
    /// any observation. Only the controller and the reconciler ever make
    /// this write, so there is no reader/reader race.
    fn touch_expiry(&mut self, now: DateTime<Utc>) -> Result<()> {
        let crossed = matches!(
            &self.state,
            Some(s) if s.phase == Phase::Running && s.has_expired_at(now)
        );
        if crossed {
            let mut next = self.state.clone().ok_or(TimerError::NoActiveTimer)?;
            next.phase = Phase::Expired;
            next.last_update_date = now;
            tracing::info!(workout = %next.workout_name, "rest timer expired");
            self.apply(Some(next), now)?;
        }
        Ok(())
    }

    /// The single mutation path: in-memory first, then the durable slot,
    /// then the downstream consumers.
    ///
    /// Downstream pushes happen even if persistence failed -- the in-memory
    /// snapshot is authoritative for this process lifetime and the caller is
    /// told (via the returned error) that the mutation may not survive a
    /// crash.
    fn apply(&mut self, new_state: Option<RestTimerState>, now: DateTime<Utc>) -> Result<()> {
        let old_phase = self.state.as_ref().map(|s| s.phase);
        self.state = new_state;

        let persisted = match &self.state {
            Some(state) => self.store.set(state),
            None => self.store.clear(),
        };

        self.sync_downstream(now);

        let new_phase = self.state.as_ref().map(|s| s.phase);
        tracing::debug!(
            from = old_phase.map(|p| p.to_string()).unwrap_or_else(|| "none".into()),
            to = new_phase.map(|p| p.to_string()).unwrap_or_else(|| "none".into()),
            "state transition"
        );

        persisted.map_err(TimerError::Store)
    }

    /// Pushes the latest snapshot to the scheduler and the live-activity
    /// surface. Best-effort: failures are logged, never propagated.
    fn sync_downstream(&self, now: DateTime<Utc>) {
        if self.options.notifications_enabled {
            let result = match &self.state {
                Some(state) if state.phase == Phase::Running => self
                    .scheduler
                    .schedule(&NotificationRequest::for_state(state, now)),
                // Paused, expired, completed or cleared: nothing should fire.
                _ => self.scheduler.cancel(),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "notification reschedule failed");
            }
        }

        if self.options.live_activity_enabled {
            let result = match &self.state {
                Some(state) => self
                    .live_activity
                    .push(&TimerProjection::from_state(state, now)),
                None => self.live_activity.end(),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "live-activity push failed");
            }
        }
    }
}

fn clamp_seconds(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
