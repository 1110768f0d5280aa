//! Recovery reconciler.
//!
//! Runs once per cold start, before any consumer reads timer state: loads
//! the persisted snapshot, validates it, and decides whether to resume,
//! expire or discard it. Correctness depends only on the snapshot having
//! been durably persisted before the process died and on every countdown
//! value being a pure function of stored absolute timestamps -- which is
//! exactly what makes the subsystem survive force quit, OS termination and
//! reboot.

use chrono::{DateTime, Duration, Utc};

use crate::error::{StoreError, TimerError};
use crate::storage::SnapshotStore;
use crate::timer::{Phase, RestTimerState};

/// Staleness policy for recovered snapshots.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    /// Snapshots whose `last_update_date` is older than this are discarded;
    /// the owning workout could not plausibly still be in progress.
    pub max_age: Duration,
}

impl RecoveryPolicy {
    pub fn with_max_age_hours(hours: u32) -> Self {
        Self {
            max_age: Duration::hours(i64::from(hours)),
        }
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::with_max_age_hours(24)
    }
}

/// What the reconciler found and did.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Nothing persisted; nothing to reconcile.
    NoTimer,
    /// Snapshot is live again (running with time left, or still paused).
    Resumed(RestTimerState),
    /// Timer crossed `end_date` while the process was dead; the snapshot is
    /// now in the `expired` phase and the UI should surface "rest ended
    /// while away".
    ExpiredWhileAway(RestTimerState),
    /// Persisted data was unreadable or violated invariants; slot cleared.
    DiscardedCorrupt,
    /// Snapshot was implausibly old; slot cleared.
    DiscardedStale,
}

impl RecoveryOutcome {
    /// The reconstructed snapshot, when one survived.
    pub fn state(&self) -> Option<&RestTimerState> {
        match self {
            RecoveryOutcome::Resumed(state) | RecoveryOutcome::ExpiredWhileAway(state) => {
                Some(state)
            }
            _ => None,
        }
    }
}

/// Reconciles the persisted slot against the current wall clock.
pub fn reconcile(
    store: &dyn SnapshotStore,
    policy: &RecoveryPolicy,
) -> Result<RecoveryOutcome, TimerError> {
    reconcile_at(store, policy, Utc::now())
}

/// Clock-explicit form of [`reconcile`].
pub fn reconcile_at(
    store: &dyn SnapshotStore,
    policy: &RecoveryPolicy,
    now: DateTime<Utc>,
) -> Result<RecoveryOutcome, TimerError> {
    let mut state = match store.get() {
        Ok(Some(state)) => state,
        Ok(None) => {
            tracing::debug!("no persisted rest timer");
            return Ok(RecoveryOutcome::NoTimer);
        }
        // Unparseable slot content counts as corrupt, not as a hard failure.
        Err(StoreError::Json(e)) => {
            tracing::warn!(error = %e, "persisted rest timer unreadable, discarding");
            store.clear()?;
            return Ok(RecoveryOutcome::DiscardedCorrupt);
        }
        Err(e) => return Err(TimerError::Store(e)),
    };

    if !state.is_valid() {
        tracing::warn!(phase = %state.phase, "persisted rest timer invalid, discarding");
        store.clear()?;
        return Ok(RecoveryOutcome::DiscardedCorrupt);
    }

    // A completed snapshot should never be on disk (acknowledging clears the
    // slot), but an interrupted acknowledge can leave one. Finish the job.
    if state.phase == Phase::Completed {
        store.clear()?;
        return Ok(RecoveryOutcome::NoTimer);
    }

    let age = state.age_at(now);
    if age > policy.max_age {
        tracing::info!(
            age_hours = age.num_hours(),
            workout = %state.workout_name,
            "persisted rest timer too old, discarding"
        );
        store.clear()?;
        return Ok(RecoveryOutcome::DiscardedStale);
    }

    // Lazy expiry: the user missed the end of rest while the app was closed.
    // Paused snapshots are exempt: pausing suspends wall-clock derivation,
    // so an old paused snapshot is still meaningfully paused.
    if state.phase == Phase::Running && state.has_expired_at(now) {
        state.phase = Phase::Expired;
        state.last_update_date = now;
        store.set(&state)?;
        tracing::info!(workout = %state.workout_name, "rest ended while away");
        return Ok(RecoveryOutcome::ExpiredWhileAway(state));
    }

    if state.phase == Phase::Expired {
        // Still waiting for acknowledgment from before the gap.
        return Ok(RecoveryOutcome::ExpiredWhileAway(state));
    }

    tracing::info!(
        phase = %state.phase,
        remaining = state.remaining_seconds_at(now),
        "rest timer restored"
    );
    Ok(RecoveryOutcome::Resumed(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySnapshotStore;
    use uuid::Uuid;

    fn sample(total_seconds: u32) -> RestTimerState {
        RestTimerState::create(Uuid::new_v4(), "Push Day", 0, 0, total_seconds, None, None)
    }

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::default()
    }

    #[test]
    fn empty_slot_is_no_timer() {
        let store = MemorySnapshotStore::new();
        let outcome = reconcile_at(&store, &policy(), Utc::now()).unwrap();
        assert_eq!(outcome, RecoveryOutcome::NoTimer);
    }

    #[test]
    fn invalid_snapshot_is_discarded_and_cleared() {
        let store = MemorySnapshotStore::new();
        let mut state = sample(60);
        state.current_heart_rate = Some(300);
        store.set(&state).unwrap();

        let outcome = reconcile_at(&store, &policy(), Utc::now()).unwrap();
        assert_eq!(outcome, RecoveryOutcome::DiscardedCorrupt);
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let store = MemorySnapshotStore::new();
        let state = sample(60);
        let now = state.last_update_date + Duration::hours(25);
        store.set(&state).unwrap();

        let outcome = reconcile_at(&store, &policy(), now).unwrap();
        assert_eq!(outcome, RecoveryOutcome::DiscardedStale);
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn running_past_end_becomes_expired_deterministically() {
        // Regardless of how long the process was dead (within the staleness
        // window), a running snapshot past end_date always lands in expired.
        for gap_secs in [1i64, 40, 600, 3600] {
            let store = MemorySnapshotStore::new();
            let state = sample(30);
            let now = state.end_date + Duration::seconds(gap_secs);
            store.set(&state).unwrap();

            let outcome = reconcile_at(&store, &policy(), now).unwrap();
            let recovered = match outcome {
                RecoveryOutcome::ExpiredWhileAway(s) => s,
                other => panic!("expected ExpiredWhileAway, got {other:?}"),
            };
            assert_eq!(recovered.phase, Phase::Expired);
            assert_eq!(recovered.last_update_date, now);
            // The adjusted snapshot is persisted back.
            assert_eq!(store.get().unwrap().unwrap().phase, Phase::Expired);
        }
    }

    #[test]
    fn running_with_time_left_resumes() {
        let store = MemorySnapshotStore::new();
        let state = sample(90);
        let now = state.start_date + Duration::seconds(30);
        store.set(&state).unwrap();

        let outcome = reconcile_at(&store, &policy(), now).unwrap();
        let recovered = outcome.state().unwrap();
        assert_eq!(recovered.phase, Phase::Running);
        assert_eq!(recovered.remaining_seconds_at(now), 60);
    }

    #[test]
    fn paused_snapshot_stays_paused_with_frozen_remaining() {
        // start(60) at T0, paused at T0+10 (remaining 50), process killed,
        // reconciler runs at T0+3600: still paused, still 50.
        let store = MemorySnapshotStore::new();
        let mut state = sample(60);
        state.phase = Phase::Paused;
        state.frozen_remaining_seconds = Some(50);
        state.last_update_date = state.start_date + Duration::seconds(10);
        let now = state.start_date + Duration::seconds(3600);
        store.set(&state).unwrap();

        let outcome = reconcile_at(&store, &policy(), now).unwrap();
        let recovered = match outcome {
            RecoveryOutcome::Resumed(s) => s,
            other => panic!("expected Resumed, got {other:?}"),
        };
        assert_eq!(recovered.phase, Phase::Paused);
        assert_eq!(recovered.remaining_seconds_at(now), 50);
    }

    #[test]
    fn already_expired_snapshot_still_awaits_acknowledgment() {
        let store = MemorySnapshotStore::new();
        let mut state = sample(30);
        state.phase = Phase::Expired;
        store.set(&state).unwrap();

        let now = state.end_date + Duration::seconds(5);
        let outcome = reconcile_at(&store, &policy(), now).unwrap();
        assert!(matches!(outcome, RecoveryOutcome::ExpiredWhileAway(_)));
    }

    #[test]
    fn leftover_completed_snapshot_is_swept() {
        let store = MemorySnapshotStore::new();
        let mut state = sample(30);
        state.phase = Phase::Completed;
        store.set(&state).unwrap();

        let outcome = reconcile_at(&store, &policy(), Utc::now()).unwrap();
        assert_eq!(outcome, RecoveryOutcome::NoTimer);
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn custom_policy_widens_the_window() {
        let store = MemorySnapshotStore::new();
        let state = sample(60);
        let now = state.last_update_date + Duration::hours(30);
        store.set(&state).unwrap();

        let lenient = RecoveryPolicy::with_max_age_hours(48);
        let outcome = reconcile_at(&store, &lenient, now).unwrap();
        // 30h old but inside the 48h window: expired, not stale.
        assert!(matches!(outcome, RecoveryOutcome::ExpiredWhileAway(_)));
    }
}
