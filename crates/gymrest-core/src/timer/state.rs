//! Rest timer snapshot model.
//!
//! `RestTimerState` is the canonical snapshot shared by every consumer of the
//! rest timer: the foreground UI, the out-of-process live-activity surface
//! and the notification scheduler. All countdown values are derived from the
//! stored wall-clock timestamps on every read -- there is no ticking counter,
//! which is what lets the timer survive process suspension, force quit and
//! reboot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase of a rest timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Counting down against the wall clock.
    Running,
    /// Suspended by the user; the wall clock is frozen.
    Paused,
    /// Crossed `end_date`, waiting for user acknowledgment.
    Expired,
    /// Acknowledged by the user (terminal).
    Completed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::Expired => "expired",
            Phase::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Canonical rest timer snapshot.
///
/// Exactly one snapshot exists per device at any time; the persistence slot
/// holds a single record and creating a new timer overwrites it. Field names
/// serialize in camelCase -- this is the cross-process contract read by the
/// widget extension and must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTimerState {
    /// Unique identifier for this timer instance.
    pub id: Uuid,
    /// Owning workout session.
    pub workout_id: Uuid,
    /// Workout name, cached for display.
    pub workout_name: String,
    /// 0-based exercise position within the workout.
    pub exercise_index: u32,
    /// 0-based set position within the exercise.
    pub set_index: u32,
    /// Wall-clock time the rest began.
    pub start_date: DateTime<Utc>,
    /// Wall-clock time the rest is scheduled to end. Recalculated on resume;
    /// stale and meaningless while `phase` is `paused`.
    pub end_date: DateTime<Utc>,
    /// Configured duration in seconds, always > 0. Grows/shrinks with
    /// `extend` so `progress` keeps its denominator.
    pub total_seconds: u32,
    pub phase: Phase,
    /// Time of the most recent mutation. Used for staleness checks at
    /// recovery, never for counting down.
    pub last_update_date: DateTime<Utc>,
    /// Remaining seconds captured at pause time. `Some` iff `phase` is
    /// `paused`; part of the persisted contract so cross-process readers
    /// agree on the frozen value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_remaining_seconds: Option<u32>,
    /// Display cache, best-effort, never authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_exercise_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_exercise_name: Option<String>,
    /// Latest heart rate in BPM, 30..=250 when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_heart_rate: Option<u32>,
}

impl RestTimerState {
    /// Creates a running snapshot starting now.
    ///
    /// The caller must reject `total_seconds == 0` before construction; the
    /// type itself only validates.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        workout_id: Uuid,
        workout_name: impl Into<String>,
        exercise_index: u32,
        set_index: u32,
        total_seconds: u32,
        current_exercise_name: Option<String>,
        next_exercise_name: Option<String>,
    ) -> Self {
        debug_assert!(total_seconds > 0, "caller must reject zero durations");
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workout_id,
            workout_name: workout_name.into(),
            exercise_index,
            set_index,
            start_date: now,
            end_date: now + Duration::seconds(i64::from(total_seconds)),
            total_seconds,
            phase: Phase::Running,
            last_update_date: now,
            frozen_remaining_seconds: None,
            current_exercise_name,
            next_exercise_name,
            current_heart_rate: None,
        }
    }

    // ── Derived reads ────────────────────────────────────────────────
    //
    // Pure functions of stored timestamps plus `now`; safe to evaluate from
    // any thread at any cadence. Each has a `*_at` form for callers that
    // carry their own clock (tests, the reconciler).

    /// Seconds until `end_date`, clamped at 0. While paused, answers from
    /// the frozen value instead of the stale `end_date`.
    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> u32 {
        if self.phase == Phase::Paused {
            if let Some(frozen) = self.frozen_remaining_seconds {
                return frozen;
            }
        }
        let secs = (self.end_date - now).num_seconds();
        u32::try_from(secs.max(0)).unwrap_or(0)
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds_at(Utc::now())
    }

    /// Running or paused.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Running | Phase::Paused)
    }

    /// Whether the timer has crossed `end_date` without being acknowledged.
    ///
    /// Can be true while `phase` is still `running` -- nobody has observed
    /// the crossing yet. Always false while paused (the wall clock is
    /// suspended) and after completion.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.phase {
            Phase::Paused | Phase::Completed => false,
            Phase::Running | Phase::Expired => now >= self.end_date,
        }
    }

    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Elapsed share of the configured duration, clamped to `[0, 1]`.
    pub fn progress_at(&self, now: DateTime<Utc>) -> f64 {
        if self.total_seconds == 0 {
            return 1.0;
        }
        let elapsed = self.total_seconds.saturating_sub(self.remaining_seconds_at(now));
        (f64::from(elapsed) / f64::from(self.total_seconds)).clamp(0.0, 1.0)
    }

    pub fn progress(&self) -> f64 {
        self.progress_at(Utc::now())
    }

    /// Time since the last mutation.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_update_date
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Re-checks the model invariants.
    ///
    /// Used defensively after deserialization; persisted data may be
    /// malformed or from an older incompatible version. Index bounds are
    /// structural (`u32`), so only the remaining invariants are checked.
    pub fn is_valid(&self) -> bool {
        if self.total_seconds == 0 {
            return false;
        }
        if self.end_date <= self.start_date {
            return false;
        }
        if let Some(hr) = self.current_heart_rate {
            if !(30..=250).contains(&hr) {
                return false;
            }
        }
        // Frozen remaining is part of the paused contract: present iff paused.
        match self.phase {
            Phase::Paused => self.frozen_remaining_seconds.is_some(),
            _ => self.frozen_remaining_seconds.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn sample(total_seconds: u32) -> RestTimerState {
        RestTimerState::create(
            Uuid::new_v4(),
            "Push Day",
            1,
            2,
            total_seconds,
            Some("Bench Press".into()),
            Some("Squat".into()),
        )
    }

    #[test]
    fn create_is_running_and_valid() {
        let state = sample(90);
        assert_eq!(state.phase, Phase::Running);
        assert!(state.is_active());
        assert!(state.is_valid());
        assert_eq!(
            (state.end_date - state.start_date).num_seconds(),
            90
        );
    }

    #[test]
    fn remaining_and_progress_at_one_third() {
        let state = sample(90);
        let now = state.start_date + Duration::seconds(30);
        assert_eq!(state.remaining_seconds_at(now), 60);
        let progress = state.progress_at(now);
        assert!((progress - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn remaining_clamps_at_zero_after_end() {
        let state = sample(30);
        let now = state.end_date + Duration::seconds(40);
        assert_eq!(state.remaining_seconds_at(now), 0);
        assert_eq!(state.progress_at(now), 1.0);
        assert!(state.has_expired_at(now));
    }

    #[test]
    fn has_expired_true_while_running_past_end() {
        let state = sample(30);
        assert!(!state.has_expired_at(state.start_date + Duration::seconds(29)));
        assert!(state.has_expired_at(state.start_date + Duration::seconds(30)));
        assert_eq!(state.phase, Phase::Running);
    }

    #[test]
    fn paused_snapshot_answers_from_frozen_value() {
        let mut state = sample(60);
        state.phase = Phase::Paused;
        state.frozen_remaining_seconds = Some(50);
        // An hour past the stale end_date: still 50.
        let now = state.end_date + Duration::seconds(3600);
        assert_eq!(state.remaining_seconds_at(now), 50);
        assert!(!state.has_expired_at(now));
        assert!(state.is_active());
    }

    #[test]
    fn completed_never_expired() {
        let mut state = sample(30);
        state.phase = Phase::Completed;
        assert!(!state.has_expired_at(state.end_date + Duration::seconds(10)));
        assert!(!state.is_active());
    }

    #[test]
    fn is_valid_rejects_bad_heart_rate() {
        let mut state = sample(60);
        state.current_heart_rate = Some(20);
        assert!(!state.is_valid());
        state.current_heart_rate = Some(251);
        assert!(!state.is_valid());
        state.current_heart_rate = Some(145);
        assert!(state.is_valid());
    }

    #[test]
    fn is_valid_rejects_inverted_dates() {
        let mut state = sample(60);
        state.end_date = state.start_date;
        assert!(!state.is_valid());
    }

    #[test]
    fn is_valid_ties_frozen_value_to_paused_phase() {
        let mut state = sample(60);
        state.frozen_remaining_seconds = Some(10);
        assert!(!state.is_valid(), "frozen value without paused phase");
        state.phase = Phase::Paused;
        assert!(state.is_valid());
        state.frozen_remaining_seconds = None;
        assert!(!state.is_valid(), "paused phase without frozen value");
    }

    #[test]
    fn serde_roundtrip_is_lossless() {
        let mut state = sample(90);
        state.current_heart_rate = Some(132);
        let json = serde_json::to_string(&state).unwrap();
        let back: RestTimerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert!(back.is_valid());
    }

    #[test]
    fn serde_uses_camel_case_contract() {
        let state = sample(60);
        let value: serde_json::Value = serde_json::to_value(&state).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "workoutId",
            "workoutName",
            "exerciseIndex",
            "setIndex",
            "startDate",
            "endDate",
            "totalSeconds",
            "lastUpdateDate",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(value["phase"], "running");
    }

    #[test]
    fn frozen_field_absent_from_running_json() {
        let state = sample(60);
        let value: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert!(value.get("frozenRemainingSeconds").is_none());
    }

    #[test]
    fn deserializes_pre_freeze_snapshots() {
        // Older snapshots carry no frozenRemainingSeconds key at all.
        let json = r#"{
            "id": "6f7e4a8e-7a35-4b86-9b52-111111111111",
            "workoutId": "6f7e4a8e-7a35-4b86-9b52-222222222222",
            "workoutName": "Pull Day",
            "exerciseIndex": 0,
            "setIndex": 0,
            "startDate": "2026-08-29T10:00:00Z",
            "endDate": "2026-08-29T10:01:30Z",
            "totalSeconds": 90,
            "phase": "running",
            "lastUpdateDate": "2026-08-29T10:00:00Z"
        }"#;
        let state: RestTimerState = serde_json::from_str(json).unwrap();
        assert_eq!(state.frozen_remaining_seconds, None);
        assert!(state.is_valid());
    }

    proptest! {
        #[test]
        fn progress_always_in_unit_interval(
            total in 1u32..=7200,
            offset in -10_000i64..=100_000,
        ) {
            let state = sample(total);
            let now = state.start_date + Duration::seconds(offset);
            let p = state.progress_at(now);
            prop_assert!((0.0..=1.0).contains(&p));
        }

        #[test]
        fn remaining_never_exceeds_configured_span(
            total in 1u32..=7200,
            offset in 0i64..=100_000,
        ) {
            let state = sample(total);
            let now = state.start_date + Duration::seconds(offset);
            prop_assert!(state.remaining_seconds_at(now) <= total);
        }

        #[test]
        fn remaining_monotonically_non_increasing(
            total in 1u32..=7200,
            a in 0i64..=100_000,
            b in 0i64..=100_000,
        ) {
            let state = sample(total);
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            let r_early = state.remaining_seconds_at(state.start_date + Duration::seconds(early));
            let r_late = state.remaining_seconds_at(state.start_date + Duration::seconds(late));
            prop_assert!(r_late <= r_early);
        }
    }
}
