//! Live-activity surface contract.
//!
//! The widget/live-activity extension runs in a separate process and renders
//! a read-only projection of the latest snapshot. Updates travel over a
//! one-way, best-effort channel; if the surface is unreachable the failure
//! is logged and dropped, the persisted snapshot stays authoritative. The
//! surface is never a second writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::SyncError;
use crate::timer::{Phase, RestTimerState};

/// Read-only projection of a snapshot for the widget surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerProjection {
    pub timer_id: Uuid,
    pub workout_name: String,
    pub phase: Phase,
    /// Absolute expiry; the surface can animate its own countdown from this.
    pub end_date: DateTime<Utc>,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_exercise_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_exercise_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_heart_rate: Option<u32>,
}

impl TimerProjection {
    pub fn from_state(state: &RestTimerState, now: DateTime<Utc>) -> Self {
        Self {
            timer_id: state.id,
            workout_name: state.workout_name.clone(),
            phase: state.phase,
            end_date: state.end_date,
            remaining_seconds: state.remaining_seconds_at(now),
            total_seconds: state.total_seconds,
            progress: state.progress_at(now),
            current_exercise_name: state.current_exercise_name.clone(),
            next_exercise_name: state.next_exercise_name.clone(),
            current_heart_rate: state.current_heart_rate,
        }
    }
}

/// One-way push channel to the live-activity surface.
pub trait LiveActivitySink {
    fn push(&self, projection: &TimerProjection) -> Result<(), SyncError>;
    /// Ends the activity (timer stopped or completed).
    fn end(&self) -> Result<(), SyncError>;
}

/// File channel in the shared data directory; the extension polls it.
pub struct FileLiveActivityChannel {
    path: PathBuf,
}

impl FileLiveActivityChannel {
    pub fn open() -> Result<Self, SyncError> {
        let dir = crate::storage::data_dir()
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;
        Ok(Self {
            path: dir.join("live_activity.json"),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Latest projection, if an activity is live.
    pub fn latest(&self) -> Result<Option<TimerProjection>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}

impl LiveActivitySink for FileLiveActivityChannel {
    fn push(&self, projection: &TimerProjection) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(projection)?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn end(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}

/// Sink that drops everything. Useful when the live activity is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LiveActivitySink for NullSink {
    fn push(&self, _projection: &TimerProjection) -> Result<(), SyncError> {
        Ok(())
    }

    fn end(&self) -> Result<(), SyncError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> RestTimerState {
        RestTimerState::create(Uuid::new_v4(), "Pull Day", 2, 1, 60, None, None)
    }

    #[test]
    fn projection_carries_derived_values() {
        let mut state = sample();
        state.current_heart_rate = Some(140);
        let now = state.start_date + Duration::seconds(15);
        let projection = TimerProjection::from_state(&state, now);
        assert_eq!(projection.remaining_seconds, 45);
        assert!((projection.progress - 0.25).abs() < 1e-9);
        assert_eq!(projection.phase, Phase::Running);
        assert_eq!(projection.current_heart_rate, Some(140));
        assert_eq!(projection.end_date, state.end_date);
    }

    #[test]
    fn channel_push_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileLiveActivityChannel::with_path(dir.path().join("live.json"));
        assert!(channel.latest().unwrap().is_none());

        let state = sample();
        let projection = TimerProjection::from_state(&state, Utc::now());
        channel.push(&projection).unwrap();
        assert_eq!(channel.latest().unwrap(), Some(projection));

        channel.end().unwrap();
        assert!(channel.latest().unwrap().is_none());
        // Ending twice is fine: best-effort channel.
        channel.end().unwrap();
    }
}
