//! Notification scheduling contract.
//!
//! The core does not deliver notifications; it hands the platform transport
//! exactly one pending request timed to the snapshot's absolute expiry.
//! Scheduling is idempotent per timer: a new request for the same timer
//! replaces any pending one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::SyncError;
use crate::timer::RestTimerState;

/// A pending end-of-rest notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    /// Timer this request belongs to; replaces any prior request.
    pub timer_id: Uuid,
    pub workout_id: Uuid,
    pub workout_name: String,
    /// Absolute fire time. Never in the past: expiry observed late fires now.
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

impl NotificationRequest {
    /// Builds the end-of-rest request for a snapshot.
    pub fn for_state(state: &RestTimerState, now: DateTime<Utc>) -> Self {
        let body = if let Some(next) = &state.next_exercise_name {
            format!("Weiter geht's mit: {next}")
        } else if let Some(current) = &state.current_exercise_name {
            format!("Weiter geht's mit: {current}")
        } else {
            "Weiter geht's!".to_string()
        };
        Self {
            timer_id: state.id,
            workout_id: state.workout_id,
            workout_name: state.workout_name.clone(),
            fire_at: state.end_date.max(now),
            title: "Pause beendet".to_string(),
            body,
        }
    }
}

/// Scheduling contract with the platform notification transport.
///
/// `schedule` must be idempotent: called again with a new `fire_at` it
/// cancels any prior pending notification for the same timer and schedules
/// exactly one new one. A paused timer cancels instead.
pub trait NotificationScheduler {
    fn schedule(&self, request: &NotificationRequest) -> Result<(), SyncError>;
    fn cancel(&self) -> Result<(), SyncError>;
}

/// Single-slot file outbox the out-of-process transport polls.
///
/// Writing the slot replaces whatever was pending, which gives the
/// idempotence the contract asks for.
pub struct FileNotificationOutbox {
    path: PathBuf,
}

impl FileNotificationOutbox {
    pub fn open() -> Result<Self, SyncError> {
        let dir = crate::storage::data_dir()
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;
        Ok(Self {
            path: dir.join("pending_notification.json"),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the currently pending request, if any.
    pub fn pending(&self) -> Result<Option<NotificationRequest>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}

impl NotificationScheduler for FileNotificationOutbox {
    fn schedule(&self, request: &NotificationRequest) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(request)?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn cancel(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}

/// Scheduler that drops everything. Useful when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScheduler;

impl NotificationScheduler for NullScheduler {
    fn schedule(&self, _request: &NotificationRequest) -> Result<(), SyncError> {
        Ok(())
    }

    fn cancel(&self) -> Result<(), SyncError> {
        Ok(())
    }
}
