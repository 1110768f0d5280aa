//! Core error types for gymrest-core.
//!
//! Persistence failures on write are fatal to the triggering operation: the
//! caller is told the mutation may not survive a crash. Downstream sync
//! failures ([`SyncError`]) are logged and never propagate.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::Phase;

/// Core error type for rest timer operations.
#[derive(Error, Debug)]
pub enum TimerError {
    /// Operation requires a live snapshot, none present.
    #[error("no active rest timer")]
    NoActiveTimer,

    /// Operation is not legal from the current phase.
    #[error("cannot {operation} while timer is {from}")]
    InvalidPhaseTransition { from: Phase, operation: &'static str },

    /// Rejected input before it reached the snapshot.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// Snapshot slot read/write failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Persistence adapter errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("data directory unavailable: {0}")]
    DataDir(String),

    #[error("failed to read snapshot slot at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace snapshot slot at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downstream sync failure (notification reschedule, live-activity push).
///
/// Never fatal: the canonical snapshot stays authoritative, callers log and
/// move on.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Result type alias for TimerError.
pub type Result<T, E = TimerError> = std::result::Result<T, E>;
