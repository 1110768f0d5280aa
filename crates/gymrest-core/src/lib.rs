//! # GymRest Core Library
//!
//! Core business logic for the GymRest rest timer: the countdown that tracks
//! recovery time between exercise sets during a workout. All operations are
//! available through this library; the CLI binary is a thin layer over it,
//! and any GUI shell would be too.
//!
//! ## Architecture
//!
//! - **Timer**: a wall-clock-based snapshot model plus a controller. There is
//!   no ticking thread; every countdown value is derived from stored absolute
//!   timestamps and "now", which is what lets a timer survive process
//!   suspension, force quit and reboot.
//! - **Storage**: a single-slot JSON snapshot store shared with out-of-process
//!   consumers, and TOML-based configuration.
//! - **Recovery**: a reconciler that runs once per cold start and decides
//!   whether the persisted snapshot resumes, expires or gets discarded.
//! - **Notify**: the scheduling contract with the platform notification
//!   transport and the one-way push channel to the live-activity surface.
//!
//! ## Key Components
//!
//! - [`RestTimerState`]: the canonical snapshot
//! - [`RestTimerController`]: sole writer, mediates all phase transitions
//! - [`reconcile`]: cold-start recovery
//! - [`Config`]: application configuration

pub mod error;
pub mod notify;
pub mod storage;
pub mod timer;

pub use error::{Result, StoreError, SyncError, TimerError};
pub use notify::{
    FileLiveActivityChannel, FileNotificationOutbox, LiveActivitySink, NotificationRequest,
    NotificationScheduler, NullScheduler, NullSink, TimerProjection,
};
pub use storage::{Config, FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use timer::{
    reconcile, reconcile_at, ControllerOptions, Phase, RecoveryOutcome, RecoveryPolicy,
    RestTimerController, RestTimerState, StartRest,
};
