mod live_activity;
mod scheduler;

pub use live_activity::{FileLiveActivityChannel, LiveActivitySink, NullSink, TimerProjection};
pub use scheduler::{FileNotificationOutbox, NotificationRequest, NotificationScheduler, NullScheduler};
