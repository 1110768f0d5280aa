mod controller;
mod reconciler;
mod state;

pub use controller::{ControllerOptions, RestTimerController, StartRest};
pub use reconciler::{reconcile, reconcile_at, RecoveryOutcome, RecoveryPolicy};
pub use state::{Phase, RestTimerState};
