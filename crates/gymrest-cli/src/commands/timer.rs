use clap::Subcommand;
use uuid::Uuid;

use gymrest_core::{
    Config, ControllerOptions, FileLiveActivityChannel, FileNotificationOutbox, FileSnapshotStore,
    RecoveryOutcome, RestTimerController, StartRest,
};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a rest period (replaces any active timer)
    Start {
        /// Rest duration in seconds (default: config timer.default_rest_seconds)
        #[arg(long)]
        seconds: Option<u32>,
        /// Owning workout id (default: random)
        #[arg(long)]
        workout_id: Option<Uuid>,
        /// Workout name for display
        #[arg(long, default_value = "Workout")]
        workout_name: String,
        /// 0-based exercise position
        #[arg(long, default_value = "0")]
        exercise: u32,
        /// 0-based set position
        #[arg(long, default_value = "0")]
        set: u32,
        /// Current exercise name (live activity display)
        #[arg(long)]
        current_exercise: Option<String>,
        /// Next exercise name (live activity preview)
        #[arg(long)]
        next_exercise: Option<String>,
    },
    /// Pause the running timer
    Pause,
    /// Resume a paused timer
    Resume,
    /// Add seconds to the timer (negative values shorten it)
    Add {
        #[arg(allow_hyphen_values = true)]
        seconds: i64,
    },
    /// Set the remaining time outright
    Set {
        remaining: u32,
        /// New total duration (default: keeps at least the old total)
        #[arg(long)]
        total: Option<u32>,
    },
    /// Record a heart-rate reading in BPM
    HeartRate { bpm: u32 },
    /// Acknowledge an expired timer
    Ack,
    /// Stop and discard the timer
    Stop,
    /// Print current timer state as JSON
    Status,
}

fn open_controller(config: &Config) -> Result<RestTimerController, Box<dyn std::error::Error>> {
    let store = FileSnapshotStore::open()?;
    let outbox = FileNotificationOutbox::open()?;
    let channel = FileLiveActivityChannel::open()?;
    let mut controller = RestTimerController::with_options(
        Box::new(store),
        Box::new(outbox),
        Box::new(channel),
        ControllerOptions::from(config),
    );

    // Recovery runs before any read, once per process.
    let outcome = controller.restore()?;
    if let RecoveryOutcome::ExpiredWhileAway(state) = &outcome {
        eprintln!(
            "rest ended while away during '{}'; acknowledge with `timer ack`",
            state.workout_name
        );
    }
    Ok(controller)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut controller = open_controller(&config)?;

    match action {
        TimerAction::Start {
            seconds,
            workout_id,
            workout_name,
            exercise,
            set,
            current_exercise,
            next_exercise,
        } => {
            let snapshot = controller.start(StartRest {
                workout_id: workout_id.unwrap_or_else(Uuid::new_v4),
                workout_name,
                exercise_index: exercise,
                set_index: set,
                total_seconds: seconds.unwrap_or(config.timer.default_rest_seconds),
                current_exercise_name: current_exercise,
                next_exercise_name: next_exercise,
            })?;
            print_json(&snapshot)?;
        }
        TimerAction::Pause => {
            let snapshot = controller.pause()?;
            print_json(&snapshot)?;
        }
        TimerAction::Resume => {
            let snapshot = controller.resume()?;
            print_json(&snapshot)?;
        }
        TimerAction::Add { seconds } => {
            let snapshot = controller.extend(seconds)?;
            print_json(&snapshot)?;
        }
        TimerAction::Set { remaining, total } => {
            let snapshot = controller.set_rest(remaining, total)?;
            print_json(&snapshot)?;
        }
        TimerAction::HeartRate { bpm } => {
            let snapshot = controller.update_heart_rate(bpm)?;
            print_json(&snapshot)?;
        }
        TimerAction::Ack => {
            let snapshot = controller.acknowledge()?;
            print_json(&snapshot)?;
        }
        TimerAction::Stop => {
            controller.stop()?;
            println!("{{\"type\": \"timer_stopped\"}}");
        }
        TimerAction::Status => match controller.current_snapshot()? {
            Some(snapshot) => print_json(&snapshot)?,
            None => println!("{{\"type\": \"no_active_timer\"}}"),
        },
    }

    Ok(())
}
