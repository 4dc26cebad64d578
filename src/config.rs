//! Configuration parsing and validation

use crate::clock::parse_minute_of_day;
use crate::constants::audio::{DEFAULT_SILENCE_THRESHOLD_DB, SILENCE_FLOOR_DB};
use crate::error::{AppError, AppResult};
use crate::types::{BehaviorConfig, OperationMode, Profile, QuietHoursConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command line arguments for the simmer application
#[derive(Parser)]
#[command(name = "simmer")]
#[command(about = "Keeps an amplifier at a steady perceived loudness")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Listen to the room and drive the amplifier volume
    Monitor(MonitorArgs),
    /// Run a recorded loudness trace through the controller
    Replay(ReplayArgs),
    /// List available audio input devices
    List(ListArgs),
}

#[derive(Parser)]
pub struct MonitorArgs {
    /// Audio input device name (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<String>,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

#[derive(Parser)]
pub struct ReplayArgs {
    /// Trace with one `timestamp_ms level_db` pair per line, `-` for stdin
    pub file: PathBuf,

    /// Local time the replay pretends it is, for quiet hours (HH:MM)
    #[arg(long, value_parser = parse_minute_of_day)]
    pub at: Option<u16>,

    /// Print only the actions, without timestamps or states
    #[arg(long)]
    pub quiet: bool,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

#[derive(Parser)]
pub struct ListArgs {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Adjust the volume automatically
    Auto,
    /// Adjust the volume, intended for supervised use
    SemiAuto,
    /// Observe and report only
    LoggingOnly,
}

impl From<ModeArg> for OperationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => OperationMode::Auto,
            ModeArg::SemiAuto => OperationMode::SemiAuto,
            ModeArg::LoggingOnly => OperationMode::LoggingOnly,
        }
    }
}

/// Profile and behavior settings shared by `monitor` and `replay`
#[derive(clap::Args, Debug, Clone)]
pub struct TuningArgs {
    /// Name shown for the active profile
    #[arg(long, default_value = "Default Movie")]
    pub profile_name: String,

    /// Target room loudness in dB
    #[arg(long, default_value_t = -25.0, allow_hyphen_values = true)]
    pub target: f32,

    /// Milliseconds per dB when raising the volume
    #[arg(long, default_value_t = 300)]
    pub attack: u32,

    /// Milliseconds per dB when lowering the volume
    #[arg(long, default_value_t = 1500)]
    pub release: u32,

    /// Loudness smoothing window in milliseconds
    #[arg(long, default_value_t = 800)]
    pub smoothing: u64,

    /// Lowest volume the controller may set, in dB
    #[arg(long, default_value_t = -50.0, allow_hyphen_values = true)]
    pub volume_min: f32,

    /// Highest volume the controller may set, in dB
    #[arg(long, default_value_t = -15.0, allow_hyphen_values = true)]
    pub volume_max: f32,

    /// How much control the session takes
    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Level below which the room counts as silent, in dB
    #[arg(long, default_value_t = DEFAULT_SILENCE_THRESHOLD_DB, allow_hyphen_values = true)]
    pub silence_threshold: f32,

    /// How long the room must stay below the threshold to be silent, in ms (0 disables)
    #[arg(long, default_value_t = 60_000)]
    pub silence_timeout: u64,

    /// Keep tracking the target while the room is silent
    #[arg(long)]
    pub no_auto_idle: bool,

    /// Do not drop to the idle-safe volume when the room goes silent
    #[arg(long)]
    pub no_fade: bool,

    /// Volume set when the room goes silent, in dB
    #[arg(long, default_value_t = -40.0, allow_hyphen_values = true)]
    pub idle_safe: f32,

    /// Send volume commands even when the amplifier is in standby
    #[arg(long)]
    pub ignore_power_state: bool,

    /// Absolute volume ceiling, in dB
    #[arg(long, default_value_t = -12.0, allow_hyphen_values = true)]
    pub global_max: f32,

    /// Enable the night-time volume cap
    #[arg(long)]
    pub quiet_hours: bool,

    /// Quiet hours start (HH:MM)
    #[arg(long, default_value = "23:00", value_parser = parse_minute_of_day)]
    pub quiet_start: u16,

    /// Quiet hours end (HH:MM)
    #[arg(long, default_value = "07:00", value_parser = parse_minute_of_day)]
    pub quiet_end: u16,

    /// Volume ceiling during quiet hours, in dB
    #[arg(long, default_value_t = -25.0, allow_hyphen_values = true)]
    pub night_max: f32,
}

/// Session configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: Profile,
    pub behavior: BehaviorConfig,
    pub silence_threshold_db: f32,
    pub device_name: Option<String>,
}

impl Config {
    /// Create configuration from monitor arguments
    pub fn from_monitor_args(monitor_args: MonitorArgs) -> AppResult<Self> {
        let mut config = Self::from_tuning(&monitor_args.tuning)?;
        config.device_name = monitor_args.device;
        Ok(config)
    }

    /// Create configuration from replay arguments
    pub fn from_replay_args(replay_args: &ReplayArgs) -> AppResult<Self> {
        Self::from_tuning(&replay_args.tuning)
    }

    fn from_tuning(tuning: &TuningArgs) -> AppResult<Self> {
        let levels = [
            ("target", tuning.target),
            ("volume-min", tuning.volume_min),
            ("volume-max", tuning.volume_max),
            ("silence-threshold", tuning.silence_threshold),
            ("idle-safe", tuning.idle_safe),
            ("global-max", tuning.global_max),
            ("night-max", tuning.night_max),
        ];
        if let Some((name, value)) = levels.iter().find(|(_, value)| !value.is_finite()) {
            return Err(AppError::Config(format!("{} must be a finite level, got {}", name, value)));
        }

        if tuning.volume_min >= tuning.volume_max {
            return Err(AppError::Config(format!(
                "Minimum volume must be below maximum volume, got {} and {}",
                tuning.volume_min, tuning.volume_max
            )));
        }

        if tuning.silence_threshold > 0.0 || tuning.silence_threshold < SILENCE_FLOOR_DB {
            return Err(AppError::Config(format!(
                "Silence threshold must be between {} and 0 dB, got {}",
                SILENCE_FLOOR_DB, tuning.silence_threshold
            )));
        }

        let profile = Profile {
            name: tuning.profile_name.clone(),
            target_loudness_db: tuning.target,
            attack_speed_ms: tuning.attack,
            release_speed_ms: tuning.release,
            smoothing_window_ms: tuning.smoothing,
            volume_min_db: tuning.volume_min,
            volume_max_db: tuning.volume_max,
        };

        let behavior = BehaviorConfig {
            operation_mode: tuning.mode.into(),
            silence_timeout_ms: tuning.silence_timeout,
            auto_idle_enabled: !tuning.no_auto_idle,
            fade_to_safe_on_idle: !tuning.no_fade,
            idle_safe_volume_db: tuning.idle_safe,
            respect_amplifier_power_state: !tuning.ignore_power_state,
            global_max_volume_db: tuning.global_max,
            quiet_hours: QuietHoursConfig {
                enabled: tuning.quiet_hours,
                start_minutes: tuning.quiet_start,
                end_minutes: tuning.quiet_end,
                night_volume_max_db: tuning.night_max,
            },
        };

        Ok(Config {
            profile,
            behavior,
            silence_threshold_db: tuning.silence_threshold,
            device_name: None,
        })
    }
}
