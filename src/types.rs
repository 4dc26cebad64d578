//! Value types shared by the loudness filter, the controller and the
//! layers around them.

use std::fmt;

/// A listening profile. One is active per session and never changes while
/// a controller owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    /// Perceived loudness the room should sit at
    pub target_loudness_db: f32,
    /// Milliseconds per dB when raising the volume
    pub attack_speed_ms: u32,
    /// Milliseconds per dB when lowering the volume
    pub release_speed_ms: u32,
    /// Time constant of the loudness smoother
    pub smoothing_window_ms: u64,
    pub volume_min_db: f32,
    pub volume_max_db: f32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Default Movie".to_string(),
            target_loudness_db: -25.0,
            attack_speed_ms: 300,
            release_speed_ms: 1500,
            smoothing_window_ms: 800,
            volume_min_db: -50.0,
            volume_max_db: -15.0,
        }
    }
}

/// How much authority the controller has over the amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Auto,
    SemiAuto,
    LoggingOnly,
}

/// Night-time volume cap. Minutes are counted from local midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuietHoursConfig {
    pub enabled: bool,
    pub start_minutes: u16,
    pub end_minutes: u16,
    pub night_volume_max_db: f32,
}

impl QuietHoursConfig {
    /// Whether `minute_of_day` falls inside the window. A start after the
    /// end wraps through midnight; equal bounds describe an empty window.
    pub fn contains(&self, minute_of_day: u16) -> bool {
        let (start, end) = (self.start_minutes, self.end_minutes);
        if start == end {
            false
        } else if start < end {
            minute_of_day >= start && minute_of_day < end
        } else {
            minute_of_day >= start || minute_of_day < end
        }
    }
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_minutes: 23 * 60,
            end_minutes: 7 * 60,
            night_volume_max_db: -25.0,
        }
    }
}

/// Session-wide policy around the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorConfig {
    pub operation_mode: OperationMode,
    pub silence_timeout_ms: u64,
    pub auto_idle_enabled: bool,
    pub fade_to_safe_on_idle: bool,
    pub idle_safe_volume_db: f32,
    pub respect_amplifier_power_state: bool,
    pub global_max_volume_db: f32,
    pub quiet_hours: QuietHoursConfig,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::Auto,
            silence_timeout_ms: 60_000,
            auto_idle_enabled: true,
            fade_to_safe_on_idle: true,
            idle_safe_volume_db: -40.0,
            respect_amplifier_power_state: true,
            global_max_volume_db: -12.0,
            quiet_hours: QuietHoursConfig::default(),
        }
    }
}

/// Output of the loudness filter for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessMetrics {
    /// Instantaneous reading exactly as received, even when not finite
    pub rms_db: f32,
    pub smoothed_db: f32,
    pub is_silent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    InRange,
    TooLoud,
    TooQuiet,
    Paused,
    Error,
    Idle,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ControllerState::InRange => "in range",
            ControllerState::TooLoud => "too loud",
            ControllerState::TooQuiet => "too quiet",
            ControllerState::Paused => "paused",
            ControllerState::Error => "error",
            ControllerState::Idle => "idle",
        };
        f.pad(label)
    }
}

/// What the amplifier should do after a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeAction {
    None,
    /// Relative change; positive raises the volume
    Nudge { delta_db: f32 },
    /// Absolute volume, already clamped to every active bound
    SetVolume { target_db: f32 },
}

impl fmt::Display for VolumeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeAction::None => write!(f, "none"),
            VolumeAction::Nudge { delta_db } => write!(f, "nudge {:+.2} dB", delta_db),
            VolumeAction::SetVolume { target_db } => write!(f, "set {:.1} dB", target_db),
        }
    }
}
