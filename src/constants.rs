//! Application constants and configuration values

/// Audio capture constants
pub mod audio {
    /// Floor reported for an all-zero capture block
    pub const SILENCE_FLOOR_DB: f32 = -120.0;
    /// Lowest level shown on the dashboard meter
    pub const MIN_DB_LEVEL: f32 = -60.0;
    /// Level below which the room counts as background noise
    pub const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -60.0;
    /// Length of one capture block fed to the controller
    pub const SAMPLE_INTERVAL_MS: u64 = 200;
    /// Preferred capture rate
    pub const PREFERRED_SAMPLE_RATE: u32 = 44_100;
    /// Channels requested from the input device
    pub const DEFAULT_CHANNELS: u16 = 1;
    /// Buffer size for audio streams
    pub const BUFFER_SIZE: cpal::BufferSize = cpal::BufferSize::Default;
}

/// Volume decision constants
pub mod controller {
    /// Errors smaller than this leave the volume alone
    pub const TARGET_TOLERANCE_DB: f32 = 1.5;
    /// Errors at or above this jump straight to the target
    pub const BIG_MISMATCH_DB: f32 = 8.0;
    /// Hard ceiling on a single nudge
    pub const MAX_SINGLE_STEP_DB: f32 = 2.0;
    /// Sound must persist this long after idle before the controller acts
    pub const ACTIVE_ARM_THRESHOLD_MS: u64 = 1000;
    /// Consecutive actuator failures before entering ERROR
    pub const ERROR_FAILURE_THRESHOLD: u32 = 3;
}

/// UI display constants
pub mod ui {
    /// Bar width calculation accounts for borders
    pub const BAR_BORDER_WIDTH: usize = 2;
}

/// Simulated amplifier constants
pub mod amplifier {
    /// Lowest volume the amplifier accepts
    pub const HARDWARE_MIN_DB: f32 = -80.0;
    /// Highest volume the amplifier accepts
    pub const HARDWARE_MAX_DB: f32 = 18.0;
    /// Volume the simulated amplifier powers up at
    pub const INITIAL_VOLUME_DB: f32 = -30.0;
    /// Input selected at power-up
    pub const DEFAULT_INPUT: &str = "TV";
}
