//! Application state management

use crate::smoothing::amplitude_to_db;
use crate::types::{ControllerState, VolumeAction};
use std::sync::{Arc, Mutex, MutexGuard};

/// Running sum of squares for the capture block in progress.
#[derive(Debug, Default)]
pub struct BlockAccumulator {
    sum_squares: f64,
    count: usize,
}

impl BlockAccumulator {
    /// Add interleaved samples from the audio callback
    pub fn push(&mut self, samples: &[f32]) {
        self.sum_squares += samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
        self.count += samples.len();
    }

    /// RMS level of everything pushed since the last take, in dBFS.
    /// Returns `None` when no audio arrived.
    pub fn take_rms_db(&mut self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        let rms = (self.sum_squares / self.count as f64).sqrt() as f32;
        *self = Self::default();
        Some(amplitude_to_db(rms))
    }
}

/// State shared between the audio callback and the session loop
pub struct SharedState {
    pub capture: Arc<Mutex<BlockAccumulator>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            capture: Arc::new(Mutex::new(BlockAccumulator::default())),
        }
    }

    /// Reference handed to the audio callback
    pub fn capture_ref(&self) -> Arc<Mutex<BlockAccumulator>> {
        Arc::clone(&self.capture)
    }

    /// Close the current block and return its level
    pub fn take_block_db(&self) -> Option<f32> {
        lock(&self.capture).take_rms_db()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock ignoring poisoning; the accumulator is valid after any panic.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the dashboard shows
pub struct AppState {
    pub device_name: String,
    pub raw_db: f32,
    pub smoothed_db: f32,
    pub target_db: f32,
    pub controller_state: ControllerState,
    pub last_action: VolumeAction,
    pub amplifier_status: String,
    pub in_quiet_hours: bool,
    pub status: String,
    /// Most recent amplifier failure, cleared by the next applied action
    pub last_error: Option<String>,
}

impl AppState {
    pub fn new(device_name: String, target_db: f32) -> Self {
        Self {
            device_name: device_name.clone(),
            raw_db: crate::constants::audio::MIN_DB_LEVEL,
            smoothed_db: crate::constants::audio::MIN_DB_LEVEL,
            target_db,
            controller_state: ControllerState::Idle,
            last_action: VolumeAction::None,
            amplifier_status: String::new(),
            in_quiet_hours: false,
            status: format!(
                "Listening on {}... P to pause, Esc or Ctrl+C to quit.",
                device_name
            ),
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::audio::SILENCE_FLOOR_DB;

    #[test]
    fn test_empty_block_has_no_level() {
        let mut block = BlockAccumulator::default();
        assert_eq!(block.take_rms_db(), None);
    }

    #[test]
    fn test_block_rms_spans_callbacks() {
        let mut block = BlockAccumulator::default();
        block.push(&[0.1, -0.1]);
        block.push(&[0.1, -0.1, 0.1]);
        let db = block.take_rms_db().unwrap();
        assert!((db + 20.0).abs() < 0.01);
        // Taking resets the block
        assert_eq!(block.take_rms_db(), None);
    }

    #[test]
    fn test_silent_block_hits_floor() {
        let shared = SharedState::new();
        lock(&shared.capture_ref()).push(&[0.0; 128]);
        assert_eq!(shared.take_block_db(), Some(SILENCE_FLOOR_DB));
    }
}
