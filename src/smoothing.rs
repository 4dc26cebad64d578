//! Loudness smoothing, silence detection and level conversion

use crate::constants::audio::SILENCE_FLOOR_DB;
use crate::types::LoudnessMetrics;

/// Readings are kept inside this magnitude so the smoother stays finite.
const LEVEL_LIMIT_DB: f32 = 1000.0;

/// Time-aware exponential smoother with a silence detector.
///
/// The mixing coefficient is proportional to the time elapsed since the
/// previous sample, so irregular sample spacing does not change the
/// effective cutoff.
#[derive(Debug, Clone)]
pub struct LoudnessFilter {
    smoothing_window_ms: u64,
    silence_threshold_db: f32,
    silence_timeout_ms: u64,
    last_smoothed_db: Option<f32>,
    last_timestamp_ms: Option<u64>,
    below_threshold_ms: u64,
}

impl LoudnessFilter {
    pub fn new(smoothing_window_ms: u64, silence_threshold_db: f32, silence_timeout_ms: u64) -> Self {
        Self {
            smoothing_window_ms,
            silence_threshold_db,
            silence_timeout_ms,
            last_smoothed_db: None,
            last_timestamp_ms: None,
            below_threshold_ms: 0,
        }
    }

    /// Feed one raw reading. Timestamps that go backwards count as zero
    /// elapsed time.
    pub fn process(&mut self, raw_db: f32, timestamp_ms: u64) -> LoudnessMetrics {
        let level_db = sanitize_level(raw_db);
        let dt = self
            .last_timestamp_ms
            .map_or(0, |last| timestamp_ms.saturating_sub(last));

        let smoothed_db = match self.last_smoothed_db {
            None => level_db,
            Some(last_db) => {
                let alpha = if self.smoothing_window_ms == 0 {
                    1.0
                } else {
                    (dt as f64 / self.smoothing_window_ms as f64).clamp(0.0, 1.0) as f32
                };
                last_db + alpha * (level_db - last_db)
            }
        };

        self.last_smoothed_db = Some(smoothed_db);
        self.last_timestamp_ms = Some(timestamp_ms);

        if smoothed_db < self.silence_threshold_db {
            self.below_threshold_ms = self.below_threshold_ms.saturating_add(dt);
        } else {
            self.below_threshold_ms = 0;
        }

        let is_silent = self.silence_timeout_ms > 0 && self.below_threshold_ms >= self.silence_timeout_ms;

        LoudnessMetrics {
            rms_db: raw_db,
            smoothed_db,
            is_silent,
        }
    }
}

fn sanitize_level(raw_db: f32) -> f32 {
    if raw_db.is_nan() {
        SILENCE_FLOOR_DB
    } else {
        raw_db.clamp(-LEVEL_LIMIT_DB, LEVEL_LIMIT_DB)
    }
}

/// Convert linear amplitude to decibels relative to full scale
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        (20.0 * amplitude.log10()).max(SILENCE_FLOOR_DB)
    } else {
        SILENCE_FLOOR_DB
    }
}
