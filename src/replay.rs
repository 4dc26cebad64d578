//! Offline replay of recorded loudness traces
//!
//! A trace holds one sample per line: a timestamp in milliseconds and a raw
//! level in dB, separated by whitespace or a comma. Blank lines and lines
//! starting with `#` are ignored.

use crate::clock::Clock;
use crate::controller::VolumeController;
use crate::error::{AppError, AppResult};
use crate::types::{ControllerState, LoudnessMetrics, VolumeAction};
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSample {
    pub timestamp_ms: u64,
    pub raw_db: f32,
}

/// One controller decision during a replay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStep {
    pub timestamp_ms: u64,
    pub metrics: Option<LoudnessMetrics>,
    pub state: ControllerState,
    pub action: VolumeAction,
}

pub fn parse_trace<R: BufRead>(reader: R) -> AppResult<Vec<TraceSample>> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }

        let mut fields = content
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty());
        let replay_error = |message: String| AppError::Replay {
            line: line_number,
            message,
        };

        let timestamp_ms = fields
            .next()
            .ok_or_else(|| replay_error("missing timestamp".to_string()))?
            .parse::<u64>()
            .map_err(|e| replay_error(format!("invalid timestamp: {}", e)))?;
        let raw_db = fields
            .next()
            .ok_or_else(|| replay_error("missing level".to_string()))?
            .parse::<f32>()
            .map_err(|e| replay_error(format!("invalid level: {}", e)))?;
        if fields.next().is_some() {
            return Err(replay_error("expected exactly two fields".to_string()));
        }

        samples.push(TraceSample { timestamp_ms, raw_db });
    }
    Ok(samples)
}

/// Feed every sample through the controller in order
pub fn run_replay<C: Clock>(controller: &mut VolumeController<C>, samples: &[TraceSample]) -> Vec<ReplayStep> {
    samples
        .iter()
        .map(|sample| {
            let action = controller.on_sample(sample.raw_db, sample.timestamp_ms);
            ReplayStep {
                timestamp_ms: sample.timestamp_ms,
                metrics: controller.last_metrics(),
                state: controller.current_state(),
                action,
            }
        })
        .collect()
}
