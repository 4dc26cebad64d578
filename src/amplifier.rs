//! Amplifier control and dispatch of volume actions
//!
//! The controller never talks to the amplifier itself. The session loop
//! hands each action to [`dispatch_action`] and feeds the outcome back.

use crate::clock::Clock;
use crate::constants::amplifier::{DEFAULT_INPUT, HARDWARE_MAX_DB, HARDWARE_MIN_DB, INITIAL_VOLUME_DB};
use crate::error::{AppError, AppResult};
use crate::controller::VolumeController;
use crate::types::{ControllerState, VolumeAction};
use log::{debug, warn};

/// Operations the session needs from an amplifier. Every call may fail,
/// e.g. when the device drops off the network.
#[allow(async_fn_in_trait)]
pub trait Amplifier {
    async fn current_volume_db(&mut self) -> AppResult<f32>;
    async fn set_volume_db(&mut self, target_db: f32) -> AppResult<()>;
    async fn nudge_volume(&mut self, delta_db: f32) -> AppResult<()>;
    async fn set_mute(&mut self, muted: bool) -> AppResult<()>;
    async fn power_on(&mut self) -> AppResult<()>;
    async fn power_off(&mut self) -> AppResult<()>;
    async fn select_input(&mut self, input_id: &str) -> AppResult<()>;
    async fn is_powered(&mut self) -> AppResult<bool>;
    async fn status_summary(&mut self) -> String;
}

/// In-memory amplifier used for dry runs and tests.
#[derive(Debug, Clone)]
pub struct SimulatedAmplifier {
    volume_db: f32,
    powered: bool,
    muted: bool,
    input: String,
    reachable: bool,
}

impl SimulatedAmplifier {
    pub fn new() -> Self {
        Self {
            volume_db: INITIAL_VOLUME_DB,
            powered: true,
            muted: false,
            input: DEFAULT_INPUT.to_string(),
            reachable: true,
        }
    }

    /// Simulate losing or regaining the connection
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    pub fn volume_db(&self) -> f32 {
        self.volume_db
    }

    fn connected(&self) -> AppResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(AppError::Amplifier("device unreachable".to_string()))
        }
    }

    fn ready(&self) -> AppResult<()> {
        self.connected()?;
        if self.powered {
            Ok(())
        } else {
            Err(AppError::Amplifier("device is powered off".to_string()))
        }
    }
}

impl Default for SimulatedAmplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Amplifier for SimulatedAmplifier {
    async fn current_volume_db(&mut self) -> AppResult<f32> {
        self.ready()?;
        Ok(self.volume_db)
    }

    async fn set_volume_db(&mut self, target_db: f32) -> AppResult<()> {
        self.ready()?;
        self.volume_db = target_db.clamp(HARDWARE_MIN_DB, HARDWARE_MAX_DB);
        Ok(())
    }

    async fn nudge_volume(&mut self, delta_db: f32) -> AppResult<()> {
        self.ready()?;
        self.volume_db = (self.volume_db + delta_db).clamp(HARDWARE_MIN_DB, HARDWARE_MAX_DB);
        Ok(())
    }

    async fn set_mute(&mut self, muted: bool) -> AppResult<()> {
        self.ready()?;
        self.muted = muted;
        Ok(())
    }

    async fn power_on(&mut self) -> AppResult<()> {
        self.connected()?;
        self.powered = true;
        Ok(())
    }

    async fn power_off(&mut self) -> AppResult<()> {
        self.connected()?;
        self.powered = false;
        Ok(())
    }

    async fn select_input(&mut self, input_id: &str) -> AppResult<()> {
        self.ready()?;
        self.input = input_id.to_string();
        Ok(())
    }

    async fn is_powered(&mut self) -> AppResult<bool> {
        self.connected()?;
        Ok(self.powered)
    }

    async fn status_summary(&mut self) -> String {
        if !self.reachable {
            return "Not connected".to_string();
        }
        if !self.powered {
            return "Standby".to_string();
        }
        format!(
            "{:.1} dB{} on {}",
            self.volume_db,
            if self.muted { " (muted)" } else { "" },
            self.input
        )
    }
}

/// Result of handing one action to the amplifier
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Nothing was sent
    Skipped,
    Applied,
    Failed(AppError),
}

impl DispatchOutcome {
    /// Success flag to report back to the controller, if anything was sent
    pub fn success(&self) -> Option<bool> {
        match self {
            DispatchOutcome::Skipped => None,
            DispatchOutcome::Applied => Some(true),
            DispatchOutcome::Failed(_) => Some(false),
        }
    }
}

/// Apply `action` to the amplifier. With `respect_power_state` an amplifier
/// in standby is left alone.
pub async fn dispatch_action<A: Amplifier>(
    amplifier: &mut A,
    action: VolumeAction,
    respect_power_state: bool,
) -> DispatchOutcome {
    match action {
        VolumeAction::None => return DispatchOutcome::Skipped,
        VolumeAction::Nudge { delta_db } if delta_db == 0.0 => return DispatchOutcome::Skipped,
        _ => {}
    }

    if respect_power_state {
        match amplifier.is_powered().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Amplifier in standby, skipping {}", action);
                return DispatchOutcome::Skipped;
            }
            Err(e) => return DispatchOutcome::Failed(e),
        }
    }

    let result = match action {
        VolumeAction::None => Ok(()),
        VolumeAction::Nudge { delta_db } => amplifier.nudge_volume(delta_db).await,
        VolumeAction::SetVolume { target_db } => amplifier.set_volume_db(target_db).await,
    };

    match result {
        Ok(()) => {
            debug!("Applied {}", action);
            DispatchOutcome::Applied
        }
        Err(e) => {
            warn!("Failed to apply {}: {}", action, e);
            DispatchOutcome::Failed(e)
        }
    }
}

/// One sample of the session loop: decide, actuate, report back.
///
/// Nothing is sent while the controller is in `Error`, so the link is
/// checked instead and the result reported as the outcome.
pub async fn drive_sample<A: Amplifier, C: Clock>(
    controller: &mut VolumeController<C>,
    amplifier: &mut A,
    raw_db: f32,
    timestamp_ms: u64,
) -> (VolumeAction, DispatchOutcome) {
    let respect_power_state = controller.behavior().respect_amplifier_power_state;
    let action = controller.on_sample(raw_db, timestamp_ms);
    let outcome = dispatch_action(amplifier, action, respect_power_state).await;

    match outcome.success() {
        Some(success) => controller.report_action_outcome(success),
        None if controller.current_state() == ControllerState::Error => {
            match amplifier.is_powered().await {
                Ok(_) => controller.report_action_outcome(true),
                Err(e) => {
                    debug!("Amplifier still unreachable: {}", e);
                    controller.report_action_outcome(false);
                }
            }
        }
        None => {}
    }

    (action, outcome)
}
