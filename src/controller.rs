//! Volume decision controller
//!
//! Turns smoothed loudness into at most one bounded volume action per
//! sample while tracking a discrete operating state. Overrides are checked
//! in a fixed order: manual pause, actuator error, logging-only mode, auto
//! idle, and finally target tracking.

use crate::clock::{Clock, LocalClock};
use crate::constants::controller::{
    ACTIVE_ARM_THRESHOLD_MS, BIG_MISMATCH_DB, ERROR_FAILURE_THRESHOLD, MAX_SINGLE_STEP_DB,
    TARGET_TOLERANCE_DB,
};
use crate::smoothing::LoudnessFilter;
use crate::types::{BehaviorConfig, ControllerState, LoudnessMetrics, OperationMode, Profile, VolumeAction};
use log::{debug, info, warn};

pub struct VolumeController<C: Clock = LocalClock> {
    profile: Profile,
    behavior: BehaviorConfig,
    filter: LoudnessFilter,
    clock: C,
    state: ControllerState,
    last_sample_ms: Option<u64>,
    idle_duration_ms: u64,
    active_duration_ms: u64,
    manual_pause: bool,
    last_metrics: Option<LoudnessMetrics>,
    has_faded_to_idle_safe: bool,
    consecutive_failures: u32,
}

impl VolumeController<LocalClock> {
    /// Create a controller that reads quiet hours from the local time
    pub fn new(profile: Profile, behavior: BehaviorConfig, silence_threshold_db: f32) -> Self {
        Self::with_clock(profile, behavior, silence_threshold_db, LocalClock)
    }
}

impl<C: Clock> VolumeController<C> {
    pub fn with_clock(profile: Profile, behavior: BehaviorConfig, silence_threshold_db: f32, clock: C) -> Self {
        let filter = LoudnessFilter::new(
            profile.smoothing_window_ms,
            silence_threshold_db,
            behavior.silence_timeout_ms,
        );
        Self {
            profile,
            behavior,
            filter,
            clock,
            state: ControllerState::Idle,
            last_sample_ms: None,
            idle_duration_ms: 0,
            active_duration_ms: 0,
            manual_pause: false,
            last_metrics: None,
            has_faded_to_idle_safe: false,
            consecutive_failures: 0,
        }
    }

    /// Smooth a raw reading and decide what to do with the volume
    pub fn on_sample(&mut self, raw_db: f32, timestamp_ms: u64) -> VolumeAction {
        let metrics = self.filter.process(raw_db, timestamp_ms);
        self.decide(metrics, timestamp_ms)
    }

    /// Decide from metrics produced by an external filter.
    pub fn decide(&mut self, metrics: LoudnessMetrics, timestamp_ms: u64) -> VolumeAction {
        let dt = self
            .last_sample_ms
            .map_or(0, |last| timestamp_ms.saturating_sub(last));
        self.last_sample_ms = Some(timestamp_ms);
        self.last_metrics = Some(metrics);

        if metrics.is_silent {
            self.idle_duration_ms = self.idle_duration_ms.saturating_add(dt);
            self.active_duration_ms = 0;
        } else {
            self.idle_duration_ms = 0;
            self.active_duration_ms = self.active_duration_ms.saturating_add(dt);
        }

        let in_quiet_hours = self.in_quiet_hours();

        if self.manual_pause {
            self.set_state(ControllerState::Paused);
            return VolumeAction::None;
        }
        if self.consecutive_failures >= ERROR_FAILURE_THRESHOLD {
            self.set_state(ControllerState::Error);
            return VolumeAction::None;
        }
        if self.behavior.operation_mode == OperationMode::LoggingOnly {
            self.set_state(ControllerState::InRange);
            return VolumeAction::None;
        }

        if let Some(action) = self.handle_auto_idle(&metrics, in_quiet_hours) {
            return action;
        }

        self.track_target(&metrics, dt, in_quiet_hours)
    }

    fn handle_auto_idle(&mut self, metrics: &LoudnessMetrics, in_quiet_hours: bool) -> Option<VolumeAction> {
        if !self.behavior.auto_idle_enabled {
            self.has_faded_to_idle_safe = false;
            return None;
        }

        if metrics.is_silent {
            let previously_active = self.state != ControllerState::Idle;
            self.set_state(ControllerState::Idle);
            if self.behavior.fade_to_safe_on_idle && previously_active && !self.has_faded_to_idle_safe {
                self.has_faded_to_idle_safe = true;
                let target_db = self.clamp_volume(self.behavior.idle_safe_volume_db, in_quiet_hours);
                info!("Room went silent, fading to {:.1} dB", target_db);
                return Some(VolumeAction::SetVolume { target_db });
            }
            return Some(VolumeAction::None);
        }

        let was_idle = self.state == ControllerState::Idle;
        self.has_faded_to_idle_safe = false;
        if was_idle && self.active_duration_ms < ACTIVE_ARM_THRESHOLD_MS {
            return Some(VolumeAction::None);
        }
        None
    }

    fn track_target(&mut self, metrics: &LoudnessMetrics, dt: u64, in_quiet_hours: bool) -> VolumeAction {
        let error_db = metrics.smoothed_db - self.profile.target_loudness_db;
        let abs_error = error_db.abs();

        if abs_error < TARGET_TOLERANCE_DB {
            self.set_state(ControllerState::InRange);
            return VolumeAction::None;
        }

        self.set_state(if error_db > 0.0 {
            ControllerState::TooLoud
        } else {
            ControllerState::TooQuiet
        });

        if abs_error >= BIG_MISMATCH_DB {
            let target_db = self.clamp_volume(self.profile.target_loudness_db, in_quiet_hours);
            info!("Loudness off by {:.1} dB, resetting volume to {:.1} dB", error_db, target_db);
            return VolumeAction::SetVolume { target_db };
        }

        let desired_delta_db = -error_db;
        let slope_ms_per_db = if desired_delta_db > 0.0 {
            self.profile.attack_speed_ms
        } else {
            self.profile.release_speed_ms
        };
        let step_from_slope = if slope_ms_per_db > 0 {
            (dt as f64 / slope_ms_per_db as f64) as f32
        } else {
            MAX_SINGLE_STEP_DB
        };
        let magnitude = abs_error.min(step_from_slope).min(MAX_SINGLE_STEP_DB);

        // Relative step; the absolute result is bounded by the amplifier
        VolumeAction::Nudge {
            delta_db: magnitude.copysign(desired_delta_db),
        }
    }

    /// Bound an absolute volume by the profile range, then the global
    /// maximum, then the night maximum when quiet hours apply.
    pub fn clamp_volume(&self, target_db: f32, in_quiet_hours: bool) -> f32 {
        let mut clamped = target_db
            .max(self.profile.volume_min_db)
            .min(self.profile.volume_max_db);
        clamped = clamped.min(self.behavior.global_max_volume_db);
        let quiet_hours = &self.behavior.quiet_hours;
        if in_quiet_hours && quiet_hours.enabled {
            clamped = clamped.min(quiet_hours.night_volume_max_db);
        }
        clamped
    }

    /// Whether the night cap currently applies
    pub fn in_quiet_hours(&self) -> bool {
        let quiet_hours = &self.behavior.quiet_hours;
        quiet_hours.enabled && quiet_hours.contains(self.clock.minute_of_day())
    }

    /// Feed back whether the amplifier applied the last action.
    pub fn report_action_outcome(&mut self, success: bool) {
        if success {
            if self.consecutive_failures >= ERROR_FAILURE_THRESHOLD {
                info!("Amplifier reachable again, resuming control");
            }
            self.consecutive_failures = 0;
            return;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures == ERROR_FAILURE_THRESHOLD {
            warn!(
                "Amplifier failed {} times in a row, suspending volume control",
                self.consecutive_failures
            );
        }
        if self.consecutive_failures >= ERROR_FAILURE_THRESHOLD && !self.manual_pause {
            self.set_state(ControllerState::Error);
        }
    }

    pub fn set_manual_pause(&mut self, paused: bool) {
        self.manual_pause = paused;
        if paused {
            self.set_state(ControllerState::Paused);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.manual_pause
    }

    pub fn current_state(&self) -> ControllerState {
        self.state
    }

    pub fn last_metrics(&self) -> Option<LoudnessMetrics> {
        self.last_metrics
    }

    /// How long the room has been silent
    pub fn idle_duration_ms(&self) -> u64 {
        self.idle_duration_ms
    }

    pub fn active_duration_ms(&self) -> u64 {
        self.active_duration_ms
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn behavior(&self) -> &BehaviorConfig {
        &self.behavior
    }

    fn set_state(&mut self, next: ControllerState) {
        if self.state != next {
            debug!("Controller state {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::types::QuietHoursConfig;

    const NOON: u16 = 12 * 60;

    fn profile() -> Profile {
        Profile {
            smoothing_window_ms: 0,
            ..Profile::default()
        }
    }

    fn behavior() -> BehaviorConfig {
        BehaviorConfig {
            auto_idle_enabled: false,
            ..BehaviorConfig::default()
        }
    }

    fn controller(profile: Profile, behavior: BehaviorConfig) -> VolumeController<FixedClock> {
        VolumeController::with_clock(profile, behavior, -60.0, FixedClock(NOON))
    }

    fn nudge_of(action: VolumeAction) -> f32 {
        match action {
            VolumeAction::Nudge { delta_db } => delta_db,
            other => panic!("expected a nudge, got {:?}", other),
        }
    }

    #[test]
    fn test_starts_idle_without_metrics() {
        let c = controller(profile(), behavior());
        assert_eq!(c.current_state(), ControllerState::Idle);
        assert!(c.last_metrics().is_none());
    }

    #[test]
    fn test_within_tolerance_is_in_range() {
        let mut c = controller(profile(), behavior());
        assert_eq!(c.on_sample(-26.0, 0), VolumeAction::None);
        assert_eq!(c.current_state(), ControllerState::InRange);

        let metrics = c.last_metrics().unwrap();
        assert_eq!(metrics.smoothed_db, -26.0);
        assert_eq!(metrics.rms_db, -26.0);
    }

    #[test]
    fn test_direction_of_error_sets_state() {
        let mut c = controller(profile(), behavior());
        c.on_sample(-23.0, 0);
        assert_eq!(c.current_state(), ControllerState::TooLoud);
        c.on_sample(-27.0, 100);
        assert_eq!(c.current_state(), ControllerState::TooQuiet);
    }

    #[test]
    fn test_big_mismatch_sets_clamped_target() {
        let mut c = controller(profile(), behavior());
        assert_eq!(c.on_sample(-10.0, 0), VolumeAction::SetVolume { target_db: -25.0 });
        assert_eq!(c.current_state(), ControllerState::TooLoud);

        // Target above every bound lands on the tightest one
        let mut c = controller(
            Profile {
                target_loudness_db: -5.0,
                ..profile()
            },
            behavior(),
        );
        assert_eq!(c.on_sample(-40.0, 0), VolumeAction::SetVolume { target_db: -15.0 });
    }

    #[test]
    fn test_attack_step_is_rate_limited() {
        let mut c = controller(profile(), behavior());
        assert_eq!(nudge_of(c.on_sample(-30.0, 0)), 0.0);

        let step = nudge_of(c.on_sample(-30.0, 50));
        assert!((step - 50.0 / 300.0).abs() < 1e-4);
        assert!((step - 0.167).abs() < 1e-3);

        let step = nudge_of(c.on_sample(-30.0, 10_050));
        assert_eq!(step, 2.0);
    }

    #[test]
    fn test_release_step_is_negative() {
        let mut c = controller(profile(), behavior());
        c.on_sample(-20.0, 0);
        let step = nudge_of(c.on_sample(-20.0, 750));
        assert!((step + 0.5).abs() < 1e-4);
        let step = nudge_of(c.on_sample(-20.0, 10_000));
        assert_eq!(step, -2.0);
    }

    #[test]
    fn test_step_never_exceeds_remaining_error() {
        let mut c = controller(
            Profile {
                attack_speed_ms: 10,
                ..profile()
            },
            behavior(),
        );
        c.on_sample(-27.0, 0);
        let step = nudge_of(c.on_sample(-27.0, 1000));
        assert!((step - 2.0).abs() < 1e-4);

        c.on_sample(-26.6, 2000);
        let step = nudge_of(c.on_sample(-26.6, 3000));
        assert!((step - 1.6).abs() < 1e-4);
    }

    #[test]
    fn test_zero_slope_uses_step_ceiling() {
        let mut c = controller(
            Profile {
                attack_speed_ms: 0,
                ..profile()
            },
            behavior(),
        );
        assert_eq!(nudge_of(c.on_sample(-30.0, 0)), 2.0);
    }

    #[test]
    fn test_out_of_order_timestamp_is_zero_step() {
        let mut c = controller(profile(), behavior());
        c.on_sample(-30.0, 5000);
        assert_eq!(nudge_of(c.on_sample(-30.0, 4000)), 0.0);
    }

    #[test]
    fn test_manual_pause_wins() {
        let mut c = controller(profile(), behavior());
        c.on_sample(-25.0, 0);
        c.set_manual_pause(true);
        assert_eq!(c.current_state(), ControllerState::Paused);
        assert!(c.is_paused());

        for (i, level) in [0.0, -90.0, -10.0, -30.0].into_iter().enumerate() {
            assert_eq!(c.on_sample(level, 100 * (i as u64 + 1)), VolumeAction::None);
            assert_eq!(c.current_state(), ControllerState::Paused);
        }

        c.set_manual_pause(false);
        assert_eq!(c.current_state(), ControllerState::Paused);
        assert_eq!(c.on_sample(-10.0, 1000), VolumeAction::SetVolume { target_db: -25.0 });
        assert_eq!(c.current_state(), ControllerState::TooLoud);
    }

    #[test]
    fn test_logging_only_never_acts() {
        let mut c = controller(
            profile(),
            BehaviorConfig {
                operation_mode: OperationMode::LoggingOnly,
                ..behavior()
            },
        );
        assert_eq!(c.on_sample(-5.0, 0), VolumeAction::None);
        assert_eq!(c.current_state(), ControllerState::InRange);
        assert_eq!(c.on_sample(-40.0, 200), VolumeAction::None);
        assert!(c.last_metrics().is_some());
    }

    #[test]
    fn test_clamp_ordering() {
        let c = controller(
            Profile {
                volume_max_db: -15.0,
                ..profile()
            },
            BehaviorConfig {
                global_max_volume_db: -12.0,
                quiet_hours: QuietHoursConfig {
                    enabled: true,
                    night_volume_max_db: -25.0,
                    ..QuietHoursConfig::default()
                },
                ..behavior()
            },
        );
        assert_eq!(c.clamp_volume(-5.0, true), -25.0);
        assert_eq!(c.clamp_volume(-5.0, false), -15.0);
        assert_eq!(c.clamp_volume(-80.0, false), -50.0);
        assert_eq!(c.clamp_volume(-30.0, true), -30.0);
    }

    #[test]
    fn test_global_max_narrows_profile_range() {
        let c = controller(
            profile(),
            BehaviorConfig {
                global_max_volume_db: -20.0,
                ..behavior()
            },
        );
        assert_eq!(c.clamp_volume(-16.0, false), -20.0);
    }

    #[test]
    fn test_night_cap_ignored_when_disabled() {
        let c = controller(
            profile(),
            BehaviorConfig {
                quiet_hours: QuietHoursConfig {
                    enabled: false,
                    night_volume_max_db: -40.0,
                    ..QuietHoursConfig::default()
                },
                ..behavior()
            },
        );
        assert_eq!(c.clamp_volume(-20.0, true), -20.0);
    }

    #[test]
    fn test_quiet_hours_follow_clock() {
        let night_behavior = BehaviorConfig {
            quiet_hours: QuietHoursConfig {
                enabled: true,
                start_minutes: 23 * 60,
                end_minutes: 7 * 60,
                night_volume_max_db: -30.0,
            },
            ..behavior()
        };

        let mut night = VolumeController::with_clock(profile(), night_behavior.clone(), -60.0, FixedClock(2 * 60));
        assert!(night.in_quiet_hours());
        assert_eq!(night.on_sample(-5.0, 0), VolumeAction::SetVolume { target_db: -30.0 });

        let mut day = VolumeController::with_clock(profile(), night_behavior, -60.0, FixedClock(NOON));
        assert!(!day.in_quiet_hours());
        assert_eq!(day.on_sample(-5.0, 0), VolumeAction::SetVolume { target_db: -25.0 });
    }

    fn idle_behavior() -> BehaviorConfig {
        BehaviorConfig {
            auto_idle_enabled: true,
            fade_to_safe_on_idle: true,
            idle_safe_volume_db: -40.0,
            silence_timeout_ms: 1000,
            ..behavior()
        }
    }

    #[test]
    fn test_auto_idle_fades_once_and_rearms() {
        let mut c = controller(profile(), idle_behavior());

        // Fresh controller starts idle and waits for sound to persist
        for t in [0, 250, 500, 750] {
            assert_eq!(c.on_sample(-25.0, t), VolumeAction::None);
            assert_eq!(c.current_state(), ControllerState::Idle);
        }
        assert_eq!(c.on_sample(-25.0, 1000), VolumeAction::None);
        assert_eq!(c.current_state(), ControllerState::InRange);

        // Quiet but not yet silent long enough
        c.on_sample(-70.0, 1250);
        assert_eq!(c.current_state(), ControllerState::TooQuiet);
        c.on_sample(-70.0, 1500);
        c.on_sample(-70.0, 1750);

        assert_eq!(c.on_sample(-70.0, 2000), VolumeAction::SetVolume { target_db: -40.0 });
        assert_eq!(c.current_state(), ControllerState::Idle);
        assert_eq!(c.on_sample(-70.0, 2250), VolumeAction::None);
        assert_eq!(c.on_sample(-70.0, 2500), VolumeAction::None);
        assert_eq!(c.idle_duration_ms(), 750);

        // A short burst after waking is ignored
        assert_eq!(c.on_sample(-10.0, 2750), VolumeAction::None);
        assert_eq!(c.current_state(), ControllerState::Idle);
        assert_eq!(c.active_duration_ms(), 250);
        c.on_sample(-10.0, 3000);
        c.on_sample(-10.0, 3250);
        assert_eq!(c.on_sample(-10.0, 3750), VolumeAction::SetVolume { target_db: -25.0 });
        assert_eq!(c.current_state(), ControllerState::TooLoud);
    }

    #[test]
    fn test_idle_without_fade() {
        let mut c = controller(
            profile(),
            BehaviorConfig {
                fade_to_safe_on_idle: false,
                ..idle_behavior()
            },
        );
        c.on_sample(-70.0, 0);
        c.on_sample(-70.0, 500);
        assert_eq!(c.on_sample(-70.0, 1000), VolumeAction::None);
        assert_eq!(c.current_state(), ControllerState::Idle);
    }

    #[test]
    fn test_silence_without_auto_idle_keeps_tracking() {
        let mut c = controller(
            profile(),
            BehaviorConfig {
                silence_timeout_ms: 1000,
                ..behavior()
            },
        );
        c.on_sample(-70.0, 0);
        c.on_sample(-70.0, 1000);
        assert!(c.last_metrics().unwrap().is_silent);
        assert_eq!(c.current_state(), ControllerState::TooQuiet);
    }

    #[test]
    fn test_repeated_failures_enter_error() {
        let mut c = controller(profile(), behavior());
        c.on_sample(-10.0, 0);

        c.report_action_outcome(false);
        c.report_action_outcome(false);
        assert_eq!(c.current_state(), ControllerState::TooLoud);
        assert!(matches!(c.on_sample(-10.0, 200), VolumeAction::SetVolume { .. }));

        c.report_action_outcome(false);
        assert_eq!(c.current_state(), ControllerState::Error);
        assert_eq!(c.on_sample(-10.0, 400), VolumeAction::None);
        assert_eq!(c.current_state(), ControllerState::Error);

        c.set_manual_pause(true);
        c.on_sample(-10.0, 600);
        assert_eq!(c.current_state(), ControllerState::Paused);
        c.set_manual_pause(false);

        c.report_action_outcome(true);
        assert!(matches!(c.on_sample(-10.0, 800), VolumeAction::SetVolume { .. }));
        assert_eq!(c.current_state(), ControllerState::TooLoud);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut c = controller(profile(), behavior());
        c.report_action_outcome(false);
        c.report_action_outcome(false);
        c.report_action_outcome(true);
        c.report_action_outcome(false);
        c.report_action_outcome(false);
        assert!(matches!(c.on_sample(-10.0, 0), VolumeAction::SetVolume { .. }));
    }
}
