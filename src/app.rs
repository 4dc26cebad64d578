//! Monitoring session: microphone, controller, amplifier and dashboard

use crate::amplifier::{drive_sample, Amplifier, DispatchOutcome, SimulatedAmplifier};
use crate::audio;
use crate::config::Config;
use crate::constants::audio::{BUFFER_SIZE, SAMPLE_INTERVAL_MS};
use crate::controller::VolumeController;
use crate::error::{AppError, AppResult};
use crate::state::{AppState, SharedState};
use crate::types::VolumeAction;
use crate::ui;
use cpal::traits::StreamTrait;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::{Duration, Instant};

/// Main application struct
pub struct App {
    config: Config,
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
}

/// Exit codes for the application
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    UserExit = 1, // User pressed Escape or Ctrl+C
    Error = 2,    // Actual application error
}

/// Result type that includes user exit information
pub type AppRunResult = Result<(), AppError>;

/// Extended result that tracks exit reason
pub struct RunResult {
    pub result: AppRunResult,
    pub exit_code: ExitCode,
}

enum KeyCommand {
    Quit,
    TogglePause,
}

impl App {
    /// Initialize the application with configuration
    pub fn new_with_config(config: Config) -> AppResult<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(App { config, terminal })
    }

    /// Run the monitoring session until the user quits
    pub async fn run(mut self) -> RunResult {
        let result = self.session().await;
        let _ = self.cleanup(); // Ignore cleanup errors

        match result {
            Ok(exit_code) => RunResult {
                result: Ok(()),
                exit_code,
            },
            Err(e) => RunResult {
                result: Err(e),
                exit_code: ExitCode::Error,
            },
        }
    }

    async fn session(&mut self) -> AppResult<ExitCode> {
        let (device, audio_config) = audio::setup_audio_device(self.config.device_name.clone())?;

        let shared_state = SharedState::new();
        let audio_callback = audio::create_audio_callback(shared_state.capture_ref());
        let stream_config = cpal::StreamConfig {
            channels: audio_config.channels,
            sample_rate: cpal::SampleRate(audio_config.sample_rate),
            buffer_size: BUFFER_SIZE,
        };
        let stream = audio::build_audio_stream(&device, &stream_config, audio_callback)?;
        stream.play()?;

        let profile = self.config.profile.clone();
        let behavior = self.config.behavior.clone();
        info!(
            "Starting session with profile '{}', target {:.1} dB",
            profile.name, profile.target_loudness_db
        );

        let mut app_state = AppState::new(audio_config.device_name, profile.target_loudness_db);
        let mut controller = VolumeController::new(profile, behavior, self.config.silence_threshold_db);
        let mut amplifier = SimulatedAmplifier::new();

        let started = Instant::now();
        let mut interval = tokio::time::interval(Duration::from_millis(SAMPLE_INTERVAL_MS));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(ExitCode::UserExit);
                }
                _ = interval.tick() => {}
            }

            if let Some(raw_db) = shared_state.take_block_db() {
                let timestamp_ms = started.elapsed().as_millis() as u64;
                let (action, outcome) =
                    drive_sample(&mut controller, &mut amplifier, raw_db, timestamp_ms).await;
                match outcome {
                    DispatchOutcome::Applied => app_state.last_error = None,
                    DispatchOutcome::Failed(e) => app_state.last_error = Some(e.to_string()),
                    DispatchOutcome::Skipped => {}
                }

                if let Some(metrics) = controller.last_metrics() {
                    app_state.raw_db = metrics.rms_db;
                    app_state.smoothed_db = metrics.smoothed_db;
                }
                if action != VolumeAction::None {
                    app_state.last_action = action;
                }
            }
            app_state.controller_state = controller.current_state();
            app_state.in_quiet_hours = controller.in_quiet_hours();
            app_state.amplifier_status = amplifier.status_summary().await;

            self.terminal.draw(|f| ui::render_ui(f, &app_state))?;

            match poll_key_command() {
                Some(KeyCommand::Quit) => return Ok(ExitCode::UserExit),
                Some(KeyCommand::TogglePause) => {
                    let paused = !controller.is_paused();
                    controller.set_manual_pause(paused);
                    app_state.controller_state = controller.current_state();
                    info!("Manual pause {}", if paused { "on" } else { "off" });
                }
                None => {}
            }
        }
    }

    /// Clean up terminal state
    fn cleanup(&mut self) -> AppResult<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn poll_key_command() -> Option<KeyCommand> {
    if !crossterm::event::poll(Duration::from_millis(0)).unwrap_or(false) {
        return None;
    }
    match crossterm::event::read() {
        Ok(Event::Key(key_event)) => match key_event.code {
            KeyCode::Esc => Some(KeyCommand::Quit),
            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(KeyCommand::Quit)
            }
            KeyCode::Char('p') | KeyCode::Char('P') => Some(KeyCommand::TogglePause),
            _ => None,
        },
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to read terminal event: {}", e);
            None
        }
    }
}
