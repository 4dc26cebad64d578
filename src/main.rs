use clap::Parser;
use dialoguer::{Select, theme::ColorfulTheme};
use log::{error, info};
use simmer::app::{self, ExitCode};
use simmer::clock::{FixedClock, LocalClock, Clock};
use simmer::config::{Args, Commands, Config, ReplayArgs};
use simmer::controller::VolumeController;
use simmer::error::AppResult;
use simmer::replay;
use simmer::types::VolumeAction;
use std::fs::File;
use std::io::{self, BufReader};

const LOG_FILE_NAME: &str = "simmer.log";

fn list_devices() -> AppResult<()> {
    let device_list = simmer::audio::input_device_names()?;

    if device_list.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    // Interactive selection
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select an audio input device")
        .items(&device_list)
        .default(0)
        .interact()?;

    println!("{}", device_list[selection]);

    Ok(())
}

fn replay_trace(replay_args: &ReplayArgs) -> AppResult<()> {
    let config = Config::from_replay_args(replay_args)?;

    let samples = if replay_args.file.as_os_str() == "-" {
        replay::parse_trace(io::stdin().lock())?
    } else {
        replay::parse_trace(BufReader::new(File::open(&replay_args.file)?))?
    };
    info!("Replaying {} samples", samples.len());

    let minute = replay_args.at.unwrap_or_else(|| LocalClock.minute_of_day());
    let mut controller = VolumeController::with_clock(
        config.profile,
        config.behavior,
        config.silence_threshold_db,
        FixedClock(minute),
    );

    for step in replay::run_replay(&mut controller, &samples) {
        if replay_args.quiet {
            if step.action != VolumeAction::None {
                println!("{}", step.action);
            }
            continue;
        }
        let smoothed = step.metrics.map(|m| m.smoothed_db).unwrap_or(f32::NAN);
        println!(
            "{:>8} ms  {:>7.1} dB  {:<10} {}",
            step.timestamp_ms, smoothed, step.state, step.action
        );
    }

    Ok(())
}

/// The dashboard owns the terminal, so a monitoring session logs to a file
fn init_logger(command: &Commands) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Commands::Monitor(_) = command {
        let log_path = std::env::temp_dir().join(LOG_FILE_NAME);
        match File::create(&log_path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Logging disabled, cannot create {}: {}", log_path.display(), e);
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logger(&args.command);

    match args.command {
        Commands::Monitor(monitor_args) => {
            let config = match Config::from_monitor_args(monitor_args) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            };

            match app::App::new_with_config(config) {
                Ok(app) => {
                    let run_result = app.run().await;
                    match run_result.result {
                        Ok(_) => {
                            std::process::exit(run_result.exit_code as i32);
                        }
                        Err(e) => {
                            eprintln!("Application error: {}", e);
                            std::process::exit(ExitCode::Error as i32);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Setup error: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::Replay(replay_args) => {
            if let Err(e) = replay_trace(&replay_args) {
                error!("{}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
        Commands::List(_) => {
            if let Err(e) = list_devices() {
                error!("Error listing devices: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
    }
}
