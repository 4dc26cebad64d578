//! Room-loudness driven amplifier volume control.
//!
//! [`smoothing::LoudnessFilter`] turns raw microphone levels into a stable
//! reading and a silence flag; [`controller::VolumeController`] turns that
//! reading into at most one [`types::VolumeAction`] per sample. Neither does
//! any I/O. The remaining modules capture audio, talk to the amplifier and
//! draw the terminal dashboard.

pub mod amplifier;
pub mod app;
pub mod audio;
pub mod clock;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod replay;
pub mod smoothing;
pub mod state;
pub mod types;
pub mod ui;
