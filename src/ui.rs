//! Dashboard rendering

use crate::constants::audio::MIN_DB_LEVEL;
use crate::state::AppState;
use crate::types::ControllerState;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Fraction of the meter covered by `db`
pub fn meter_ratio(db: f32) -> f64 {
    ((db - MIN_DB_LEVEL) / -MIN_DB_LEVEL).clamp(0.0, 1.0) as f64
}

fn zone_color(i: usize, width: usize) -> Color {
    if i < width / 3 {
        Color::Green
    } else if i < 2 * width / 3 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Create a gradient bar showing audio levels
pub fn create_gradient_bar(width: usize, ratio: f64) -> Line<'static> {
    let filled = (ratio * width as f64) as usize;
    let partial_fill = (ratio * width as f64) - filled as f64;
    let mut spans = Vec::with_capacity(width);

    for i in 0..width {
        let ch = if i < filled {
            '█'
        } else if i == filled && partial_fill > 0.0 {
            match (partial_fill * 8.0) as usize {
                0..=1 => '░',
                2..=3 => '▒',
                4..=5 => '▓',
                _ => '█',
            }
        } else {
            '░'
        };
        spans.push(Span::styled(ch.to_string(), Style::default().fg(zone_color(i, width))));
    }

    Line::from(spans)
}

/// Scale labels with a marker under the target loudness
pub fn create_db_labels(width: usize, target_db: f32) -> Line<'static> {
    let mut spans = Vec::with_capacity(width);
    let target_pos = (meter_ratio(target_db) * width.saturating_sub(1) as f64).round() as usize;

    for i in 0..width {
        if i == target_pos {
            spans.push(Span::styled("▲".to_string(), Style::default().fg(Color::White)));
            continue;
        }

        let label = if i == 0 {
            "-60"
        } else if i == width - 1 {
            "0"
        } else if i == width / 3 {
            "-40"
        } else if i == 2 * width / 3 {
            "-20"
        } else {
            " "
        };
        spans.push(Span::styled(label.to_string(), Style::default().fg(zone_color(i, width))));
    }

    Line::from(spans)
}

fn state_color(state: ControllerState) -> Color {
    match state {
        ControllerState::InRange => Color::Green,
        ControllerState::TooLoud | ControllerState::TooQuiet => Color::Yellow,
        ControllerState::Error => Color::Red,
        ControllerState::Paused | ControllerState::Idle => Color::Gray,
    }
}

/// Status text, replaced by the last amplifier failure while one is pending
pub fn status_line(state: &AppState) -> Line<'static> {
    match &state.last_error {
        Some(message) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))),
        None => Line::from(state.status.clone()),
    }
}

/// Render the complete UI
pub fn render_ui(f: &mut Frame, state: &AppState) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(4),
        ])
        .split(size);

    let device_block = Block::default().title("Device").borders(Borders::ALL);
    let device_text = Paragraph::new(state.device_name.as_str()).block(device_block);
    f.render_widget(device_text, chunks[0]);

    let status_block = Block::default().title("Status").borders(Borders::ALL);
    let status_text = Paragraph::new(status_line(state)).block(status_block);
    f.render_widget(status_text, chunks[1]);

    let controller_lines = vec![
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(
                state.controller_state.to_string(),
                Style::default()
                    .fg(state_color(state.controller_state))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(format!("Last action: {}", state.last_action)),
        Line::from(format!("Amplifier: {}", state.amplifier_status)),
        Line::from(if state.in_quiet_hours {
            "Quiet hours: active"
        } else {
            "Quiet hours: off"
        }),
    ];
    let controller_text = Paragraph::new(controller_lines)
        .block(Block::default().title("Controller").borders(Borders::ALL));
    f.render_widget(controller_text, chunks[2]);

    let bar_width = (chunks[3].width as usize).saturating_sub(crate::constants::ui::BAR_BORDER_WIDTH);
    let bar_line = create_gradient_bar(bar_width, meter_ratio(state.smoothed_db));
    let label_line = create_db_labels(bar_width, state.target_db);
    let gauge = Paragraph::new(vec![bar_line, label_line]).block(
        Block::default()
            .title(format!(
                "Loudness: {:.1} dB (Raw: {:.1}, Target: {:.1})",
                state.smoothed_db, state.raw_db, state.target_db
            ))
            .borders(Borders::ALL),
    );
    f.render_widget(gauge, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_ratio_bounds() {
        assert_eq!(meter_ratio(-90.0), 0.0);
        assert_eq!(meter_ratio(10.0), 1.0);
        assert!((meter_ratio(-30.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bar_and_labels_fill_width() {
        assert_eq!(create_gradient_bar(30, 0.42).spans.len(), 30);
        let labels = create_db_labels(30, -25.0);
        assert_eq!(labels.spans.len(), 30);
        assert!(labels.spans.iter().any(|s| s.content == "▲"));
        assert!(create_db_labels(0, -25.0).spans.is_empty());
    }

    #[test]
    fn test_status_shows_amplifier_failure() {
        let mut state = AppState::new("Test Mic".to_string(), -25.0);
        assert_eq!(status_line(&state).spans[0].content, state.status.as_str());

        state.last_error = Some("Amplifier error: device unreachable".to_string());
        let line = status_line(&state);
        assert_eq!(line.spans[0].content, "Amplifier error: device unreachable");
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
    }
}
