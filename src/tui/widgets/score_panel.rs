use crate::engine::Phase;
use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

/// Progress through the empty-room learning window
pub fn render_calibration_gauge(frame: &mut Frame, area: Rect, app: &App) {
    let (label, color) = match app.phase {
        Phase::Calibrating => (
            format!(
                "Calibrating: keep the room still ({} s left, {} APs)",
                app.calibration_remaining.as_secs(),
                app.emitters_seen
            ),
            Color::Yellow,
        ),
        Phase::Active => (
            format!("Calibrated: {} APs in baseline", app.baselines.len()),
            Color::Green,
        ),
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(" Calibration ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .ratio(app.calibration_progress())
        .label(label);

    frame.render_widget(gauge, area);
}

/// Render the aggregate score against the threshold
pub fn render_score_panel(frame: &mut Frame, area: Rect, app: &App) {
    let border_color = if app.alarm_active { Color::Red } else { Color::DarkGray };
    let block = Block::default()
        .title(" Score ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let state = match (&app.latest, app.phase) {
        (_, Phase::Calibrating) => {
            Span::styled("LEARNING", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        }
        (Some(a), Phase::Active) if a.alarm => Span::styled(
            " ALARM ",
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ),
        (Some(_), Phase::Active) => {
            Span::styled("quiet", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        }
        (None, Phase::Active) => Span::styled("waiting", Style::default().fg(Color::DarkGray)),
    };

    let total = app
        .latest
        .as_ref()
        .map(|a| format!("{:>8.2}", a.total_deviation))
        .unwrap_or_else(|| "     N/A".to_string());
    let total_color = match &app.latest {
        Some(a) if a.alarm => Color::Red,
        Some(a) if a.total_deviation > app.threshold * 0.5 => Color::Yellow,
        Some(_) => Color::Green,
        None => Color::DarkGray,
    };

    let (matched, missing) = app
        .latest
        .as_ref()
        .map(|a| (a.matched(), a.missing()))
        .unwrap_or((0, 0));

    let lines = vec![
        Line::from(vec![Span::styled("State:     ", Style::default().fg(Color::Yellow)), state]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Total:     ", Style::default().fg(Color::Yellow)),
            Span::styled(total, Style::default().fg(total_color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("Threshold: ", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{:>8.2}", app.threshold), Style::default().fg(Color::White)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Matched:   ", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{:>8}", matched), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::styled("Missing:   ", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{:>8}", missing), Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            Span::styled("Alarms:    ", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{:>8}", app.alarm_cycles), Style::default().fg(Color::Red)),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
