use crate::engine::Phase;
use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the status bar at the bottom
pub fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let source = Span::styled(format!("Source: {}", app.source), Style::default().fg(Color::Cyan));

    let phase = if app.monitor_stopped {
        Span::styled(
            "STOPPED",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        match app.phase {
            Phase::Calibrating => Span::styled(
                "CALIBRATING",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Phase::Active => Span::styled(
                "ACTIVE",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        }
    };

    let failures_color = if app.scan_failures > 0 { Color::Yellow } else { Color::DarkGray };

    let status_line = Line::from(vec![
        Span::raw(" "),
        phase,
        Span::raw("  │  "),
        source,
        Span::raw("  │  "),
        Span::styled(format!("Cycles: {}", app.cycles), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(
            format!("Failed scans: {}", app.scan_failures),
            Style::default().fg(failures_color),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("Uptime: {}", format_duration(app.uptime_secs())),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(status_line).block(block), area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
