use crate::tui::app::{ActivePanel, App};
use crate::tui::widgets::{
    baseline_table::render_baseline_table,
    deviation_chart::render_deviation_chart,
    event_log::render_event_log,
    help_overlay::render_help,
    score_panel::{render_calibration_gauge, render_score_panel},
    status_bar::render_status_bar,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Main draw function for the TUI
pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(3),  // Calibration gauge
            Constraint::Min(10),    // Content
            Constraint::Length(3),  // Status bar
        ])
        .split(size);

    draw_header(frame, main_chunks[0], app);
    render_calibration_gauge(frame, main_chunks[1], app);

    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50), // Chart + score
            Constraint::Percentage(50), // Events + baseline
        ])
        .split(main_chunks[2]);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(content_chunks[0]);

    render_deviation_chart(frame, top_chunks[0], app);
    render_score_panel(frame, top_chunks[1], app);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(content_chunks[1]);

    render_event_log(
        frame,
        bottom_chunks[0],
        app,
        app.active_panel == ActivePanel::EventLog,
    );
    render_baseline_table(
        frame,
        bottom_chunks[1],
        app,
        app.active_panel == ActivePanel::BaselineTable,
    );

    render_status_bar(frame, main_chunks[3], app);

    if app.show_help {
        render_help(frame, size);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut title = vec![
        Span::styled(
            " STILLROOM ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled("Wi-Fi Presence Detector", Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled("[?] Help  [q] Quit", Style::default().fg(Color::DarkGray)),
    ];

    if app.alarm_active {
        title.push(Span::raw("   "));
        title.push(Span::styled(
            "<<<<<  ALARM  >>>>>",
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
        ));
    }

    let border_color = if app.alarm_active { Color::Red } else { Color::Cyan };
    let header = Paragraph::new(Line::from(title)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color)),
    );

    frame.render_widget(header, area);
}
