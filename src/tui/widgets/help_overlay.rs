use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEYS: [(&str, &str); 5] = [
    ("Tab / ← →", "Switch between events and baseline"),
    ("↑ ↓ / j k", "Scroll events / select AP"),
    ("?", "Toggle this help"),
    ("Esc", "Close this help"),
    ("q", "Quit"),
];

const LEGEND: [(&str, &str); 3] = [
    ("green", "within 1 stddev of baseline"),
    ("yellow", "within 2 stddev"),
    ("red / gone", "further out, or AP missing"),
];

fn section<'a>(title: &'a str, entries: &[(&'a str, &'a str)]) -> Vec<Line<'a>> {
    let mut lines = vec![Line::from(Span::styled(
        title,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))];
    lines.extend(entries.iter().map(|(key, description)| {
        Line::from(vec![
            Span::styled(format!("  {:<12} ", key), Style::default().fg(Color::Yellow)),
            Span::raw(*description),
        ])
    }));
    lines.push(Line::from(""));
    lines
}

/// Render the key and colour legend overlay
pub fn render_help(frame: &mut Frame, area: Rect) {
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = 16.min(area.height.saturating_sub(4));
    let popup_area = Rect::new(
        (area.width.saturating_sub(popup_width)) / 2,
        (area.height.saturating_sub(popup_height)) / 2,
        popup_width,
        popup_height,
    );

    frame.render_widget(Clear, popup_area);

    let mut text = section("Keys", &KEYS);
    text.extend(section("Deviation colours", &LEGEND));
    text.push(Line::from(Span::styled(
        "Press ? or Esc to close",
        Style::default().fg(Color::DarkGray),
    )));

    let popup = Paragraph::new(text).block(
        Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(popup, popup_area);
}
