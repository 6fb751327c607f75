use crate::tui::app::{App, EventKind};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

/// Render the event log panel, newest at the bottom
pub fn render_event_log(frame: &mut Frame, area: Rect, app: &App, focused: bool) {
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let inner_height = area.height.saturating_sub(2) as usize;
    let total_entries = app.event_log.len();
    let start_idx = app.log_scroll;

    let entries: Vec<_> = app
        .event_log
        .iter()
        .rev()
        .skip(start_idx)
        .take(inner_height)
        .collect();

    let items: Vec<ListItem> = entries
        .iter()
        .rev()
        .map(|entry| {
            let timestamp = chrono::DateTime::from_timestamp(entry.timestamp, 0)
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "??:??:??".to_string());

            let message_style = match entry.kind {
                EventKind::Info => Style::default().fg(Color::White),
                EventKind::Warning => Style::default().fg(Color::Yellow),
                EventKind::Alarm => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", timestamp), Style::default().fg(Color::DarkGray)),
                Span::styled(entry.message.clone(), message_style),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);

    // Show scroll indicator if there are more entries
    if total_entries > inner_height {
        let scroll_info = format!(" {}/{} ", total_entries.saturating_sub(start_idx), total_entries);
        let scroll_len = scroll_info.len() as u16;
        let scroll_x = area.x + area.width.saturating_sub(scroll_len + 2);

        if scroll_x > area.x {
            frame.render_widget(
                Paragraph::new(scroll_info).style(Style::default().fg(Color::DarkGray)),
                Rect::new(scroll_x, area.y, scroll_len, 1),
            );
        }
    }
}
