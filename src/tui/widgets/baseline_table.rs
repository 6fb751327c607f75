use crate::tui::app::App;
use crate::tui::widgets::deviation_chart::deviation_color;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

/// Render the learned baselines with the latest live reading per AP
pub fn render_baseline_table(frame: &mut Frame, area: Rect, app: &App, focused: bool) {
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .title(format!(" Baseline [{} APs] ", app.baselines.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let header_cells = ["BSSID", "Mean", "Std", "Samples", "Live", "Dev"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .baselines
        .iter()
        .map(|row| {
            let live = row
                .last_rssi
                .map(|s| format!("{}dBm", s))
                .unwrap_or_else(|| "gone".to_string());
            let live_color = if row.last_rssi.is_some() { Color::White } else { Color::Magenta };

            let (deviation, deviation_style) = match row.last_deviation {
                Some(d) => (format!("{:.2}", d), Style::default().fg(deviation_color(d))),
                None => ("-".to_string(), Style::default().fg(Color::DarkGray)),
            };

            Row::new(vec![
                Cell::from(row.bssid.clone()),
                Cell::from(format!("{:.1}", row.mean)),
                Cell::from(format!("{:.2}", row.stddev)),
                Cell::from(row.samples.to_string()),
                Cell::from(live).style(Style::default().fg(live_color)),
                Cell::from(deviation).style(deviation_style),
            ])
            .height(1)
        })
        .collect();

    let widths = [
        Constraint::Length(17), // BSSID
        Constraint::Length(7),  // Mean
        Constraint::Length(6),  // Std
        Constraint::Length(8),  // Samples
        Constraint::Length(8),  // Live
        Constraint::Min(6),     // Dev
    ];

    let mut table = Table::new(rows, widths).header(header).block(block);
    if focused {
        table = table.row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    }

    let mut state = TableState::default();
    if !app.baselines.is_empty() {
        state.select(Some(app.selected_baseline));
    }

    frame.render_stateful_widget(table, area, &mut state);
}
