use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

// Bars carry integer heights; deviations are drawn in tenths
const SCALE: f64 = 10.0;

/// Green within one stddev, yellow within two, red beyond
pub fn deviation_color(deviation: f64) -> Color {
    if deviation <= 1.0 {
        Color::Green
    } else if deviation <= 2.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Render per-emitter deviations from the latest scan as a bar chart
pub fn render_deviation_chart(frame: &mut Frame, area: Rect, app: &App) {
    let tracked = app.latest.as_ref().map_or(0, |a| a.deviations.len());
    let title = if tracked > app.max_bars {
        format!(" Deviation per AP (first {} of {}) ", app.max_bars, tracked)
    } else {
        " Deviation per AP ".to_string()
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let data = app.deviation_bars();
    if data.is_empty() {
        let waiting = Paragraph::new("Waiting for the first active scan...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(waiting, area);
        return;
    }

    let bars: Vec<Bar> = data
        .iter()
        .map(|(label, deviation)| {
            let color = deviation_color(*deviation);
            Bar::default()
                .value((deviation * SCALE).round() as u64)
                .text_value(format!("{:.1}", deviation))
                .label(Line::from(label.clone()))
                .style(Style::default().fg(color))
                .value_style(
                    Style::default()
                        .fg(Color::Black)
                        .bg(color)
                        .add_modifier(Modifier::BOLD),
                )
        })
        .collect();

    // Fit the bars to the panel, leaving a one-column gap
    let inner_width = area.width.saturating_sub(2) as usize;
    let bar_width = (inner_width / bars.len().max(1)).saturating_sub(1).clamp(3, 9) as u16;

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1);

    frame.render_widget(chart, area);
}
