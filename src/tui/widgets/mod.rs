pub mod baseline_table;
pub mod deviation_chart;
pub mod event_log;
pub mod help_overlay;
pub mod score_panel;
pub mod status_bar;
