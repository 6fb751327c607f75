pub mod calibration;
pub mod capture;
pub mod channels;
pub mod config;
pub mod detector;
pub mod engine;
pub mod ignore;
pub mod iw;
pub mod monitor;
pub mod registry;
pub mod replay;
pub mod scan;
pub mod tui;

pub use config::Config;
pub use engine::{Engine, Phase};
pub use scan::{Observation, ScanProvider};
