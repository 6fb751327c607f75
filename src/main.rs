use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stillroom::capture::BeaconScanner;
use stillroom::channels::{list_wireless_interfaces, resolve_monitor_interface};
use stillroom::config::{Config, ScanBackend};
use stillroom::ignore::{create_default_ignore_list, IgnoreList};
use stillroom::iw::IwScanner;
use stillroom::monitor::{LogSink, Monitor, Pacing};
use stillroom::replay::{ReplayScanner, ScanRecorder};
use stillroom::scan::ScanProvider;
use stillroom::tui;

#[derive(Parser)]
#[command(name = "stillroom")]
#[command(author = "spikehead")]
#[command(version = "0.1.0")]
#[command(about = "Detect people in a room from disturbances in its Wi-Fi fingerprint")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Wi-Fi interface (overrides config)
    #[arg(short, long)]
    interface: Option<String>,

    /// Alarm threshold on the total deviation (overrides config)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate on the empty room, then watch for disturbances
    Monitor {
        /// Set interface to monitor mode before scanning
        #[arg(long)]
        set_monitor: bool,
    },

    /// Same as monitor, with an interactive dashboard
    Tui {
        /// Set interface to monitor mode before scanning
        #[arg(long)]
        set_monitor: bool,
    },

    /// Record raw scans to a JSON-lines file for later replay
    Record {
        /// Output file (appended to if it exists)
        #[arg(short, long)]
        output: PathBuf,

        /// Stop after this many scans (default: until Ctrl+C)
        #[arg(long)]
        scans: Option<u64>,

        /// Set interface to monitor mode before scanning
        #[arg(long)]
        set_monitor: bool,
    },

    /// Run calibration and detection offline against a recording
    Replay {
        /// Recording produced by `record`
        file: PathBuf,
    },

    /// List wireless interfaces and their modes
    Interfaces,

    /// Write a default config and an empty ignore list
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    // Handle init command before loading config
    if matches!(cli.command, Commands::Init) {
        return handle_init(&cli.config);
    }

    let mut config = if cli.config.exists() {
        Config::load(&cli.config).context("Failed to load config")?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Override config with CLI args
    if let Some(interface) = cli.interface {
        config.scan.interface = interface;
    }
    if let Some(threshold) = cli.threshold {
        config.detection.threshold = threshold;
    }
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Monitor { set_monitor } => handle_monitor(config, set_monitor),
        Commands::Tui { set_monitor } => handle_tui(config, set_monitor).await,
        Commands::Record {
            output,
            scans,
            set_monitor,
        } => handle_record(config, &output, scans, set_monitor),
        Commands::Replay { file } => handle_replay(config, &file),
        Commands::Interfaces => handle_interfaces(),
        Commands::Init => unreachable!(),
    }
}

/// Build the live scan provider for the configured backend, plus a label
/// describing it
fn build_scanner(config: &Config, set_monitor: bool) -> Result<(Box<dyn ScanProvider + Send>, String)> {
    match config.scan.backend {
        ScanBackend::Monitor => {
            let interface = resolve_monitor_interface(&config.scan.interface, set_monitor)?;
            info!(
                "Using interface {} (monitor), channels {:?}",
                interface, config.scan.channels
            );
            let label = format!("{} (monitor)", interface);
            let scanner = BeaconScanner::new(interface, config.scan.channels.clone());
            Ok((Box::new(scanner), label))
        }
        ScanBackend::Iw => {
            if set_monitor {
                warn!("--set-monitor has no effect with the iw backend");
            }
            info!("Using interface {} (iw scan)", config.scan.interface);
            let label = format!("{} (iw)", config.scan.interface);
            Ok((Box::new(IwScanner::new(config.scan.interface.clone())), label))
        }
    }
}

fn load_ignore_list(config: &Config) -> IgnoreList {
    IgnoreList::load(&config.ignore_list).unwrap_or_else(|e| {
        warn!("Ignoring unreadable BSSID ignore list: {:#}", e);
        IgnoreList::new()
    })
}

fn install_ctrlc(message: &'static str) -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n{}", message);
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

fn handle_monitor(config: Config, set_monitor: bool) -> Result<()> {
    let (scanner, _) = build_scanner(&config, set_monitor)?;
    let ignore = load_ignore_list(&config);
    let running = install_ctrlc("Received Ctrl+C, stopping after this cycle...")?;

    let mut monitor = Monitor::new(
        config.engine_settings(),
        scanner,
        ignore,
        config.scan_interval(),
        Pacing::RealTime,
        running,
    );
    monitor.run(&mut LogSink);

    info!("Exiting...");
    Ok(())
}

async fn handle_tui(config: Config, set_monitor: bool) -> Result<()> {
    let (scanner, label) = build_scanner(&config, set_monitor)?;
    let ignore = load_ignore_list(&config);
    let running = Arc::new(AtomicBool::new(true));

    tui::run_tui(config, scanner, ignore, Pacing::RealTime, label, running).await
}

fn handle_record(config: Config, output: &Path, scans: Option<u64>, set_monitor: bool) -> Result<()> {
    let (scanner, label) = build_scanner(&config, set_monitor)?;
    let mut recorder = ScanRecorder::create(scanner, output)?;
    let running = install_ctrlc("Received Ctrl+C, stopping recording...")?;

    // Record at the calibration dwell so replays see the same scan shape
    let request = config.engine_settings().calibration_scan;
    let interval = config.scan_interval();
    info!("Recording from {}", label);

    let mut attempts = 0u64;
    while running.load(Ordering::SeqCst) && scans.map_or(true, |n| (recorder.recorded() as u64) < n) {
        attempts += 1;
        match recorder.scan(&request) {
            Ok(observations) => info!(
                "Recorded scan {}: {} APs",
                recorder.recorded(),
                observations.len()
            ),
            Err(e) => warn!("Scan {} failed: {}", attempts, e),
        }
        std::thread::sleep(interval);
    }

    info!(
        "Wrote {} scans to {:?} ({} attempts)",
        recorder.recorded(),
        output,
        attempts
    );
    Ok(())
}

fn handle_replay(config: Config, file: &Path) -> Result<()> {
    let scanner = ReplayScanner::open(file)?;
    let ignore = load_ignore_list(&config);
    let running = install_ctrlc("Received Ctrl+C, stopping replay...")?;

    info!("Replaying {:?}", file);
    let mut monitor = Monitor::new(
        config.engine_settings(),
        scanner,
        ignore,
        config.scan_interval(),
        Pacing::Virtual,
        running,
    );
    let summary = monitor.run(&mut LogSink);

    println!(
        "Replayed {} cycles: {} alarms, {} failed scans",
        summary.cycles, summary.alarms, summary.scan_failures
    );
    Ok(())
}

fn handle_interfaces() -> Result<()> {
    println!("Scanning for wireless interfaces...\n");

    let interfaces = list_wireless_interfaces()?;

    if interfaces.is_empty() {
        println!("No wireless interfaces found.");
        println!("\nMake sure you have a wireless adapter connected.");
        return Ok(());
    }

    for iface in &interfaces {
        if iface.is_monitor() {
            println!("\x1b[32m[MONITOR]\x1b[0m {}", iface.name);
        } else {
            println!("\x1b[33m[{}]\x1b[0m {}", iface.mode, iface.name);
        }
    }

    println!();

    if let Some(iface) = interfaces.iter().find(|i| i.is_monitor()) {
        println!("\x1b[32mMonitor interface found: {}\x1b[0m", iface.name);
        println!("\nStart detecting with:");
        println!("  sudo stillroom -i {} monitor", iface.name);
        println!("  sudo stillroom -i {} tui", iface.name);
    } else {
        println!("\x1b[33mNo monitor mode interfaces found.\x1b[0m");
        println!("\nEither enable monitor mode:");
        println!("  sudo stillroom -i <interface> monitor --set-monitor");
        println!("or set \"backend\": \"iw\" in config.json to scan in managed mode.");
    }

    Ok(())
}

fn handle_init(config_path: &Path) -> Result<()> {
    info!("Initializing stillroom configuration...");

    let config = if config_path.exists() {
        info!("{:?} already exists, leaving it alone", config_path);
        Config::load(config_path)?
    } else {
        let config = Config::default();
        config.save(config_path)?;
        info!("Created {:?}", config_path);
        config
    };

    create_default_ignore_list(&config.ignore_list)?;

    info!("Initialization complete!");
    info!("Edit {:?} to customize settings.", config_path);
    info!("Run 'sudo stillroom -i <interface> monitor --set-monitor' to start.");

    Ok(())
}
