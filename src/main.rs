#![forbid(unsafe_code)]

mod audio_devices;
mod color;
mod config;
mod constants;
mod discovery;
mod fields;
mod gui;
mod session;
mod status;
mod supervisor;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::ConfigStore;
use constants::{discovery as discovery_consts, worker};
use discovery::DiscoveryConfig;
use session::{ConfigSession, SessionOptions};
use supervisor::WorkerState;

#[derive(Parser, Debug)]
#[command(
    name = "wiz-visualizer-manager",
    version,
    about = "Configure, discover lights for and supervise the WiZ volume visualizer"
)]
struct Cli {
    /// Live configuration file passed to the visualizer
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read-only template used for first run and reset
    #[arg(long = "default-config", global = true, value_name = "PATH")]
    default_config: Option<PathBuf>,

    /// Visualizer executable
    #[arg(long, global = true, value_name = "PATH")]
    worker: Option<PathBuf>,

    #[arg(
        long = "shutdown-timeout-secs",
        global = true,
        default_value_t = worker::SHUTDOWN_TIMEOUT_SECS,
        value_name = "SECONDS",
        help = "Seconds to wait after SIGTERM before killing the visualizer"
    )]
    shutdown_timeout_secs: u64,

    #[arg(
        long = "discovery-timeout-secs",
        global = true,
        default_value_t = discovery_consts::TIMEOUT_SECS,
        value_name = "SECONDS",
        help = "Seconds to listen for light replies"
    )]
    discovery_timeout_secs: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the manager window (default)
    Gui,
    /// Write the bundled default configuration if it is missing
    Init,
    /// Check that the configuration file loads and validates
    Validate,
    /// Scan the network for lights
    Discover {
        /// Add the found lights to the configuration file
        #[arg(long)]
        save: bool,
    },
    /// Start the visualizer without a window and supervise it until a signal
    Run,
}

impl Cli {
    fn store(&self) -> ConfigStore {
        ConfigStore::new(
            self.config.clone().unwrap_or_else(ConfigStore::default_config_path),
            self.default_config
                .clone()
                .unwrap_or_else(ConfigStore::default_template_path),
        )
    }

    fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::default().with_timeout(Duration::from_secs(self.discovery_timeout_secs))
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            worker: self.worker.clone().unwrap_or_else(default_worker_path),
            discovery: self.discovery_config(),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}

/// Visualizer binary next to the manager executable
fn default_worker_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(worker::EXECUTABLE)))
        .unwrap_or_else(|| PathBuf::from(worker::EXECUTABLE))
}

fn init_tracing() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Flag raised on SIGINT or SIGTERM
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));

    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&flag))
                .with_context(|| format!("Failed to register handler for signal {signal}"))?;
        }
    }

    Ok(flag)
}

fn open_session(cli: &Cli, devices: Vec<audio_devices::AudioDevice>) -> Result<(ConfigSession, std::sync::mpsc::Receiver<status::Status>)> {
    let store = cli.store();
    let (tx, rx) = status::channel();
    let session = ConfigSession::open(store, cli.session_options(), devices, tx).with_context(|| {
        format!(
            "Failed to open configuration (template: {})",
            cli.default_config
                .clone()
                .unwrap_or_else(ConfigStore::default_template_path)
                .display()
        )
    })?;
    Ok((session, rx))
}

fn run_gui(cli: &Cli) -> Result<()> {
    let devices = audio_devices::list_input_devices();
    let (session, rx) = open_session(cli, devices)?;
    let flag = shutdown_flag()?;
    gui::run_gui(session, rx, flag)
}

fn run_init(cli: &Cli) -> Result<()> {
    let store = cli.store();
    let path = store.default_path();
    if ConfigStore::write_bundled_template(path)
        .with_context(|| format!("Failed to write default configuration to {}", path.display()))?
    {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("Default configuration already exists at {}", path.display());
    }
    Ok(())
}

fn run_validate(cli: &Cli) -> Result<()> {
    let store = cli.store();
    for path in [store.default_path(), store.config_path()] {
        validate_file(path)?;
    }
    Ok(())
}

fn validate_file(path: &Path) -> Result<()> {
    let doc = ConfigStore::load(path).with_context(|| format!("{} is not a valid configuration", path.display()))?;
    println!(
        "{}: ok ({} light(s), UDP port {})",
        path.display(),
        doc.light_ips().len(),
        doc.udp_port().unwrap_or_default()
    );
    Ok(())
}

fn run_discover(cli: &Cli, save: bool) -> Result<()> {
    let config = cli.discovery_config();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build discovery runtime")?;
    let devices = runtime
        .block_on(discovery::scan(&config))
        .context("Discovery failed")?;

    for device in &devices {
        println!("{}\t{}", device.address, device.mac.as_deref().unwrap_or("-"));
    }
    println!("Found {} light(s)", devices.len());

    if save {
        let store = cli.store();
        store.ensure_config()?;
        let mut doc = store.load_config()?;
        let addresses: Vec<String> = devices.iter().map(|d| d.address.to_string()).collect();
        let added = doc.merge_light_ips(addresses.iter().map(String::as_str));
        if added.is_empty() {
            println!("No new lights to add");
        } else {
            store.save_config(&doc)?;
            println!("Added {} light(s) to {}", added.len(), store.config_path().display());
        }
    }
    Ok(())
}

fn run_headless(cli: &Cli) -> Result<()> {
    let flag = shutdown_flag()?;
    let (mut session, rx) = open_session(cli, Vec::new())?;
    info!(
        worker = %session.worker_path().display(),
        config = %session.store().config_path().display(),
        "Supervising visualizer"
    );

    if session.launch_worker()?.is_none() {
        anyhow::bail!("Configuration is invalid; visualizer not started");
    }

    let poll = Duration::from_millis(worker::SUPERVISE_POLL_INTERVAL_MS);
    loop {
        for status in rx.try_iter() {
            if status.is_error() {
                warn!(status = %status, "Visualizer status");
            }
        }
        if flag.load(Ordering::Acquire) {
            info!("Shutdown signal received");
            break;
        }
        match session.poll() {
            WorkerState::Idle | WorkerState::Crashed(_) => {
                warn!("Visualizer is no longer running");
                break;
            }
            _ => std::thread::sleep(poll),
        }
    }

    session.shutdown()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let result = match &cli.command {
        None | Some(Commands::Gui) => run_gui(&cli),
        Some(Commands::Init) => run_init(&cli),
        Some(Commands::Validate) => run_validate(&cli),
        Some(Commands::Discover { save }) => run_discover(&cli, *save),
        Some(Commands::Run) => run_headless(&cli),
    };

    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "Manager failed");
    }
    result
}
