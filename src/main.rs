//! # flipper
//!
//! Command-line control of Thorlabs filter flippers.
//!
//! ```bash
//! # List attached flippers
//! flipper --backend kinesis list
//!
//! # Flip and wait for arrival
//! flipper --serial 37000001 flip --wait
//!
//! # Program a 750 ms transit time
//! flipper transit-time --set 750ms
//! ```
//!
//! Settings come from `flipper.toml` (or `--config`) and `FLIPPER_*` environment
//! variables. `RUST_LOG` overrides the configured log level.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use flipper_daq::config::{FlipperSettings, DEFAULT_CONFIG_FILE};
use flipper_daq::hardware::{
    list_instruments, FirmwareVersion, FlipperDevice, HardwareInfo, NativeMotionController,
    Position,
};
use flipper_daq::units::round_to_millis;

/// Serial number of the simulated flipper when none is configured.
const SIM_SERIAL: &str = "37000001";

#[derive(Parser, Debug)]
#[command(name = "flipper")]
#[command(about = "Control Thorlabs motorized filter flippers", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Serial number of the flipper (overrides the configuration file)
    #[arg(short, long)]
    serial: Option<String>,

    /// Controller backend
    #[arg(short, long, value_enum, default_value_t = Backend::Sim)]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// Simulated flipper
    Sim,
    /// Thorlabs Kinesis SDK
    Kinesis,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List attached filter flippers
    List,

    #[command(flatten)]
    Device(DeviceCommand),
}

/// Commands that run against one open flipper.
#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Show hardware and status information
    Info,

    /// Show the current position
    Position,

    /// Move to the other position
    Flip {
        /// Wait until the flipper arrives
        #[arg(short, long)]
        wait: bool,
    },

    /// Move to a position (one or two)
    Move {
        target: Position,

        /// Wait until the flipper arrives
        #[arg(short, long)]
        wait: bool,
    },

    /// Run the homing sequence
    Home,

    /// Show or set the transit time
    TransitTime {
        /// New transit time, e.g. 500ms
        #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
        set: Option<Duration>,
    },

    /// Blink the front-panel LED
    Identify,
}

#[derive(Serialize)]
struct DeviceReport {
    serial: String,
    position: Position,
    transit_time_ms: u128,
    polling_period_ms: u128,
    status_bits: u32,
    software_version: FirmwareVersion,
    hardware: HardwareInfo,
}

#[cfg(feature = "simulator")]
fn sim_controller(serial: Option<&str>) -> flipper_daq::Result<Arc<dyn NativeMotionController>> {
    use flipper_daq::hardware::mock::MockFlipperController;
    Ok(Arc::new(
        MockFlipperController::new().with_device(serial.unwrap_or(SIM_SERIAL)),
    ))
}

#[cfg(not(feature = "simulator"))]
fn sim_controller(_serial: Option<&str>) -> flipper_daq::Result<Arc<dyn NativeMotionController>> {
    Err(flipper_daq::FlipperError::FeatureNotEnabled("simulator".to_string()))
}

#[cfg(feature = "kinesis_sdk")]
fn kinesis_controller() -> flipper_daq::Result<Arc<dyn NativeMotionController>> {
    Ok(Arc::new(flipper_daq::hardware::kinesis::KinesisController::new()))
}

#[cfg(not(feature = "kinesis_sdk"))]
fn kinesis_controller() -> flipper_daq::Result<Arc<dyn NativeMotionController>> {
    Err(flipper_daq::FlipperError::FeatureNotEnabled("kinesis_sdk".to_string()))
}

fn controller(
    backend: Backend,
    serial: Option<&str>,
) -> flipper_daq::Result<Arc<dyn NativeMotionController>> {
    match backend {
        Backend::Sim => sim_controller(serial),
        Backend::Kinesis => kinesis_controller(),
    }
}

fn open_device(
    controller: Arc<dyn NativeMotionController>,
    settings: &FlipperSettings,
) -> Result<FlipperDevice> {
    let device = FlipperDevice::from_settings(controller, settings)
        .with_context(|| format!("Failed to open filter flipper {:?}", settings.serial))?;
    Ok(device)
}

async fn run(
    controller: Arc<dyn NativeMotionController>,
    settings: &FlipperSettings,
    command: Commands,
) -> Result<()> {
    let command = match command {
        Commands::List => {
            let instruments = list_instruments(controller.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&instruments)?);
            return Ok(());
        }
        Commands::Device(command) => command,
    };

    let device = open_device(controller, settings)?;
    let outcome = run_on_device(&device, command).await;
    let closed = device.close();
    match (outcome, closed) {
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close filter flipper");
            Err(err)
        }
        (outcome, closed) => {
            outcome?;
            closed?;
            Ok(())
        }
    }
}

async fn run_on_device(device: &FlipperDevice, command: DeviceCommand) -> Result<()> {
    match command {
        DeviceCommand::Info => {
            let report = DeviceReport {
                serial: device.serial().to_string(),
                position: device.get_position().await?,
                transit_time_ms: round_to_millis(device.get_transit_time().await?),
                polling_period_ms: round_to_millis(device.polling_period()),
                status_bits: device.status_bits().await?,
                software_version: device.software_version().await?,
                hardware: device.hardware_info().await?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        DeviceCommand::Position => {
            println!("{}", device.get_position().await?);
        }
        DeviceCommand::Flip { wait } => {
            let target = if wait {
                device.flip_and_wait().await?
            } else {
                device.flip().await?
            };
            println!("{}", target);
        }
        DeviceCommand::Move { target, wait } => {
            if wait {
                device.move_and_wait(target).await?;
            } else {
                device.move_to(target).await?;
            }
            println!("{}", target);
        }
        DeviceCommand::Home => {
            device.home().await?;
        }
        DeviceCommand::TransitTime { set } => {
            if let Some(transit_time) = set {
                device.set_transit_time(transit_time).await?;
            }
            println!("{:?}", device.get_transit_time().await?);
        }
        DeviceCommand::Identify => {
            device.identify().await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = FlipperSettings::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(serial) = cli.serial {
        settings.serial = Some(serial);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    if settings.serial.is_none() && cli.backend == Backend::Sim {
        settings.serial = Some(SIM_SERIAL.to_string());
    }

    let controller = controller(cli.backend, settings.serial.as_deref())?;
    run(controller, &settings, cli.command).await
}
