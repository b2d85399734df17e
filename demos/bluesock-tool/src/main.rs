//! A command line tool for finding devices and services
//!
//! The configuration is read from `bluesock/config.yaml` in the configuration directory of the
//! user, or from the file given with `--config`. Every field of the configuration is optional.

#[cfg(not(target_os = "linux"))]
compile_error!("unsupported target for this tool");

use bluesock_core::{BluetoothDeviceAddress, Uuid};
use bluesock_linux::discovery::{discover_devices, lookup_name, DeviceDiscoverer, DiscoveredDevice, DiscoveryConfig};
use bluesock_linux::hci::{device_info, device_list};
use bluesock_linux::sdp::{find_service_with, KernelConnector};
use bluesock_linux::DiscoveryHandler;
use bluesock_sdp::{SdpConfig, ServiceInfo, SessionTarget};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

type Error = Box<dyn std::error::Error>;

const DIR_NAME: &str = "bluesock";
const FILE_NAME: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Find Bluetooth devices and the services they advertise",
    long_about = "Find Bluetooth devices and the services they advertise. Devices are found with \
    an inquiry of the first controller that is up, services are found through the SDP server of \
    each device."
)]
struct Cli {
    /// The configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Increase the logging, may be used more than once
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the Bluetooth controllers
    Devices,
    /// Find the devices in range
    Scan {
        /// Look up the name of each device
        #[arg(long)]
        names: bool,
        /// The inquiry length in units of 1.28 seconds
        #[arg(long)]
        duration: Option<u8>,
        /// Report devices as the events of the inquiry are received
        #[arg(long)]
        events: bool,
    },
    /// Read the name of a device
    Name {
        address: BluetoothDeviceAddress,
        /// The timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List the public services of a device
    Browse {
        /// A device address or "localhost"
        #[arg(default_value = "localhost")]
        target: SessionTarget,
    },
    /// Search for a service
    Search {
        /// The UUID of the service (or of its class or profile)
        #[arg(long)]
        uuid: Option<Uuid>,
        /// The name of the service
        #[arg(long)]
        name: Option<String>,
        /// A device address or "localhost", every device in range is searched without this
        #[arg(long)]
        target: Option<SessionTarget>,
    },
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ToolConfig {
    discovery: DiscoveryConfig,
    sdp: SdpConfig,
}

impl ToolConfig {
    fn load(path: Option<PathBuf>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path,
            None => match dirs::config_dir() {
                Some(mut path) => {
                    path.push(DIR_NAME);
                    path.push(FILE_NAME);

                    if !path.exists() {
                        return Ok(ToolConfig::default());
                    }

                    path
                }
                None => return Ok(ToolConfig::default()),
            },
        };

        log::debug!("reading the configuration from {}", path.display());

        let file = std::fs::File::open(path)?;

        Ok(serde_yaml::from_reader(file)?)
    }
}

/// Prints devices as they are found
struct Printer {
    found: usize,
}

impl DiscoveryHandler for Printer {
    fn pre_inquiry(&mut self) {
        println!("inquiring...");
    }

    fn device_discovered(&mut self, device: &DiscoveredDevice, rssi: Option<i8>) {
        self.found += 1;

        print_device(device);

        if let Some(rssi) = rssi {
            println!("    RSSI: {} dBm", rssi);
        }
    }

    fn inquiry_complete(&mut self) {
        println!("found {} devices", self.found);
    }
}

fn print_device(device: &DiscoveredDevice) {
    match &device.name {
        Some(name) => println!("{}  {}  (class {:#08x})", device.address, name, device.class_of_device),
        None => println!("{}  (class {:#08x})", device.address, device.class_of_device),
    }
}

fn print_service(service: &ServiceInfo) {
    let unnamed = "(unnamed)";

    println!("{}", service.name.as_deref().unwrap_or(unnamed));

    if let Some(host) = service.host {
        println!("    host: {}", host);
    }

    if let (Some(protocol), Some(port)) = (service.protocol, service.port) {
        println!("    protocol: {} port {}", protocol, port);
    }

    if let Some(provider) = &service.provider {
        println!("    provider: {}", provider);
    }

    if let Some(description) = &service.description {
        println!("    description: {}", description);
    }

    if !service.service_classes.is_empty() {
        println!("    classes: {}", service.service_classes.join(", "));
    }

    for (profile, version) in &service.profiles {
        println!("    profile: {} version {:#06x}", profile, version);
    }
}

fn devices() -> Result<(), Error> {
    for entry in device_list()? {
        let info = device_info(entry.id)?;

        println!(
            "hci{}  {}  {}  {}",
            info.id,
            info.address,
            info.name,
            if info.is_up() { "UP" } else { "DOWN" }
        );
    }

    Ok(())
}

fn scan(config: &ToolConfig, names: bool, duration: Option<u8>, events: bool) -> Result<(), Error> {
    let config = DiscoveryConfig {
        lookup_names: names || config.discovery.lookup_names,
        duration: duration.unwrap_or(config.discovery.duration),
        ..config.discovery
    };

    if events {
        let mut discoverer = DeviceDiscoverer::new(-1, Printer { found: 0 })?;

        discoverer.find_devices(&config)?;

        discoverer.process_inquiry()?;
    } else {
        for device in discover_devices(&config)? {
            print_device(&device);
        }
    }

    Ok(())
}

fn search(config: &ToolConfig, uuid: Option<Uuid>, name: Option<&str>, targets: Vec<SessionTarget>) {
    let connector = KernelConnector::new(config.sdp);

    let services = find_service_with(&connector, name, uuid.as_ref(), &targets);

    if services.is_empty() {
        println!("no services found");
    }

    for service in services.iter() {
        print_service(service)
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = ToolConfig::load(cli.config)?;

    match cli.command {
        Commands::Devices => devices(),
        Commands::Scan { names, duration, events } => scan(&config, names, duration, events),
        Commands::Name { address, timeout } => {
            match lookup_name(&address, timeout.map(Duration::from_millis))? {
                Some(name) => println!("{}", name),
                None => println!("the name of {} could not be read", address),
            }

            Ok(())
        }
        Commands::Browse { target } => {
            search(&config, None, None, vec![target]);

            Ok(())
        }
        Commands::Search { uuid, name, target } => {
            let targets = match target {
                Some(target) => vec![target],
                None => discover_devices(&config.discovery)?
                    .into_iter()
                    .map(|device| SessionTarget::Remote(device.address))
                    .collect(),
            };

            search(&config, uuid, name.as_deref(), targets);

            Ok(())
        }
    }
}

fn main() -> std::process::ExitCode {
    use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto).ok();

    match run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
