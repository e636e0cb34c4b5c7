//! CAN Setup CLI Application
//!
//! Command-line front end for the can-setup library:
//! - Lists the CAN interfaces every driver can see
//! - Assembles a network from interfaces and DBC files
//! - Validates bitrates against what the drivers support
//! - Optionally opens the configured interfaces once (--start)

use anyhow::{Context, Result};
use can_setup::{Backend, InterfaceSettings, MeasurementSetup, VirtualChannelConfig};
use clap::Parser;
use std::path::PathBuf;

mod config;
mod report;

/// CAN Setup - Enumerate CAN interfaces and assemble measurement setups
#[derive(Parser, Debug)]
#[command(name = "can-setup-cli")]
#[command(about = "Enumerate CAN interfaces and assemble measurement setups", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Add a virtual CAN channel (can be repeated)
    #[arg(long = "virtual", value_name = "NAME")]
    virtual_channels: Vec<String>,

    /// List available interfaces and exit
    #[arg(short, long)]
    list_interfaces: bool,

    /// Name of the network to assemble
    #[arg(short, long, value_name = "NAME")]
    network: Option<String>,

    /// Interface to add to the network (can be repeated)
    #[arg(short, long = "interface", value_name = "NAME")]
    interfaces: Vec<String>,

    /// Bitrate to configure on every added interface
    #[arg(short, long, value_name = "BPS")]
    bitrate: Option<u32>,

    /// Path to DBC file(s) (can be repeated)
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,

    /// Open the configured interfaces once and report the result
    #[arg(long)]
    start: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Setup CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using setup library v{}", can_setup::VERSION);

    let mut app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };
    app_config.backend.virtual_channels.extend(
        args.virtual_channels
            .iter()
            .map(|name| VirtualChannelConfig::new(name.clone())),
    );
    let json = args.json || app_config.output.json;

    let mut backend = Backend::from_config(app_config.backend);
    if let Err(e) = backend.update_interfaces() {
        log::warn!("Interface enumeration incomplete: {}", e);
    }

    if args.list_interfaces || (args.interfaces.is_empty() && args.dbc.is_empty()) {
        return report::print_interfaces(&backend, json);
    }

    let setup = assemble_setup(&mut backend, &args)?;
    report::print_setup(&backend, &setup, json)?;

    if args.start {
        let measurement = backend.start_measurement(&setup);
        report::print_measurement(&backend, &measurement, json)?;
        backend.stop_measurement();
    }

    Ok(())
}

/// Build a single-network setup from the command line
fn assemble_setup(backend: &mut Backend, args: &Args) -> Result<MeasurementSetup> {
    let mut setup = MeasurementSetup::new();
    setup.subscribe(|event| log::debug!("Setup changed: {:?}", event));

    let network = setup.add_network();
    if let Some(name) = &args.network {
        setup.rename_network(network, name.as_str())?;
    }

    for name in &args.interfaces {
        let id = backend
            .find_interface_by_name(name)
            .map(|intf| intf.id())
            .with_context(|| format!("Unknown CAN interface: {}", name))?;
        setup.add_interface(network, id)?;

        if let Some(bitrate) = args.bitrate {
            backend
                .configure_interface(&mut setup, network, id, InterfaceSettings::with_bitrate(bitrate))
                .with_context(|| format!("Cannot configure {}", name))?;
        }
    }

    for dbc_path in &args.dbc {
        let db = backend
            .load_dbc(dbc_path)
            .with_context(|| format!("Error loading DBC: {:?}", dbc_path))?;
        setup.add_database(network, db)?;
    }

    Ok(setup)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
