//! CAN Measurement Setup Library
//!
//! The configuration core of a CAN bus analyser: which CAN interfaces and
//! which CAN databases (DBC files) make up each logical network of a
//! measurement.
//!
//! # Architecture
//!
//! - [`driver`]: hardware backends ([`CanDriver`]) and the interfaces they
//!   own ([`CanInterface`]), with bitrate validation
//! - [`setup`]: the [`MeasurementSetup`] → [`Network`] model, typed tree items
//!   and change notifications
//! - [`Backend`]: resolves interface ids through the registered drivers,
//!   loads and caches DBC files, and starts/stops a measurement
//!
//! Networks reference interfaces by [`CanInterfaceId`] only. An interface
//! that disappears leaves an unresolved reference behind, never a dangling
//! one. Databases are shared through `Arc`, so one parsed DBC can serve any
//! number of networks.
//!
//! The library does NOT:
//! - Render or edit the setup interactively
//! - Persist setups to disk
//! - Transmit or receive CAN frames
//!
//! # Example Usage
//!
//! ```no_run
//! use can_setup::{Backend, BackendConfig, InterfaceSettings, MeasurementSetup};
//!
//! let config = BackendConfig::new().with_virtual_channel("vcan0");
//! let mut backend = Backend::from_config(config);
//! backend.update_interfaces().unwrap();
//!
//! let mut setup = MeasurementSetup::new();
//! let network = setup.add_network();
//! setup.rename_network(network, "Powertrain").unwrap();
//!
//! let vcan0 = backend.find_interface_by_name("vcan0").unwrap().id();
//! setup.add_interface(network, vcan0).unwrap();
//! backend
//!     .configure_interface(&mut setup, network, vcan0, InterfaceSettings::with_bitrate(500_000))
//!     .unwrap();
//!
//! let db = backend.load_dbc("powertrain.dbc").unwrap();
//! setup.add_database(network, db).unwrap();
//!
//! let report = backend.start_measurement(&setup);
//! println!("{} interface(s) open", report.opened.len());
//! ```

// Public modules
pub mod backend;
pub mod config;
pub mod driver;
pub mod setup;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use backend::{Backend, MeasurementReport};
pub use config::{BackendConfig, VirtualChannelConfig};
pub use driver::{CanDriver, CanInterface, InterfaceInfo, InterfaceState};
pub use setup::{
    BitTiming, InterfaceSettings, ItemAction, ItemDescription, MeasurementSetup, Network,
    SetupEvent, SetupItem, SubscriptionId, TimingMode,
};
pub use signals::{CanDatabase, DatabaseStats};
pub use types::{CanInterfaceId, LoadError, NetworkId, Reference, Result, SetupError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty backend knows no interfaces
        let backend = Backend::new();
        assert!(backend.list_interfaces().is_empty());

        let setup = MeasurementSetup::new();
        assert_eq!(setup.count_networks(), 0);
        assert!(setup.items().is_empty());
    }
}
