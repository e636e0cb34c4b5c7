//! Backend mediator
//!
//! This module provides the primary interface for the library. The Backend
//! keeps the driver registry, resolves interface ids to live interfaces,
//! loads and caches CAN databases, and pushes a setup's interface settings to
//! the hardware when a measurement starts.

use crate::config::BackendConfig;
use crate::driver::{CanDriver, CanInterface, SocketCanDriver, VirtualCanDriver};
use crate::setup::{InterfaceSettings, ItemDescription, MeasurementSetup, Network, SetupItem};
use crate::signals::CanDatabase;
use crate::types::{CanInterfaceId, LoadError, NetworkId, Reference, Result, SetupError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of [`Backend::start_measurement`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementReport {
    /// Interfaces that are now open
    pub opened: Vec<CanInterfaceId>,
    /// Referenced interfaces that no longer resolve
    pub unavailable: Vec<CanInterfaceId>,
    /// Interfaces whose configured bitrate the driver refused
    pub rejected: Vec<CanInterfaceId>,
}

/// The mediator between the setup model, the drivers and the DBC loader
pub struct Backend {
    config: BackendConfig,
    drivers: Vec<Box<dyn CanDriver>>,

    /// Key: canonical path, Value: the shared database
    dbc_cache: HashMap<PathBuf, Arc<CanDatabase>>,
}

impl Backend {
    /// Create a backend without any driver
    pub fn new() -> Self {
        Self {
            config: BackendConfig::default(),
            drivers: Vec::new(),
            dbc_cache: HashMap::new(),
        }
    }

    /// Create a backend and register the drivers the configuration asks for
    ///
    /// Interfaces are not enumerated yet, call
    /// [`update_interfaces`](Self::update_interfaces) afterwards.
    pub fn from_config(config: BackendConfig) -> Self {
        let mut backend = Self::new();
        backend.config = config;
        backend.setup_drivers();
        backend
    }

    /// Register the drivers enabled in the configuration
    pub fn setup_drivers(&mut self) {
        if self.config.socketcan {
            let driver = SocketCanDriver::with_root(self.config.socketcan_root.clone())
                .with_default_bitrate(self.config.default_bitrate);
            self.add_driver(Box::new(driver));
        }
        if !self.config.virtual_channels.is_empty() {
            let driver = VirtualCanDriver::from_config(
                &self.config.virtual_channels,
                self.config.default_bitrate,
            );
            self.add_driver(Box::new(driver));
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Register a driver; its interfaces are listed after those already known
    pub fn add_driver(&mut self, driver: Box<dyn CanDriver>) {
        log::info!("Registering driver {}", driver.name());
        self.drivers.push(driver);
    }

    pub fn drivers(&self) -> impl Iterator<Item = &dyn CanDriver> {
        self.drivers.iter().map(|d| d.as_ref())
    }

    /// Re-enumerate every driver
    ///
    /// A failing driver does not stop the others. The last error is returned
    /// after all drivers had their turn.
    pub fn update_interfaces(&mut self) -> Result<()> {
        let mut result = Ok(());
        for driver in self.drivers.iter_mut() {
            if let Err(e) = driver.update() {
                log::warn!("Driver {} failed to enumerate: {}", driver.name(), e);
                result = Err(e);
            }
        }
        log::info!("{} interface(s) available", self.interfaces().count());
        result
    }

    /// All live interfaces, in driver registration order
    pub fn interfaces(&self) -> impl Iterator<Item = &CanInterface> {
        self.drivers.iter().flat_map(|d| d.interfaces().iter())
    }

    /// Ids of all live interfaces, in driver registration order
    pub fn list_interfaces(&self) -> Vec<CanInterfaceId> {
        self.interfaces().map(|intf| intf.id()).collect()
    }

    /// Resolve an id; None means the interface is unavailable
    pub fn get_interface_by_id(&self, id: CanInterfaceId) -> Option<&CanInterface> {
        self.drivers.iter().find_map(|d| d.interface(id))
    }

    pub fn get_interface_by_id_mut(&mut self, id: CanInterfaceId) -> Option<&mut CanInterface> {
        self.drivers.iter_mut().find_map(|d| d.interface_mut(id))
    }

    /// First live interface with the given name
    pub fn find_interface_by_name(&self, name: &str) -> Option<&CanInterface> {
        self.interfaces().find(|intf| intf.name() == name)
    }

    /// Bitrates the driver reports, empty if the id does not resolve
    pub fn get_available_bitrates(&self, id: CanInterfaceId) -> Vec<u32> {
        self.get_interface_by_id(id)
            .map(|intf| intf.available_bitrates().to_vec())
            .unwrap_or_default()
    }

    /// Driver name, empty if the id does not resolve
    pub fn get_driver_name(&self, id: CanInterfaceId) -> String {
        self.get_interface_by_id(id)
            .map(|intf| intf.driver_name().to_string())
            .unwrap_or_default()
    }

    /// Interface name, empty if the id does not resolve
    pub fn get_interface_name(&self, id: CanInterfaceId) -> String {
        self.get_interface_by_id(id)
            .map(|intf| intf.name().to_string())
            .unwrap_or_default()
    }

    /// Change the bitrate of a live interface
    pub fn set_bitrate(&mut self, id: CanInterfaceId, bitrate: u32) -> Result<()> {
        self.get_interface_by_id_mut(id)
            .ok_or(SetupError::UnresolvedReference(Reference::Interface(id)))?
            .set_bitrate(bitrate)
    }

    /// Interfaces that may still be added to `network`
    pub fn selectable_interfaces(&self, network: &Network) -> Vec<CanInterfaceId> {
        self.interfaces()
            .map(|intf| intf.id())
            .filter(|id| !network.references_interface(*id))
            .collect()
    }

    /// Load a DBC file
    ///
    /// With caching enabled (the default) every path is parsed once per
    /// session and later calls share the same handle. Nothing is returned on
    /// failure, so a caller cannot attach a partial database to a network.
    ///
    /// # Example
    /// ```no_run
    /// use can_setup::{Backend, MeasurementSetup};
    ///
    /// let mut backend = Backend::new();
    /// let mut setup = MeasurementSetup::new();
    /// let network = setup.add_network();
    /// let db = backend.load_dbc("powertrain.dbc").unwrap();
    /// setup.add_database(network, db).unwrap();
    /// ```
    pub fn load_dbc(
        &mut self,
        filename: impl AsRef<Path>,
    ) -> std::result::Result<Arc<CanDatabase>, LoadError> {
        let requested = filename.as_ref();
        let path =
            std::fs::canonicalize(requested).map_err(|e| LoadError::from_io(requested, e))?;

        if self.config.cache_databases {
            if let Some(database) = self.dbc_cache.get(&path) {
                log::debug!("Using cached database {:?}", path);
                return Ok(Arc::clone(database));
            }
        }

        let database = Arc::new(crate::signals::dbc::load_database(&path)?);
        log::info!(
            "Loaded {} ({} messages)",
            database.filename(),
            database.stats().num_messages
        );

        if self.config.cache_databases {
            self.dbc_cache.insert(path, Arc::clone(&database));
        }
        Ok(database)
    }

    pub fn cached_databases(&self) -> impl Iterator<Item = &Arc<CanDatabase>> {
        self.dbc_cache.values()
    }

    /// Drop cached databases that nothing outside the cache holds any more
    ///
    /// A handle kept by a caller counts as a holder just like a network.
    pub fn evict_unused_databases(&mut self) -> usize {
        let before = self.dbc_cache.len();
        self.dbc_cache.retain(|path, db| {
            let used = Arc::strong_count(db) > 1;
            if !used {
                log::debug!("Evicting {:?} from database cache", path);
            }
            used
        });
        before - self.dbc_cache.len()
    }

    pub fn clear_dbc_cache(&mut self) {
        self.dbc_cache.clear();
    }

    /// Validate `settings` against the live interface and store them in the network
    ///
    /// On error the network keeps its previous settings.
    pub fn configure_interface(
        &self,
        setup: &mut MeasurementSetup,
        network: NetworkId,
        interface: CanInterfaceId,
        settings: InterfaceSettings,
    ) -> Result<()> {
        let live = self
            .get_interface_by_id(interface)
            .ok_or(SetupError::UnresolvedReference(Reference::Interface(interface)))?;
        settings.validate(live)?;
        setup.set_interface_settings(network, interface, settings)
    }

    /// Display columns for a tree item, None if the item is gone
    pub fn describe_item(&self, setup: &MeasurementSetup, item: &SetupItem) -> Option<ItemDescription> {
        let network = setup.network(item.network())?;

        let description = match item {
            SetupItem::Network(_) => ItemDescription::label(item.clone(), network.name()),
            SetupItem::InterfaceRoot(_) => ItemDescription::label(item.clone(), "Interfaces"),
            SetupItem::DatabaseRoot(_) => ItemDescription::label(item.clone(), "CAN Databases"),
            SetupItem::Interface(_, id) => {
                let reference = network.interface(*id)?;
                match self.get_interface_by_id(*id) {
                    Some(live) => ItemDescription {
                        driver: Some(live.driver_name().to_string()),
                        bitrate: Some(reference.settings().bitrate.unwrap_or_else(|| live.bitrate())),
                        ..ItemDescription::label(item.clone(), live.name())
                    },
                    None => {
                        log::warn!("{} references unavailable interface {}", network.id(), id);
                        ItemDescription {
                            available: false,
                            bitrate: reference.settings().bitrate,
                            ..ItemDescription::label(item.clone(), format!("<unavailable {}>", id))
                        }
                    }
                }
            }
            SetupItem::Database(_, path) => {
                let database = network.database(path)?;
                ItemDescription {
                    filename: Some(database.filename().to_string()),
                    path: Some(database.path().to_path_buf()),
                    ..ItemDescription::label(item.clone(), database.filename())
                }
            }
        };

        Some(description)
    }

    /// Apply the setup to the hardware and open every referenced interface
    ///
    /// Interfaces whose settings ask for configuration get their bitrate set
    /// first. Unavailable interfaces are skipped and reported.
    pub fn start_measurement(&mut self, setup: &MeasurementSetup) -> MeasurementReport {
        let mut report = MeasurementReport::default();

        for network in setup.networks() {
            for reference in network.interfaces() {
                let id = reference.can_interface();
                let Some(live) = self.get_interface_by_id_mut(id) else {
                    log::warn!("{}: interface {} is unavailable, skipping", network.name(), id);
                    report.unavailable.push(id);
                    continue;
                };

                let settings = reference.settings();
                if settings.configure {
                    if let Some(bitrate) = settings.bitrate {
                        if live.set_bitrate(bitrate).is_err() {
                            report.rejected.push(id);
                            continue;
                        }
                    }
                    if let Some(timing) = settings.arbitration_timing() {
                        log::debug!("{}: manual timing {:?}", live.name(), timing);
                    }
                    if let Some(timing) = settings.data_timing() {
                        log::debug!("{}: manual FD data timing {:?}", live.name(), timing);
                    }
                }

                live.open();
                if !report.opened.contains(&id) {
                    report.opened.push(id);
                }
            }
        }

        log::info!(
            "Measurement started: {} open, {} unavailable, {} rejected",
            report.opened.len(),
            report.unavailable.len(),
            report.rejected.len()
        );
        report
    }

    /// Close every open interface
    pub fn stop_measurement(&mut self) {
        for driver in self.drivers.iter_mut() {
            for intf in driver.interfaces_mut() {
                intf.close();
            }
        }
        log::info!("Measurement stopped");
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}
