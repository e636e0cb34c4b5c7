//! Measurement setup model
//!
//! A [`MeasurementSetup`] owns an ordered list of [`Network`]s. All mutation
//! goes through the setup so that subscribed observers see every change:
//! each successful call emits exactly one [`SetupEvent`]. Failed calls and
//! no-op deletions emit nothing.

pub mod item;
pub mod network;

pub use item::{ItemAction, ItemDescription, SetupItem};
pub use network::{
    BitTiming, FdSettings, InterfaceSettings, MeasurementInterface, Network, TimingMode,
};

use crate::signals::CanDatabase;
use crate::types::{CanInterfaceId, NetworkId, Reference, Result, SetupError};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A change to the setup
#[derive(Debug, Clone, PartialEq)]
pub enum SetupEvent {
    NetworkAdded(NetworkId),
    NetworkRemoved(NetworkId),
    NetworkRenamed {
        network: NetworkId,
        name: String,
    },
    InterfaceAdded {
        network: NetworkId,
        interface: CanInterfaceId,
    },
    InterfaceRemoved {
        network: NetworkId,
        interface: CanInterfaceId,
    },
    InterfaceConfigured {
        network: NetworkId,
        interface: CanInterfaceId,
    },
    DatabaseAdded {
        network: NetworkId,
        path: PathBuf,
    },
    DatabaseRemoved {
        network: NetworkId,
        path: PathBuf,
    },
}

/// Handle returned by [`MeasurementSetup::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

type Observer = Box<dyn FnMut(&SetupEvent) + Send>;

/// The aggregate root: every network of one measurement
#[derive(Default)]
pub struct MeasurementSetup {
    networks: Vec<Network>,
    next_network_id: u32,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription_id: u32,
}

impl fmt::Debug for MeasurementSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementSetup")
            .field("networks", &self.networks)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl MeasurementSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Networks in insertion order
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn count_networks(&self) -> usize {
        self.networks.len()
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.iter().find(|n| n.id() == id)
    }

    /// First network with the given name
    pub fn network_by_name(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name() == name)
    }

    fn network_mut(&mut self, id: NetworkId) -> Result<&mut Network> {
        self.networks
            .iter_mut()
            .find(|n| n.id() == id)
            .ok_or(SetupError::UnresolvedReference(Reference::Network(id)))
    }

    /// Append a network named "Network <n>"
    pub fn add_network(&mut self) -> NetworkId {
        self.next_network_id += 1;
        let id = NetworkId(self.next_network_id);
        let name = format!("Network {}", self.networks.len() + 1);

        log::debug!("Adding {} ({})", name, id);
        self.networks.push(Network::new(id, name));
        self.notify(SetupEvent::NetworkAdded(id));
        id
    }

    /// Remove a network and hand it back
    ///
    /// Dropping the returned value releases its database handles. The
    /// interfaces it referenced are untouched.
    pub fn delete_network(&mut self, id: NetworkId) -> Option<Network> {
        let pos = self.networks.iter().position(|n| n.id() == id)?;
        let network = self.networks.remove(pos);

        log::debug!("Removed {} ({})", network.name(), id);
        self.notify(SetupEvent::NetworkRemoved(id));
        Some(network)
    }

    /// Rename a network; names need not be unique
    pub fn rename_network(&mut self, id: NetworkId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.network_mut(id)?.set_name(name.clone());
        self.notify(SetupEvent::NetworkRenamed { network: id, name });
        Ok(())
    }

    /// Reference an interface from a network
    ///
    /// Fails with [`SetupError::DuplicateReference`] if the network already
    /// references it.
    pub fn add_interface(&mut self, network: NetworkId, interface: CanInterfaceId) -> Result<()> {
        self.network_mut(network)?.add_interface(interface)?;

        log::debug!("{}: added interface {}", network, interface);
        self.notify(SetupEvent::InterfaceAdded { network, interface });
        Ok(())
    }

    /// Drop an interface reference; returns false if there was none
    pub fn delete_interface(&mut self, network: NetworkId, interface: CanInterfaceId) -> Result<bool> {
        if !self.network_mut(network)?.remove_interface(interface) {
            return Ok(false);
        }

        log::debug!("{}: removed interface {}", network, interface);
        self.notify(SetupEvent::InterfaceRemoved { network, interface });
        Ok(true)
    }

    /// Store already validated settings for a referenced interface
    pub(crate) fn set_interface_settings(
        &mut self,
        network: NetworkId,
        interface: CanInterfaceId,
        settings: InterfaceSettings,
    ) -> Result<()> {
        self.network_mut(network)?
            .interface_mut(interface)
            .ok_or(SetupError::UnresolvedReference(Reference::Interface(interface)))?
            .set_settings(settings);

        self.notify(SetupEvent::InterfaceConfigured { network, interface });
        Ok(())
    }

    /// Attach a shared database to a network
    ///
    /// Fails with [`SetupError::DuplicateReference`] if a database with the
    /// same path is already attached.
    pub fn add_database(&mut self, network: NetworkId, database: Arc<CanDatabase>) -> Result<()> {
        let path = database.path().to_path_buf();
        self.network_mut(network)?.add_database(database)?;

        log::debug!("{}: added database {:?}", network, path);
        self.notify(SetupEvent::DatabaseAdded { network, path });
        Ok(())
    }

    /// Detach a database; returns false if it was not attached
    ///
    /// Takes the same handle [`add_database`](Self::add_database) was given,
    /// so the match is on the database's canonical path. The backend's cache
    /// is not touched, see
    /// [`Backend::evict_unused_databases`](crate::Backend::evict_unused_databases).
    pub fn delete_database(&mut self, network: NetworkId, database: &CanDatabase) -> Result<bool> {
        let path = database.path();
        if !self.network_mut(network)?.remove_database(path) {
            return Ok(false);
        }

        log::debug!("{}: removed database {:?}", network, path);
        self.notify(SetupEvent::DatabaseRemoved {
            network,
            path: path.to_path_buf(),
        });
        Ok(true)
    }

    /// Register an observer for every future change
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&SetupEvent) + Send + 'static,
    {
        self.next_subscription_id += 1;
        let id = SubscriptionId(self.next_subscription_id);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        before != self.observers.len()
    }

    fn notify(&mut self, event: SetupEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    /// All tree items in depth-first display order
    pub fn items(&self) -> Vec<SetupItem> {
        let mut items = Vec::new();
        for network in &self.networks {
            let id = network.id();
            items.push(SetupItem::Network(id));

            items.push(SetupItem::InterfaceRoot(id));
            items.extend(
                network
                    .interfaces()
                    .iter()
                    .map(|mi| SetupItem::Interface(id, mi.can_interface())),
            );

            items.push(SetupItem::DatabaseRoot(id));
            items.extend(
                network
                    .databases()
                    .iter()
                    .map(|db| SetupItem::Database(id, db.path().to_path_buf())),
            );
        }
        items
    }

    /// True if `item` still names something in this setup
    pub fn contains(&self, item: &SetupItem) -> bool {
        let Some(network) = self.network(item.network()) else {
            return false;
        };
        match item {
            SetupItem::Interface(_, intf) => network.references_interface(*intf),
            SetupItem::Database(_, path) => network.database(path).is_some(),
            _ => true,
        }
    }
}
