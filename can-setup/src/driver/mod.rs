//! CAN driver abstraction
//!
//! A [`CanDriver`] enumerates the channels of one hardware backend and owns
//! the resulting [`CanInterface`] records. Everything else in the crate refers
//! to interfaces by [`CanInterfaceId`] only and resolves them through the
//! driver registry kept by the [`Backend`](crate::Backend).

pub mod socketcan;
pub mod virtual_can;

pub use socketcan::SocketCanDriver;
pub use virtual_can::VirtualCanDriver;

use crate::types::{CanInterfaceId, Result, SetupError};
use serde::{Deserialize, Serialize};

/// Bitrates offered by SocketCAN and virtual channels
pub const DEFAULT_BITRATES: [u32; 10] = [
    10_000, 20_000, 50_000, 83_333, 100_000, 125_000, 250_000, 500_000, 800_000, 1_000_000,
];

/// Open/close state of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceState {
    Closed,
    Open,
}

/// One physical or virtual CAN channel
#[derive(Debug, Clone)]
pub struct CanInterface {
    id: CanInterfaceId,
    driver_name: String,
    name: String,
    bitrate: u32,
    available_bitrates: Vec<u32>,
    state: InterfaceState,
}

impl CanInterface {
    /// Create a closed interface with a freshly allocated id
    pub fn new(
        driver_name: impl Into<String>,
        name: impl Into<String>,
        bitrate: u32,
        available_bitrates: Vec<u32>,
    ) -> Self {
        Self {
            id: CanInterfaceId::next(),
            driver_name: driver_name.into(),
            name: name.into(),
            bitrate,
            available_bitrates,
            state: InterfaceState::Closed,
        }
    }

    pub fn id(&self) -> CanInterfaceId {
        self.id
    }

    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current bitrate in bits/second
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Bitrates reported by the driver, in driver order
    pub fn available_bitrates(&self) -> &[u32] {
        &self.available_bitrates
    }

    pub fn state(&self) -> InterfaceState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == InterfaceState::Open
    }

    /// True if `bitrate` is positive and offered by the driver
    pub fn supports_bitrate(&self, bitrate: u32) -> bool {
        bitrate > 0 && self.available_bitrates.contains(&bitrate)
    }

    /// Change the bitrate
    ///
    /// Values the driver did not report are rejected with
    /// [`SetupError::InvalidBitrate`] and the previous bitrate is kept.
    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        if !self.supports_bitrate(bitrate) {
            log::warn!(
                "Rejecting bitrate {} for {} ({}): not in {:?}",
                bitrate,
                self.name,
                self.id,
                self.available_bitrates
            );
            return Err(SetupError::InvalidBitrate {
                interface: self.id,
                bitrate,
                available: self.available_bitrates.clone(),
            });
        }

        log::debug!("{}: bitrate {} -> {}", self.name, self.bitrate, bitrate);
        self.bitrate = bitrate;
        Ok(())
    }

    pub fn open(&mut self) {
        if self.is_open() {
            log::debug!("{} is already open", self.name);
            return;
        }
        log::info!("Opening {} at {} bit/s", self.name, self.bitrate);
        self.state = InterfaceState::Open;
    }

    pub fn close(&mut self) {
        if self.is_open() {
            log::info!("Closing {}", self.name);
            self.state = InterfaceState::Closed;
        }
    }

    /// Serializable snapshot of this interface
    pub fn info(&self) -> InterfaceInfo {
        InterfaceInfo {
            id: self.id,
            driver: self.driver_name.clone(),
            name: self.name.clone(),
            bitrate: self.bitrate,
            available_bitrates: self.available_bitrates.clone(),
            state: self.state,
        }
    }
}

/// Snapshot of an interface for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceInfo {
    pub id: CanInterfaceId,
    pub driver: String,
    pub name: String,
    pub bitrate: u32,
    pub available_bitrates: Vec<u32>,
    pub state: InterfaceState,
}

/// A channel as reported by the hardware during enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredChannel {
    pub name: String,
    pub bitrate: u32,
    pub available_bitrates: Vec<u32>,
}

impl DiscoveredChannel {
    /// Channel offering [`DEFAULT_BITRATES`]
    pub fn with_default_bitrates(name: impl Into<String>, bitrate: u32) -> Self {
        Self {
            name: name.into(),
            bitrate,
            available_bitrates: DEFAULT_BITRATES.to_vec(),
        }
    }
}

/// A CAN hardware backend
pub trait CanDriver: Send {
    /// Driver name, e.g. "SocketCAN"
    fn name(&self) -> &str;

    /// Enumerate the hardware again
    ///
    /// Channels that are still present keep their id, bitrate and state.
    /// Channels that vanished are dropped together with their interface.
    fn update(&mut self) -> Result<()>;

    /// Interfaces currently owned by the driver, in driver order
    fn interfaces(&self) -> &[CanInterface];

    fn interfaces_mut(&mut self) -> &mut [CanInterface];

    fn interface(&self, id: CanInterfaceId) -> Option<&CanInterface> {
        self.interfaces().iter().find(|intf| intf.id() == id)
    }

    fn interface_mut(&mut self, id: CanInterfaceId) -> Option<&mut CanInterface> {
        self.interfaces_mut().iter_mut().find(|intf| intf.id() == id)
    }

    fn has_interface(&self, id: CanInterfaceId) -> bool {
        self.interface(id).is_some()
    }
}

/// Reconcile a driver's interfaces with a fresh enumeration result
///
/// Channels are matched by name. The output follows the order of
/// `discovered`.
pub(crate) fn sync_interfaces(
    driver_name: &str,
    interfaces: &mut Vec<CanInterface>,
    discovered: Vec<DiscoveredChannel>,
) {
    let mut previous = std::mem::take(interfaces);

    for channel in discovered {
        match previous.iter().position(|intf| intf.name == channel.name) {
            Some(pos) => interfaces.push(previous.remove(pos)),
            None => {
                let intf = CanInterface::new(
                    driver_name,
                    channel.name,
                    channel.bitrate,
                    channel.available_bitrates,
                );
                log::info!("{}: found interface {} ({})", driver_name, intf.name, intf.id);
                interfaces.push(intf);
            }
        }
    }

    for gone in previous {
        log::info!("{}: interface {} ({}) disappeared", driver_name, gone.name, gone.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface_with(bitrates: &[u32]) -> CanInterface {
        CanInterface::new("Test", "can0", bitrates[0], bitrates.to_vec())
    }

    #[test]
    fn test_set_bitrate_rejects_unsupported_value() {
        let mut intf = interface_with(&[125_000, 250_000, 500_000]);

        let err = intf.set_bitrate(1_000_000).unwrap_err();
        match err {
            SetupError::InvalidBitrate { interface, bitrate, available } => {
                assert_eq!(interface, intf.id());
                assert_eq!(bitrate, 1_000_000);
                assert_eq!(available, vec![125_000, 250_000, 500_000]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(intf.bitrate(), 125_000);
    }

    #[test]
    fn test_set_bitrate_rejects_zero() {
        let mut intf = interface_with(&[125_000, 250_000]);
        assert!(intf.set_bitrate(0).is_err());
        assert_eq!(intf.bitrate(), 125_000);
    }

    #[test]
    fn test_set_bitrate_accepts_supported_value() {
        let mut intf = interface_with(&[125_000, 250_000, 500_000]);
        intf.set_bitrate(500_000).unwrap();
        assert_eq!(intf.bitrate(), 500_000);
    }

    #[test]
    fn test_open_close() {
        let mut intf = interface_with(&[500_000]);
        assert_eq!(intf.state(), InterfaceState::Closed);
        intf.open();
        assert!(intf.is_open());
        intf.open();
        assert!(intf.is_open());
        intf.close();
        assert!(!intf.is_open());
    }

    #[test]
    fn test_sync_keeps_ids_of_surviving_channels() {
        let mut interfaces = Vec::new();
        sync_interfaces(
            "Test",
            &mut interfaces,
            vec![
                DiscoveredChannel::with_default_bitrates("can0", 500_000),
                DiscoveredChannel::with_default_bitrates("can1", 500_000),
            ],
        );
        assert_eq!(interfaces.len(), 2);
        let can0 = interfaces[0].id();
        let can1 = interfaces[1].id();
        interfaces[1].set_bitrate(250_000).unwrap();

        sync_interfaces(
            "Test",
            &mut interfaces,
            vec![
                DiscoveredChannel::with_default_bitrates("can1", 500_000),
                DiscoveredChannel::with_default_bitrates("can2", 500_000),
            ],
        );

        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].id(), can1);
        assert_eq!(interfaces[0].bitrate(), 250_000);
        assert_eq!(interfaces[1].name(), "can2");
        assert_ne!(interfaces[1].id(), can0);
        assert!(interfaces.iter().all(|intf| intf.id() != can0));
    }
}
