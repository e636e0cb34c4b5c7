//! Virtual CAN driver
//!
//! Channels are declared up front (usually from [`BackendConfig`]) or added at
//! runtime. Removing a channel and calling [`CanDriver::update`] behaves like
//! unplugging the hardware.
//!
//! [`BackendConfig`]: crate::BackendConfig

use super::{sync_interfaces, CanDriver, CanInterface, DiscoveredChannel, DEFAULT_BITRATES};
use crate::config::VirtualChannelConfig;
use crate::types::Result;

/// Driver for software-defined CAN channels
#[derive(Debug, Default)]
pub struct VirtualCanDriver {
    channels: Vec<DiscoveredChannel>,
    interfaces: Vec<CanInterface>,
}

impl VirtualCanDriver {
    pub const NAME: &'static str = "VirtualCAN";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build the driver from configured channels
    pub fn from_config(channels: &[VirtualChannelConfig], default_bitrate: u32) -> Self {
        let mut driver = Self::new();
        for channel in channels {
            driver.add_channel(
                channel.name.clone(),
                channel.bitrate.unwrap_or(default_bitrate),
                channel
                    .bitrates
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BITRATES.to_vec()),
            );
        }
        driver
    }

    /// Builder method: declare a channel
    pub fn with_channel(mut self, name: impl Into<String>, bitrate: u32, available: Vec<u32>) -> Self {
        self.add_channel(name, bitrate, available);
        self
    }

    /// Declare a channel; it shows up on the next [`CanDriver::update`]
    pub fn add_channel(&mut self, name: impl Into<String>, bitrate: u32, available: Vec<u32>) {
        let name = name.into();
        if self.channels.iter().any(|c| c.name == name) {
            log::warn!("Virtual channel {} declared twice, ignoring", name);
            return;
        }
        self.channels.push(DiscoveredChannel {
            name,
            bitrate,
            available_bitrates: available,
        });
    }

    /// Withdraw a channel; its interface goes away on the next update
    pub fn remove_channel(&mut self, name: &str) -> bool {
        let before = self.channels.len();
        self.channels.retain(|c| c.name != name);
        before != self.channels.len()
    }
}

impl CanDriver for VirtualCanDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update(&mut self) -> Result<()> {
        sync_interfaces(Self::NAME, &mut self.interfaces, self.channels.clone());
        log::debug!("{}: {} interface(s)", Self::NAME, self.interfaces.len());
        Ok(())
    }

    fn interfaces(&self) -> &[CanInterface] {
        &self.interfaces
    }

    fn interfaces_mut(&mut self) -> &mut [CanInterface] {
        &mut self.interfaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_appear_after_update() {
        let mut driver = VirtualCanDriver::new().with_channel("vcan0", 500_000, vec![500_000]);
        assert!(driver.interfaces().is_empty());

        driver.update().unwrap();
        assert_eq!(driver.interfaces().len(), 1);
        assert_eq!(driver.interfaces()[0].name(), "vcan0");
        assert_eq!(driver.interfaces()[0].driver_name(), VirtualCanDriver::NAME);
    }

    #[test]
    fn test_removed_channel_is_unresolvable() {
        let mut driver = VirtualCanDriver::new()
            .with_channel("vcan0", 500_000, DEFAULT_BITRATES.to_vec())
            .with_channel("vcan1", 250_000, DEFAULT_BITRATES.to_vec());
        driver.update().unwrap();
        let vcan0 = driver.interfaces()[0].id();
        let vcan1 = driver.interfaces()[1].id();

        assert!(driver.remove_channel("vcan0"));
        assert!(!driver.remove_channel("vcan0"));
        driver.update().unwrap();

        assert!(!driver.has_interface(vcan0));
        assert!(driver.interface(vcan0).is_none());
        assert_eq!(driver.interface(vcan1).map(|i| i.bitrate()), Some(250_000));
    }

    #[test]
    fn test_from_config_applies_defaults() {
        let channels = vec![
            VirtualChannelConfig::new("vcan0"),
            VirtualChannelConfig {
                name: "vcan1".to_string(),
                bitrate: Some(125_000),
                bitrates: Some(vec![125_000, 250_000, 500_000]),
            },
        ];
        let mut driver = VirtualCanDriver::from_config(&channels, 500_000);
        driver.update().unwrap();

        let intfs = driver.interfaces();
        assert_eq!(intfs[0].bitrate(), 500_000);
        assert_eq!(intfs[0].available_bitrates(), &DEFAULT_BITRATES[..]);
        assert_eq!(intfs[1].bitrate(), 125_000);
        assert_eq!(intfs[1].available_bitrates(), &[125_000, 250_000, 500_000][..]);
    }

    #[test]
    fn test_duplicate_channel_ignored() {
        let mut driver = VirtualCanDriver::new()
            .with_channel("vcan0", 500_000, vec![500_000])
            .with_channel("vcan0", 250_000, vec![250_000]);
        driver.update().unwrap();
        assert_eq!(driver.interfaces().len(), 1);
        assert_eq!(driver.interfaces()[0].bitrate(), 500_000);
    }
}
