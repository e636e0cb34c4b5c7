//! SocketCAN discovery
//!
//! Linux exposes every network device under `/sys/class/net/<ifname>`. A
//! device is a CAN netdev when its `type` attribute reads 280 (ARPHRD_CAN).
//! The scan root is configurable so tests can point it at a fake tree.

use super::{sync_interfaces, CanDriver, CanInterface, DiscoveredChannel};
use crate::types::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Link type of CAN netdevs
pub const ARPHRD_CAN: u16 = 280;

/// Driver for Linux SocketCAN netdevs (can0, vcan0, slcan0, ...)
#[derive(Debug)]
pub struct SocketCanDriver {
    root: PathBuf,
    default_bitrate: u32,
    interfaces: Vec<CanInterface>,
}

impl SocketCanDriver {
    pub const NAME: &'static str = "SocketCAN";
    pub const DEFAULT_ROOT: &'static str = "/sys/class/net";

    pub fn new() -> Self {
        Self::with_root(Self::DEFAULT_ROOT)
    }

    /// Scan `root` instead of `/sys/class/net`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_bitrate: 500_000,
            interfaces: Vec::new(),
        }
    }

    /// Builder method: bitrate reported for newly discovered netdevs
    pub fn with_default_bitrate(mut self, bitrate: u32) -> Self {
        self.default_bitrate = bitrate;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&self) -> Result<Vec<DiscoveredChannel>> {
        if !self.root.is_dir() {
            log::warn!("{}: {:?} does not exist, no interfaces", Self::NAME, self.root);
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let type_path = entry.path().join("type");
            let Ok(link_type) = fs::read_to_string(&type_path) else {
                log::trace!("{}: no link type at {:?}", Self::NAME, type_path);
                continue;
            };
            if link_type.trim().parse::<u16>().ok() == Some(ARPHRD_CAN) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        // read_dir order is unspecified
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| DiscoveredChannel::with_default_bitrates(name, self.default_bitrate))
            .collect())
    }
}

impl Default for SocketCanDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CanDriver for SocketCanDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update(&mut self) -> Result<()> {
        let discovered = self.scan()?;
        sync_interfaces(Self::NAME, &mut self.interfaces, discovered);
        log::info!(
            "{}: {} interface(s) under {:?}",
            Self::NAME,
            self.interfaces.len(),
            self.root
        );
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
    use crate::driver::DEFAULT_BITRATES;
    use tempfile::TempDir;

    fn add_netdev(root: &Path, name: &str, link_type: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(link_type) = link_type {
            fs::write(dir.join("type"), link_type).unwrap();
        }
    }

    fn names(driver: &SocketCanDriver) -> Vec<&str> {
        driver.interfaces().iter().map(|i| i.name()).collect()
    }

    #[test]
    fn test_discovers_only_can_netdevs() {
        let sysfs = TempDir::new().unwrap();
        add_netdev(sysfs.path(), "vcan1", Some("280\n"));
        add_netdev(sysfs.path(), "eth0", Some("1\n"));
        add_netdev(sysfs.path(), "can0", Some("280\n"));
        add_netdev(sysfs.path(), "lo", None);

        let mut driver = SocketCanDriver::with_root(sysfs.path()).with_default_bitrate(250_000);
        driver.update().unwrap();

        assert_eq!(names(&driver), vec!["can0", "vcan1"]);
        let can0 = &driver.interfaces()[0];
        assert_eq!(can0.driver_name(), SocketCanDriver::NAME);
        assert_eq!(can0.bitrate(), 250_000);
        assert_eq!(can0.available_bitrates(), &DEFAULT_BITRATES[..]);
    }

    #[test]
    fn test_missing_root_yields_no_interfaces() {
        let sysfs = TempDir::new().unwrap();
        let mut driver = SocketCanDriver::with_root(sysfs.path().join("absent"));
        driver.update().unwrap();
        assert!(driver.interfaces().is_empty());
    }

    #[test]
    fn test_hot_unplug() {
        let sysfs = TempDir::new().unwrap();
        add_netdev(sysfs.path(), "can0", Some("280"));
        add_netdev(sysfs.path(), "can1", Some("280"));

        let mut driver = SocketCanDriver::with_root(sysfs.path());
        driver.update().unwrap();
        let can0 = driver.interfaces()[0].id();
        let can1 = driver.interfaces()[1].id();

        fs::remove_dir_all(sysfs.path().join("can0")).unwrap();
        driver.update().unwrap();

        assert_eq!(names(&driver), vec!["can1"]);
        assert!(driver.interface(can0).is_none());
        assert!(driver.has_interface(can1));
    }
}
