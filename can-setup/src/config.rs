//! Backend configuration types
//!
//! This module defines which drivers the backend registers and how it treats
//! loaded CAN databases. Everything has a default, so an empty TOML table is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Virtual channels to expose through the VirtualCAN driver
    #[serde(default)]
    pub virtual_channels: Vec<VirtualChannelConfig>,

    /// Whether to register the SocketCAN driver (default: on Linux only)
    #[serde(default = "default_socketcan")]
    pub socketcan: bool,

    /// Directory scanned for SocketCAN netdevs
    #[serde(default = "default_socketcan_root")]
    pub socketcan_root: PathBuf,

    /// Bitrate reported for channels that do not specify one (default: 500 kbit/s)
    #[serde(default = "default_bitrate")]
    pub default_bitrate: u32,

    /// Share one parsed database per canonical path (default: true)
    #[serde(default = "default_true")]
    pub cache_databases: bool,
}

fn default_socketcan() -> bool {
    cfg!(target_os = "linux")
}

fn default_socketcan_root() -> PathBuf {
    PathBuf::from(crate::driver::SocketCanDriver::DEFAULT_ROOT)
}

fn default_bitrate() -> u32 {
    500_000
}

fn default_true() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            virtual_channels: Vec::new(),
            socketcan: default_socketcan(),
            socketcan_root: default_socketcan_root(),
            default_bitrate: default_bitrate(),
            cache_databases: true,
        }
    }
}

/// A virtual channel declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualChannelConfig {
    /// Channel name, e.g. "vcan0"
    pub name: String,

    /// Initial bitrate (falls back to `default_bitrate`)
    #[serde(default)]
    pub bitrate: Option<u32>,

    /// Supported bitrates (falls back to the standard CAN set)
    #[serde(default)]
    pub bitrates: Option<Vec<u32>>,
}

impl VirtualChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bitrate: None,
            bitrates: None,
        }
    }
}

impl BackendConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a virtual channel
    pub fn with_virtual_channel(mut self, name: impl Into<String>) -> Self {
        self.virtual_channels.push(VirtualChannelConfig::new(name));
        self
    }

    /// Builder method: enable or disable SocketCAN discovery
    pub fn with_socketcan(mut self, enabled: bool) -> Self {
        self.socketcan = enabled;
        self
    }

    /// Builder method: scan another directory for SocketCAN netdevs
    pub fn with_socketcan_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.socketcan_root = root.into();
        self
    }

    /// Builder method: set the fallback bitrate
    pub fn with_default_bitrate(mut self, bitrate: u32) -> Self {
        self.default_bitrate = bitrate;
        self
    }

    /// Builder method: enable or disable the database cache
    pub fn with_database_cache(mut self, enabled: bool) -> Self {
        self.cache_databases = enabled;
        self
    }
}
