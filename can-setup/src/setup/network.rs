//! Networks and their per-interface settings

use crate::driver::CanInterface;
use crate::signals::CanDatabase;
use crate::types::{CanInterfaceId, NetworkId, Reference, Result, SetupError};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

/// Valid sample points, in permille of the bit time
pub const SAMPLE_POINT_RANGE: RangeInclusive<u16> = 500..=950;

/// Valid synchronisation jump widths, in time quanta
pub const SJW_RANGE: RangeInclusive<u8> = 1..=128;

/// Who picks the bit timing of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// The driver derives sample points and SJW from the bitrate
    #[default]
    Automatic,
    /// Sample points and SJW are taken from the settings
    Manual,
}

/// Sample point and SJW of one bit-rate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitTiming {
    pub sample_point_permille: u16,
    pub sjw: Option<u8>,
}

/// How a network wants one of its interfaces to be set up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSettings {
    /// Push these settings to the interface when a measurement starts
    #[serde(default)]
    pub configure: bool,

    /// Arbitration bitrate, None keeps the interface's current bitrate
    #[serde(default)]
    pub bitrate: Option<u32>,

    /// Sample points and SJW only count in manual mode
    #[serde(default)]
    pub timing: TimingMode,

    #[serde(default = "default_sample_point")]
    pub sample_point_permille: u16,

    /// Synchronisation jump width, None lets the driver choose
    #[serde(default)]
    pub sjw: Option<u8>,

    /// CAN FD data phase, None for classic CAN
    #[serde(default)]
    pub fd: Option<FdSettings>,

    /// Automatic restart delay after bus-off, None disables it
    #[serde(default)]
    pub restart_ms: Option<u32>,
}

/// CAN FD data phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FdSettings {
    pub bitrate: u32,
    #[serde(default = "default_sample_point")]
    pub sample_point_permille: u16,
    /// Data phase SJW, None lets the driver choose
    #[serde(default)]
    pub sjw: Option<u8>,
}

fn default_sample_point() -> u16 {
    875
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            configure: false,
            bitrate: None,
            timing: TimingMode::Automatic,
            sample_point_permille: default_sample_point(),
            sjw: None,
            fd: None,
            restart_ms: None,
        }
    }
}

impl InterfaceSettings {
    /// Settings that configure the interface with `bitrate`
    pub fn with_bitrate(bitrate: u32) -> Self {
        Self {
            configure: true,
            bitrate: Some(bitrate),
            ..Self::default()
        }
    }

    /// Builder method: choose automatic or manual bit timing
    pub fn with_timing(mut self, timing: TimingMode) -> Self {
        self.timing = timing;
        self
    }

    /// Builder method: set the arbitration sample point (switches to manual timing)
    pub fn with_sample_point(mut self, permille: u16) -> Self {
        self.timing = TimingMode::Manual;
        self.sample_point_permille = permille;
        self
    }

    /// Builder method: set the synchronisation jump width (switches to manual timing)
    pub fn with_sjw(mut self, sjw: u8) -> Self {
        self.timing = TimingMode::Manual;
        self.sjw = Some(sjw);
        self
    }

    /// Builder method: enable CAN FD with the given data bitrate
    pub fn with_fd(mut self, bitrate: u32) -> Self {
        self.fd = Some(FdSettings {
            bitrate,
            sample_point_permille: default_sample_point(),
            sjw: None,
        });
        self
    }

    /// Builder method: set the FD data sample point (switches to manual timing)
    ///
    /// Has no effect unless [`with_fd`](Self::with_fd) was called first.
    pub fn with_fd_sample_point(mut self, permille: u16) -> Self {
        if let Some(fd) = self.fd.as_mut() {
            fd.sample_point_permille = permille;
            self.timing = TimingMode::Manual;
        }
        self
    }

    /// Builder method: set the FD data SJW (switches to manual timing)
    ///
    /// Has no effect unless [`with_fd`](Self::with_fd) was called first.
    pub fn with_fd_sjw(mut self, sjw: u8) -> Self {
        if let Some(fd) = self.fd.as_mut() {
            fd.sjw = Some(sjw);
            self.timing = TimingMode::Manual;
        }
        self
    }

    /// Builder method: restart automatically after bus-off
    pub fn with_restart_ms(mut self, restart_ms: u32) -> Self {
        self.restart_ms = Some(restart_ms);
        self
    }

    /// Arbitration timing to apply, None when the driver picks it
    pub fn arbitration_timing(&self) -> Option<BitTiming> {
        match self.timing {
            TimingMode::Automatic => None,
            TimingMode::Manual => Some(BitTiming {
                sample_point_permille: self.sample_point_permille,
                sjw: self.sjw,
            }),
        }
    }

    /// FD data timing to apply, None for classic CAN or automatic timing
    pub fn data_timing(&self) -> Option<BitTiming> {
        match (self.timing, &self.fd) {
            (TimingMode::Manual, Some(fd)) => Some(BitTiming {
                sample_point_permille: fd.sample_point_permille,
                sjw: fd.sjw,
            }),
            _ => None,
        }
    }

    /// Check these settings against the live interface
    ///
    /// Sample points and SJW are only checked in manual timing mode.
    pub fn validate(&self, interface: &CanInterface) -> Result<()> {
        if let Some(bitrate) = self.bitrate {
            if !interface.supports_bitrate(bitrate) {
                return Err(SetupError::InvalidBitrate {
                    interface: interface.id(),
                    bitrate,
                    available: interface.available_bitrates().to_vec(),
                });
            }
        }

        if let Some(fd) = &self.fd {
            let arbitration = self.bitrate.unwrap_or_else(|| interface.bitrate());
            if fd.bitrate == 0 || fd.bitrate < arbitration {
                return Err(SetupError::InvalidSettings(format!(
                    "FD data bitrate {} must be at least the arbitration bitrate {}",
                    fd.bitrate, arbitration
                )));
            }
        }

        if let Some(timing) = self.arbitration_timing() {
            check_timing("", timing)?;
        }
        if let Some(timing) = self.data_timing() {
            check_timing("FD ", timing)?;
        }

        if self.restart_ms == Some(0) {
            return Err(SetupError::InvalidSettings(
                "restart delay must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_timing(phase: &str, timing: BitTiming) -> Result<()> {
    check_sample_point(&format!("{}sample point", phase), timing.sample_point_permille)?;

    if let Some(sjw) = timing.sjw {
        if !SJW_RANGE.contains(&sjw) {
            return Err(SetupError::InvalidSettings(format!(
                "{}SJW {} outside {:?}",
                phase, sjw, SJW_RANGE
            )));
        }
    }
    Ok(())
}

fn check_sample_point(what: &str, permille: u16) -> Result<()> {
    if SAMPLE_POINT_RANGE.contains(&permille) {
        Ok(())
    } else {
        Err(SetupError::InvalidSettings(format!(
            "{} {}.{}% outside {}%..{}%",
            what,
            permille / 10,
            permille % 10,
            SAMPLE_POINT_RANGE.start() / 10,
            SAMPLE_POINT_RANGE.end() / 10
        )))
    }
}

/// A network's reference to one interface
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementInterface {
    interface: CanInterfaceId,
    settings: InterfaceSettings,
}

impl MeasurementInterface {
    pub fn new(interface: CanInterfaceId) -> Self {
        Self {
            interface,
            settings: InterfaceSettings::default(),
        }
    }

    pub fn can_interface(&self) -> CanInterfaceId {
        self.interface
    }

    pub fn settings(&self) -> &InterfaceSettings {
        &self.settings
    }

    pub(crate) fn set_settings(&mut self, settings: InterfaceSettings) {
        self.settings = settings;
    }
}

/// A named group of interfaces and databases
///
/// Interfaces are referenced by id and never owned. Databases are shared with
/// every other network that loaded the same file.
#[derive(Debug)]
pub struct Network {
    id: NetworkId,
    name: String,
    interfaces: Vec<MeasurementInterface>,
    databases: Vec<Arc<CanDatabase>>,
}

impl Network {
    pub(crate) fn new(id: NetworkId, name: String) -> Self {
        Self {
            id,
            name,
            interfaces: Vec::new(),
            databases: Vec::new(),
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Interface references in display order
    pub fn interfaces(&self) -> &[MeasurementInterface] {
        &self.interfaces
    }

    pub fn interface(&self, id: CanInterfaceId) -> Option<&MeasurementInterface> {
        self.interfaces.iter().find(|mi| mi.interface == id)
    }

    pub(crate) fn interface_mut(&mut self, id: CanInterfaceId) -> Option<&mut MeasurementInterface> {
        self.interfaces.iter_mut().find(|mi| mi.interface == id)
    }

    /// Ids of all referenced interfaces
    pub fn referenced_interfaces(&self) -> Vec<CanInterfaceId> {
        self.interfaces.iter().map(|mi| mi.interface).collect()
    }

    pub fn references_interface(&self, id: CanInterfaceId) -> bool {
        self.interface(id).is_some()
    }

    /// Shared database handles in display order
    pub fn databases(&self) -> &[Arc<CanDatabase>] {
        &self.databases
    }

    pub fn database(&self, path: &Path) -> Option<&Arc<CanDatabase>> {
        self.databases.iter().find(|db| db.path() == path)
    }

    pub(crate) fn add_interface(&mut self, id: CanInterfaceId) -> Result<()> {
        if self.references_interface(id) {
            return Err(SetupError::DuplicateReference {
                network: self.id,
                reference: Reference::Interface(id),
            });
        }
        self.interfaces.push(MeasurementInterface::new(id));
        Ok(())
    }

    pub(crate) fn remove_interface(&mut self, id: CanInterfaceId) -> bool {
        let before = self.interfaces.len();
        self.interfaces.retain(|mi| mi.interface != id);
        before != self.interfaces.len()
    }

    pub(crate) fn add_database(&mut self, database: Arc<CanDatabase>) -> Result<()> {
        if self.database(database.path()).is_some() {
            return Err(SetupError::DuplicateReference {
                network: self.id,
                reference: Reference::Database(database.path().to_path_buf()),
            });
        }
        self.databases.push(database);
        Ok(())
    }

    pub(crate) fn remove_database(&mut self, path: &Path) -> bool {
        let before = self.databases.len();
        self.databases.retain(|db| db.path() != path);
        before != self.databases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_interface() -> CanInterface {
        CanInterface::new("Test", "can0", 500_000, vec![125_000, 250_000, 500_000])
    }

    #[test]
    fn test_duplicate_interface_rejected() {
        let mut network = Network::new(NetworkId(1), "Network 1".to_string());
        let intf = CanInterfaceId::next();

        network.add_interface(intf).unwrap();
        let err = network.add_interface(intf).unwrap_err();
        assert!(matches!(err, SetupError::DuplicateReference { .. }));
        assert_eq!(network.referenced_interfaces(), vec![intf]);
    }

    #[test]
    fn test_interface_order_is_insertion_order() {
        let mut network = Network::new(NetworkId(1), "Network 1".to_string());
        let ids: Vec<_> = (0..3).map(|_| CanInterfaceId::next()).collect();
        for id in ids.iter().rev() {
            network.add_interface(*id).unwrap();
        }
        let expected: Vec<_> = ids.iter().rev().copied().collect();
        assert_eq!(network.referenced_interfaces(), expected);

        assert!(network.remove_interface(ids[1]));
        assert!(!network.remove_interface(ids[1]));
        assert_eq!(network.referenced_interfaces(), vec![ids[2], ids[0]]);
    }

    #[test]
    fn test_duplicate_database_rejected() {
        let mut network = Network::new(NetworkId(1), "Network 1".to_string());
        let db = Arc::new(CanDatabase::new("/data/body.dbc", Vec::new()));

        network.add_database(Arc::clone(&db)).unwrap();
        assert!(network.add_database(Arc::clone(&db)).is_err());
        assert_eq!(Arc::strong_count(&db), 2);

        assert!(network.remove_database(Path::new("/data/body.dbc")));
        assert_eq!(Arc::strong_count(&db), 1);
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(InterfaceSettings::default().validate(&live_interface()).is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let intf = live_interface();

        let err = InterfaceSettings::with_bitrate(1_000_000)
            .validate(&intf)
            .unwrap_err();
        assert!(matches!(err, SetupError::InvalidBitrate { bitrate: 1_000_000, .. }));

        let bad = [
            InterfaceSettings::with_bitrate(250_000).with_sample_point(980),
            InterfaceSettings::with_bitrate(250_000).with_sjw(0),
            InterfaceSettings::with_bitrate(250_000).with_fd(125_000),
            InterfaceSettings::with_bitrate(250_000)
                .with_fd(2_000_000)
                .with_fd_sample_point(400),
            InterfaceSettings::with_bitrate(250_000)
                .with_fd(2_000_000)
                .with_fd_sjw(0),
            InterfaceSettings::with_bitrate(250_000).with_restart_ms(0),
        ];
        for settings in &bad {
            assert!(
                matches!(settings.validate(&intf), Err(SetupError::InvalidSettings(_))),
                "{:?} should be rejected",
                settings
            );
        }

        let good = InterfaceSettings::with_bitrate(250_000)
            .with_sample_point(800)
            .with_sjw(2)
            .with_fd(2_000_000)
            .with_fd_sample_point(750)
            .with_fd_sjw(4)
            .with_restart_ms(100);
        assert!(good.validate(&intf).is_ok());
    }

    #[test]
    fn test_automatic_timing_ignores_sample_point_and_sjw() {
        let intf = live_interface();

        let mut settings = InterfaceSettings::with_bitrate(250_000).with_fd(2_000_000);
        settings.sample_point_permille = 300;
        settings.sjw = Some(0);
        if let Some(fd) = settings.fd.as_mut() {
            fd.sample_point_permille = 990;
            fd.sjw = Some(0);
        }

        assert_eq!(settings.timing, TimingMode::Automatic);
        assert!(settings.validate(&intf).is_ok());
        assert_eq!(settings.arbitration_timing(), None);
        assert_eq!(settings.data_timing(), None);

        // the same values are rejected once the timing is manual
        let manual = settings.with_timing(TimingMode::Manual);
        assert!(matches!(
            manual.validate(&intf),
            Err(SetupError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_manual_timing_exposes_both_phases() {
        let settings = InterfaceSettings::with_bitrate(500_000)
            .with_sample_point(800)
            .with_fd(2_000_000)
            .with_fd_sjw(3);

        assert_eq!(settings.timing, TimingMode::Manual);
        assert_eq!(
            settings.arbitration_timing(),
            Some(BitTiming { sample_point_permille: 800, sjw: None })
        );
        assert_eq!(
            settings.data_timing(),
            Some(BitTiming { sample_point_permille: 875, sjw: Some(3) })
        );
    }

    #[test]
    fn test_fd_builders_need_fd() {
        let settings = InterfaceSettings::with_bitrate(500_000).with_fd_sjw(3);
        assert!(settings.fd.is_none());
        assert_eq!(settings.timing, TimingMode::Automatic);
    }
}
