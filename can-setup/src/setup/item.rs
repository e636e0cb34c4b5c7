//! Typed tree items
//!
//! A presentation layer shows a setup as a tree: each network has an
//! "Interfaces" folder and a "CAN Databases" folder. [`SetupItem`] names one
//! node of that tree without pointing into the model.

use crate::types::{CanInterfaceId, NetworkId};
use serde::Serialize;
use std::path::PathBuf;

/// One node of the setup tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupItem {
    Network(NetworkId),
    InterfaceRoot(NetworkId),
    Interface(NetworkId, CanInterfaceId),
    DatabaseRoot(NetworkId),
    Database(NetworkId, PathBuf),
}

/// Context actions offered on a tree item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    DeleteNetwork,
    AddInterface,
    DeleteInterface,
    AddDatabase,
    DeleteDatabase,
}

impl SetupItem {
    /// Network the item belongs to
    pub fn network(&self) -> NetworkId {
        match self {
            SetupItem::Network(id)
            | SetupItem::InterfaceRoot(id)
            | SetupItem::Interface(id, _)
            | SetupItem::DatabaseRoot(id)
            | SetupItem::Database(id, _) => *id,
        }
    }

    /// Nesting level: networks are 0, folders 1, leaves 2
    pub fn depth(&self) -> usize {
        match self {
            SetupItem::Network(_) => 0,
            SetupItem::InterfaceRoot(_) | SetupItem::DatabaseRoot(_) => 1,
            SetupItem::Interface(..) | SetupItem::Database(..) => 2,
        }
    }

    pub fn parent(&self) -> Option<SetupItem> {
        match self {
            SetupItem::Network(_) => None,
            SetupItem::InterfaceRoot(id) | SetupItem::DatabaseRoot(id) => {
                Some(SetupItem::Network(*id))
            }
            SetupItem::Interface(id, _) => Some(SetupItem::InterfaceRoot(*id)),
            SetupItem::Database(id, _) => Some(SetupItem::DatabaseRoot(*id)),
        }
    }

    pub fn actions(&self) -> &'static [ItemAction] {
        match self {
            SetupItem::Network(_) => &[ItemAction::DeleteNetwork],
            SetupItem::InterfaceRoot(_) => &[ItemAction::AddInterface],
            SetupItem::Interface(..) => &[ItemAction::DeleteInterface],
            SetupItem::DatabaseRoot(_) => &[ItemAction::AddDatabase],
            SetupItem::Database(..) => &[ItemAction::DeleteDatabase],
        }
    }
}

/// Display columns of a tree item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDescription {
    pub item: SetupItem,
    pub label: String,
    pub driver: Option<String>,
    pub bitrate: Option<u32>,
    pub filename: Option<String>,
    pub path: Option<PathBuf>,
    /// False when an interface reference no longer resolves
    pub available: bool,
}

impl ItemDescription {
    pub(crate) fn label(item: SetupItem, label: impl Into<String>) -> Self {
        Self {
            item,
            label: label.into(),
            driver: None,
            bitrate: None,
            filename: None,
            path: None,
            available: true,
        }
    }
}
