//! Core types for the CAN setup library
//!
//! Identifiers shared between the driver layer and the setup model, and the
//! error taxonomy every operation reports through. None of these errors is
//! fatal: each one is meant to be handled at the call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Result type for setup operations
pub type Result<T> = std::result::Result<T, SetupError>;

static NEXT_INTERFACE_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque identifier of a CAN interface
///
/// Ids are handed out by the drivers when they enumerate their hardware and
/// stay valid for the whole session. An id is never reused, so a reference to
/// a vanished interface stays unresolved instead of pointing at a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanInterfaceId(u32);

impl CanInterfaceId {
    /// Allocate a fresh, process-wide unique id
    pub(crate) fn next() -> Self {
        Self(NEXT_INTERFACE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CanInterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if#{}", self.0)
    }
}

/// Identifier of a network within its measurement setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub(crate) u32);

impl NetworkId {
    /// Raw numeric value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// Something a network refers to, or the network itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Interface(CanInterfaceId),
    Network(NetworkId),
    Database(PathBuf),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Interface(id) => write!(f, "interface {}", id),
            Reference::Network(id) => write!(f, "network {}", id),
            Reference::Database(path) => write!(f, "database {:?}", path),
        }
    }
}

/// Errors raised while loading a CAN database
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("DBC file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse DBC file {path:?}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Failed to read DBC file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Classify an I/O failure on `path`
    pub(crate) fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    /// Path of the file that failed to load
    pub fn path(&self) -> &Path {
        match self {
            LoadError::FileNotFound { path }
            | LoadError::ParseError { path, .. }
            | LoadError::Io { path, .. } => path,
        }
    }
}

/// Errors reported by the setup model, the drivers and the backend
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(Reference),

    #[error("{reference} is already referenced by network {network}")]
    DuplicateReference {
        network: NetworkId,
        reference: Reference,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Bitrate {bitrate} is not supported by interface {interface} (available: {available:?})")]
    InvalidBitrate {
        interface: CanInterfaceId,
        bitrate: u32,
        available: Vec<u32>,
    },

    #[error("Invalid interface settings: {0}")]
    InvalidSettings(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
