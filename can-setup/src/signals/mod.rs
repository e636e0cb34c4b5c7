//! CAN databases and the DBC loader
//!
//! The setup model treats a loaded database as an opaque, shared handle. The
//! message table inside is still queryable for display and lookups.

pub mod database;
pub mod dbc;

// Re-export key types for convenience
pub use database::{
    ByteOrder, CanDatabase, DatabaseStats, MessageDefinition, MultiplexerInfo, SignalDefinition,
    ValueType,
};
