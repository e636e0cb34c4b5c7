//! Loaded CAN database
//!
//! A [`CanDatabase`] is the immutable result of loading one DBC file. Networks
//! hold it through an `Arc`, so the table is parsed once and shared.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A complete CAN message definition
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file name
    pub source: String,
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDefinition {
    pub name: String,
    /// Start bit in the CAN frame
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    pub min: f64,
    pub max: f64,
    /// Engineering unit (e.g., "km/h", "V")
    pub unit: Option<String>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Signed,
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// A loaded DBC file
#[derive(Debug)]
pub struct CanDatabase {
    filename: String,
    path: PathBuf,
    loaded_at: DateTime<Utc>,
    messages: Vec<MessageDefinition>,

    /// Key: CAN ID, Value: index into `messages` (first definition wins)
    by_id: HashMap<u32, usize>,

    /// Key: message name, Value: index into `messages`
    by_name: HashMap<String, usize>,
}

impl CanDatabase {
    /// Build a database from already parsed messages
    pub fn new(path: impl Into<PathBuf>, messages: Vec<MessageDefinition>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, message) in messages.iter().enumerate() {
            by_id.entry(message.id).or_insert(idx);
            by_name.entry(message.name.clone()).or_insert(idx);
        }

        Self {
            filename,
            path,
            loaded_at: Utc::now(),
            messages,
            by_id,
            by_name,
        }
    }

    /// File name without directory
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Canonical path the database was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn messages(&self) -> &[MessageDefinition] {
        &self.messages
    }

    /// Get a message definition by CAN ID
    pub fn message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.by_id.get(&can_id).map(|&idx| &self.messages[idx])
    }

    /// Get a message definition by name
    pub fn message_by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.by_name.get(name).map(|&idx| &self.messages[idx])
    }

    /// Find all messages containing a specific signal name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(u32, &SignalDefinition)> {
        self.messages
            .iter()
            .flat_map(|msg| {
                msg.signals
                    .iter()
                    .filter(move |sig| sig.name == signal_name)
                    .map(move |sig| (msg.id, sig))
            })
            .collect()
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.iter().map(|m| m.signals.len()).sum(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}
