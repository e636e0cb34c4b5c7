//! DBC file loader
//!
//! Parses Vector DBC files with the `can-dbc` crate and converts them into a
//! [`CanDatabase`].

use crate::signals::database::{
    ByteOrder, CanDatabase, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
};
use crate::types::LoadError;
use std::path::Path;

/// Load a DBC file into a database
pub fn load_database(path: &Path) -> Result<CanDatabase, LoadError> {
    let messages = parse_dbc_file(path)?;
    Ok(CanDatabase::new(path, messages))
}

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>, LoadError> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read as bytes first, DBC files are often not UTF-8
    let bytes = std::fs::read(path).map_err(|e| LoadError::from_io(path, e))?;

    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            // Latin-1 maps every byte to the code point of the same value
            log::warn!("DBC file {:?} is not UTF-8, trying Latin-1 encoding", path);
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        LoadError::ParseError {
            path: path.to_path_buf(),
            message: format!("{:?}", e),
        }
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    let messages = dbc
        .messages()
        .iter()
        .map(|dbc_msg| convert_message(dbc_msg, &source_filename))
        .collect::<Result<Vec<_>, String>>()
        .map_err(|message| LoadError::ParseError {
            path: path.to_path_buf(),
            message,
        })?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message, source: &str) -> Result<MessageDefinition, String> {
    let mut is_multiplexed = false;
    let mut multiplexer_signal_name: Option<String> = None;

    // First pass: identify multiplexer signal
    for dbc_sig in dbc_msg.signals() {
        match dbc_sig.multiplexer_indicator() {
            can_dbc::MultiplexIndicator::Multiplexor => {
                is_multiplexed = true;
                multiplexer_signal_name = Some(dbc_sig.name().to_string());
                break;
            }
            can_dbc::MultiplexIndicator::MultiplexedSignal(_) => is_multiplexed = true,
            _ => {}
        }
    }

    // Second pass: convert all signals
    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| convert_signal(dbc_sig, multiplexer_signal_name.as_deref()))
        .collect::<Result<Vec<_>, String>>()?;

    Ok(MessageDefinition {
        id: dbc_msg.message_id().0,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
) -> Result<SignalDefinition, String> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => Some(MultiplexerInfo {
            multiplexer_signal: multiplexer_signal_name
                .ok_or_else(|| {
                    format!(
                        "Multiplexed signal '{}' but no multiplexer found",
                        dbc_sig.name()
                    )
                })?
                .to_string(),
            multiplexer_values: vec![switch_value as u64],
        }),
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        multiplexer_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const POWERTRAIN_DBC: &str = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_
    CAT_DEF_
    CAT_
    FILTER
    BA_DEF_DEF_
    EV_DATA_
    ENVVAR_DATA_
    SGTYPE_
    SGTYPE_VAL_
    BA_DEF_SGTYPE_
    BA_SGTYPE_
    SIG_TYPE_REF_
    VAL_TABLE_
    SIG_GROUP_
    SIG_VALTYPE_
    SIGTYPE_VALTYPE_
    BO_TX_BU_
    BA_DEF_REL_
    BA_REL_
    BA_SGTYPE_REL_
    SG_MUL_VAL_

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@1+ (1,-40) [-40|215] "C" ECU2

BO_ 512 BatteryStatus: 8 ECU1
 SG_ BatteryVoltage : 0|16@1+ (0.01,0) [0|16] "V" ECU2
"#;

    fn write_temp(content: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_load_simple_dbc() {
        let temp_file = write_temp(POWERTRAIN_DBC.as_bytes());

        let db = load_database(temp_file.path()).unwrap();

        assert_eq!(db.stats().num_messages, 2);
        assert_eq!(db.stats().num_signals, 3);
        assert_eq!(db.path(), temp_file.path());

        let engine = db.message(291).unwrap();
        assert_eq!(engine.name, "EngineData");
        assert_eq!(engine.size, 8);
        assert_eq!(engine.sender, Some("ECU1".to_string()));

        let speed = &engine.signals[0];
        assert_eq!(speed.name, "EngineSpeed");
        assert_eq!(speed.start_bit, 0);
        assert_eq!(speed.length, 16);
        assert_eq!(speed.unit, Some("rpm".to_string()));

        assert_eq!(db.message_by_name("BatteryStatus").unwrap().id, 512);
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;
        let temp_file = write_temp(dbc_content.as_bytes());

        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert!(msg.is_multiplexed);
        assert_eq!(msg.multiplexer_signal, Some("Mode".to_string()));

        let sig_a = msg.signals.iter().find(|s| s.name == "SignalA").unwrap();
        assert_eq!(
            sig_a.multiplexer_info.as_ref().unwrap().multiplexer_signal,
            "Mode"
        );
    }

    #[test]
    fn test_latin1_fallback() {
        let content = POWERTRAIN_DBC.replace("\"rpm\"", "\"\u{00B0}C\"");
        // encode as Latin-1: the degree sign becomes the single byte 0xB0
        let latin1: Vec<u8> = content.chars().map(|c| c as u32 as u8).collect();
        let temp_file = write_temp(&latin1);

        let db = load_database(temp_file.path()).unwrap();
        let speed = &db.message(291).unwrap().signals[0];
        assert_eq!(speed.unit.as_deref(), Some("\u{00B0}C"));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_dbc_file(Path::new("/definitely/not/here.dbc")).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let temp_file = write_temp(b"this is not a dbc file\n");
        let err = load_database(temp_file.path()).unwrap_err();
        assert!(matches!(err, LoadError::ParseError { .. }));
    }
}
