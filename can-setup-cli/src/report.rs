//! Text and JSON output for the CLI

use anyhow::Result;
use can_setup::{
    Backend, CanInterfaceId, InterfaceInfo, ItemDescription, MeasurementReport, MeasurementSetup,
};

/// Print every interface the drivers currently know
pub fn print_interfaces(backend: &Backend, json: bool) -> Result<()> {
    let infos: Vec<InterfaceInfo> = backend.interfaces().map(|intf| intf.info()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    print!("{}", format_interfaces(&infos));
    Ok(())
}

/// Print the setup tree with one line per item
pub fn print_setup(backend: &Backend, setup: &MeasurementSetup, json: bool) -> Result<()> {
    let descriptions = describe_setup(backend, setup);

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptions)?);
        return Ok(());
    }

    print!("{}", format_setup(&descriptions));
    Ok(())
}

/// Print which interfaces a measurement start could open
pub fn print_measurement(backend: &Backend, report: &MeasurementReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    print!("{}", format_measurement(backend, report));
    Ok(())
}

fn describe_setup(backend: &Backend, setup: &MeasurementSetup) -> Vec<ItemDescription> {
    setup
        .items()
        .iter()
        .filter_map(|item| backend.describe_item(setup, item))
        .collect()
}

fn format_interfaces(infos: &[InterfaceInfo]) -> String {
    if infos.is_empty() {
        return "No CAN interfaces found\n".to_string();
    }

    let mut out = format!(
        "{:<8} {:<12} {:<16} {:>10}  {}\n",
        "ID", "DRIVER", "NAME", "BITRATE", "STATE"
    );
    for info in infos {
        out.push_str(&format!(
            "{:<8} {:<12} {:<16} {:>10}  {:?}\n",
            info.id.to_string(),
            info.driver,
            info.name,
            info.bitrate,
            info.state
        ));
    }
    out
}

fn format_setup(descriptions: &[ItemDescription]) -> String {
    let mut out = String::new();
    for description in descriptions {
        let indent = "  ".repeat(description.item.depth());
        let mut line = format!("{}{}", indent, description.label);

        if let Some(driver) = &description.driver {
            line.push_str(&format!(" [{}", driver));
            if let Some(bitrate) = description.bitrate {
                line.push_str(&format!(", {} bit/s", bitrate));
            }
            line.push(']');
        }
        if let Some(path) = &description.path {
            line.push_str(&format!(" ({})", path.display()));
        }

        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn format_measurement(backend: &Backend, report: &MeasurementReport) -> String {
    let names = |ids: &[CanInterfaceId]| -> String {
        ids.iter()
            .map(|id| {
                let name = backend.get_interface_name(*id);
                if name.is_empty() {
                    id.to_string()
                } else {
                    name
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = format!("Opened: {}\n", names(&report.opened));
    if !report.unavailable.is_empty() {
        out.push_str(&format!("Unavailable: {}\n", names(&report.unavailable)));
    }
    if !report.rejected.is_empty() {
        out.push_str(&format!("Rejected: {}\n", names(&report.rejected)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_setup::{BackendConfig, InterfaceSettings};

    fn backend() -> Backend {
        let config = BackendConfig::new()
            .with_socketcan(false)
            .with_virtual_channel("vcan0");
        let mut backend = Backend::from_config(config);
        backend.update_interfaces().unwrap();
        backend
    }

    #[test]
    fn test_format_interfaces() {
        let backend = backend();
        let infos: Vec<InterfaceInfo> = backend.interfaces().map(|intf| intf.info()).collect();
        let text = format_interfaces(&infos);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("VirtualCAN"));
        assert!(lines[1].contains("vcan0"));
        assert!(lines[1].contains("500000"));
    }

    #[test]
    fn test_format_interfaces_empty() {
        assert_eq!(format_interfaces(&[]), "No CAN interfaces found\n");
    }

    #[test]
    fn test_format_setup_indents_by_depth() {
        let backend = backend();
        let vcan0 = backend.find_interface_by_name("vcan0").unwrap().id();

        let mut setup = MeasurementSetup::new();
        let net = setup.add_network();
        setup.rename_network(net, "Body").unwrap();
        setup.add_interface(net, vcan0).unwrap();
        backend
            .configure_interface(&mut setup, net, vcan0, InterfaceSettings::with_bitrate(250_000))
            .unwrap();

        let text = format_setup(&describe_setup(&backend, &setup));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Body");
        assert_eq!(lines[1], "  Interfaces");
        assert_eq!(lines[2], "    vcan0 [VirtualCAN, 250000 bit/s]");
        assert_eq!(lines[3], "  CAN Databases");
    }

    #[test]
    fn test_format_measurement() {
        let mut backend = backend();
        let vcan0 = backend.find_interface_by_name("vcan0").unwrap().id();

        let mut setup = MeasurementSetup::new();
        let net = setup.add_network();
        setup.add_interface(net, vcan0).unwrap();

        let report = backend.start_measurement(&setup);
        let text = format_measurement(&backend, &report);
        assert_eq!(text, "Opened: vcan0\n");
        backend.stop_measurement();
    }
}
