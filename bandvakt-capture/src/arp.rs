//! Parsers for neighbour tables.
//!
//! Unresolved entries (`<incomplete>`, flags `0x0`, all-zero hardware
//! address) are not devices and are left out.

use std::net::IpAddr;

use bandvakt_core::events::DeviceEntry;

/// Parses `arp -a` output in either the BSD/net-tools form
///
/// ```text
/// gateway (192.168.1.1) at aa:bb:cc:dd:ee:ff [ether] on wlan0
/// ```
///
/// or the Windows table form
///
/// ```text
/// Interface: 192.168.1.10 --- 0xb
///   Internet Address      Physical Address      Type
///   192.168.1.1           aa-bb-cc-dd-ee-ff     dynamic
/// ```
pub fn parse_arp_output(text: &str) -> Vec<DeviceEntry> {
    let mut devices = Vec::new();
    let mut table_interface: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Interface:") {
            table_interface = rest.split_whitespace().next().map(str::to_string);
            continue;
        }

        let entry = if line.contains('(') {
            parse_bsd_line(line)
        } else {
            parse_table_line(line, table_interface.as_deref())
        };
        devices.extend(entry);
    }

    devices
}

fn parse_bsd_line(line: &str) -> Option<DeviceEntry> {
    let open = line.find('(')?;
    let close = open + line[open..].find(')')?;
    let address: IpAddr = line[open + 1..close].parse().ok()?;

    let mut tokens = line[close + 1..].split_whitespace();
    let mut mac = None;
    let mut interface = None;
    while let Some(token) = tokens.next() {
        match token {
            "at" => mac = tokens.next().and_then(normalize_mac),
            "on" => interface = tokens.next().map(str::to_string),
            _ => {}
        }
    }

    Some(DeviceEntry {
        address,
        mac: Some(mac?),
        interface,
    })
}

fn parse_table_line(line: &str, interface: Option<&str>) -> Option<DeviceEntry> {
    let mut tokens = line.split_whitespace();
    let address: IpAddr = tokens.next()?.parse().ok()?;
    let mac = normalize_mac(tokens.next()?)?;
    Some(DeviceEntry {
        address,
        mac: Some(mac),
        interface: interface.map(str::to_string),
    })
}

/// Parses the kernel table at `/proc/net/arp`.
pub fn parse_proc_arp(text: &str) -> Vec<DeviceEntry> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 || fields[2] == "0x0" {
                return None;
            }
            Some(DeviceEntry {
                address: fields[0].parse().ok()?,
                mac: Some(normalize_mac(fields[3])?),
                interface: Some(fields[5].to_string()),
            })
        })
        .collect()
}

/// Lowercase, colon separated. `None` for anything that is not a resolved
/// 48-bit address.
fn normalize_mac(token: &str) -> Option<String> {
    let mac = token.replace('-', ":").to_lowercase();
    let octets: Vec<&str> = mac.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed || octets.iter().all(|o| o.chars().all(|c| c == '0')) {
        return None;
    }
    Some(
        octets
            .iter()
            .map(|o| format!("{:0>2}", o))
            .collect::<Vec<_>>()
            .join(":"),
    )
}
