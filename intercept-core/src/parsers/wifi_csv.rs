//! airodump-ng CSV decoding, ported from `parse_airodump_csv` in the
//! original orchestrator.

use crate::models::{WifiClient, WifiNetwork};
use crate::oui::OuiTable;
use std::collections::HashMap;

/// Parses a full airodump-ng CSV dump (the networks section, a blank line,
/// then the client-stations section) into keyed maps.
pub fn parse_airodump_csv(content: &str, oui: &OuiTable) -> (HashMap<String, WifiNetwork>, HashMap<String, WifiClient>) {
    let mut networks = HashMap::new();
    let mut clients = HashMap::new();

    for section in content.split("\n\n") {
        let lines: Vec<&str> = section.trim().lines().collect();
        let Some(header) = lines.first() else { continue };

        if header.contains("BSSID") && header.contains("ESSID") {
            for line in &lines[1..] {
                let parts: Vec<&str> = line.split(',').map(str::trim).collect();
                if parts.len() < 14 {
                    continue;
                }
                let bssid = parts[0];
                if bssid.is_empty() || !bssid.contains(':') {
                    continue;
                }
                let essid = if parts[13].is_empty() { "Hidden" } else { parts[13] };
                networks.insert(
                    bssid.to_string(),
                    WifiNetwork {
                        bssid: bssid.to_string(),
                        essid: essid.to_string(),
                        channel: parts[3].to_string(),
                        privacy: parts[5].to_string(),
                        cipher: parts[6].to_string(),
                        auth: parts[7].to_string(),
                        power: parts[8].to_string(),
                        beacons: parts[9].to_string(),
                        first_seen: parts[1].to_string(),
                        last_seen: parts[2].to_string(),
                    },
                );
            }
        } else if header.contains("Station MAC") {
            for line in &lines[1..] {
                let parts: Vec<&str> = line.split(',').map(str::trim).collect();
                if parts.len() < 6 {
                    continue;
                }
                let station = parts[0];
                if station.is_empty() || !station.contains(':') {
                    continue;
                }
                let vendor = oui.lookup(station).to_string();
                let probes = parts.get(6).copied().unwrap_or("").to_string();
                clients.insert(
                    station.to_string(),
                    WifiClient {
                        mac: station.to_string(),
                        first_seen: parts[1].to_string(),
                        last_seen: parts[2].to_string(),
                        power: parts[3].to_string(),
                        packets: parts[4].to_string(),
                        bssid: parts[5].to_string(),
                        probes,
                        vendor,
                    },
                );
            }
        }
    }

    (networks, clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_networks_and_clients() {
        let csv = "\
BSSID, First time seen, Last time seen, channel, Speed, Privacy, Cipher, Authentication, Power, # beacons, # IV, LAN IP, ID-length, ESSID, Key
AA:BB:CC:DD:EE:FF, 2024-01-01 00:00:00, 2024-01-01 00:01:00, 6, 54, WPA2, CCMP, PSK, -40, 10, 0, 0.0.0.0, 0, ,

Station MAC, First time seen, Last time seen, Power, # packets, BSSID, Probed ESSIDs
11:22:33:44:55:66, 2024-01-01 00:00:00, 2024-01-01 00:01:00, -50, 5, AA:BB:CC:DD:EE:FF, HomeNet
";
        let oui = OuiTable::default();
        let (networks, clients) = parse_airodump_csv(csv, &oui);
        assert_eq!(networks.len(), 1);
        let net = &networks["AA:BB:CC:DD:EE:FF"];
        assert_eq!(net.essid, "Hidden");
        assert_eq!(net.channel, "6");

        assert_eq!(clients.len(), 1);
        let client = &clients["11:22:33:44:55:66"];
        assert_eq!(client.bssid, "AA:BB:CC:DD:EE:FF");
        assert_eq!(client.probes, "HomeNet");
    }
}
