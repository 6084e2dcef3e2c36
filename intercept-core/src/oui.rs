//! OUI (Organizationally Unique Identifier) vendor lookup, C2.
//!
//! Loaded once from an optional JSON file at startup (keys are uppercase
//! `XX:XX:XX` prefixes); falls back to a small compiled-in table when the
//! file is absent or fails to parse.

use std::collections::HashMap;
use std::path::Path;

const UNKNOWN: &str = "Unknown";

fn builtin_table() -> HashMap<String, String> {
    let pairs: &[(&str, &str)] = &[
        ("00:1A:11", "Google"),
        ("3C:5A:B4", "Google"),
        ("F4:F5:E8", "Google"),
        ("00:17:F2", "Apple"),
        ("A4:83:E7", "Apple"),
        ("DC:A9:04", "Apple"),
        ("F0:18:98", "Apple"),
        ("00:1B:63", "Apple"),
        ("3C:06:30", "Samsung"),
        ("8C:71:F8", "Samsung"),
        ("E8:50:8B", "Samsung"),
        ("B0:BE:76", "Espressif"),
        ("24:6F:28", "Espressif"),
        ("84:CC:A8", "Espressif"),
        ("DC:A6:32", "Raspberry Pi Foundation"),
        ("B8:27:EB", "Raspberry Pi Foundation"),
        ("E4:5F:01", "Raspberry Pi Foundation"),
        ("00:0C:29", "VMware"),
        ("00:50:56", "VMware"),
        ("08:00:27", "Oracle (VirtualBox)"),
        ("00:15:5D", "Microsoft (Hyper-V)"),
        ("AC:DE:48", "Netgear"),
        ("20:E5:2A", "Netgear"),
        ("C0:4A:00", "Netgear"),
        ("14:91:82", "TP-Link"),
        ("50:C7:BF", "TP-Link"),
        ("A4:2B:B0", "TP-Link"),
        ("00:18:E7", "Cameo Communications (Belkin OEM)"),
        ("94:10:3E", "ASUSTek"),
        ("D8:50:E6", "ASUSTek"),
        ("1C:B7:2C", "Ubiquiti Networks"),
        ("24:A4:3C", "Ubiquiti Networks"),
        ("FC:EC:DA", "Ubiquiti Networks"),
        ("00:25:9C", "Cisco"),
        ("00:1E:F7", "Cisco-Linksys"),
        ("AC:F1:DF", "Amazon"),
        ("68:37:E9", "Amazon"),
        ("44:65:0D", "Amazon"),
        ("A0:CE:C8", "Xiaomi"),
        ("78:11:DC", "Xiaomi"),
        ("FC:A1:83", "Tile Inc"),
    ];
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct OuiTable {
    by_prefix: HashMap<String, String>,
}

impl Default for OuiTable {
    fn default() -> Self {
        Self {
            by_prefix: builtin_table(),
        }
    }
}

impl OuiTable {
    /// Read `path` (a JSON object of `"XX:XX:XX" -> "Vendor"`) if given and
    /// readable; otherwise fall back to the compiled-in table.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(&contents) {
                    let by_prefix = map
                        .into_iter()
                        .map(|(k, v)| (k.to_uppercase(), v))
                        .collect();
                    return Self { by_prefix };
                }
            }
        }
        Self::default()
    }

    /// Number of vendor entries currently loaded (builtin or file-backed).
    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }

    /// Case-insensitive lookup on the first 8 characters (`XX:XX:XX`) of `mac`.
    pub fn lookup(&self, mac: &str) -> &str {
        if mac.len() < 8 {
            return UNKNOWN;
        }
        let prefix = mac[..8].to_uppercase();
        self.by_prefix
            .get(&prefix)
            .map(|s| s.as_str())
            .unwrap_or(UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = OuiTable::default();
        assert_eq!(table.lookup("b8:27:eb:11:22:33"), "Raspberry Pi Foundation");
        assert_eq!(table.lookup("B8:27:EB:11:22:33"), "Raspberry Pi Foundation");
    }

    #[test]
    fn unknown_prefix() {
        let table = OuiTable::default();
        assert_eq!(table.lookup("FF:FF:FF:FF:FF:FF"), "Unknown");
    }

    #[test]
    fn short_mac_is_unknown() {
        let table = OuiTable::default();
        assert_eq!(table.lookup("AA"), "Unknown");
    }

    #[test]
    fn loads_from_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("intercept_oui_test.json");
        std::fs::write(&path, r#"{"AA:BB:CC": "TestVendor"}"#).unwrap();
        let table = OuiTable::load_or_default(Some(&path));
        assert_eq!(table.lookup("AA:BB:CC:00:00:00"), "TestVendor");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn falls_back_when_file_missing() {
        let table = OuiTable::load_or_default(Some(Path::new("/nonexistent/oui.json")));
        assert_eq!(table.lookup("B8:27:EB:00:00:00"), "Raspberry Pi Foundation");
    }
}
