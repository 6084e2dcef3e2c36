//! Bluetooth device classification and tracker detection, C2/§4.6.

use crate::models::{BluetoothDeviceType, TrackerInfo, TrackerType};

/// Name-substring patterns per device type, checked in order — first match wins.
const PATTERNS: &[(&str, BluetoothDeviceType)] = &[
    ("airpod", BluetoothDeviceType::Audio),
    ("headphone", BluetoothDeviceType::Audio),
    ("earbud", BluetoothDeviceType::Audio),
    ("speaker", BluetoothDeviceType::Audio),
    ("soundbar", BluetoothDeviceType::Audio),
    ("buds", BluetoothDeviceType::Audio),
    ("watch", BluetoothDeviceType::Wearable),
    ("band", BluetoothDeviceType::Wearable),
    ("fitbit", BluetoothDeviceType::Wearable),
    ("ring", BluetoothDeviceType::Wearable),
    ("iphone", BluetoothDeviceType::Phone),
    ("galaxy", BluetoothDeviceType::Phone),
    ("pixel", BluetoothDeviceType::Phone),
    ("phone", BluetoothDeviceType::Phone),
    ("airtag", BluetoothDeviceType::Tracker),
    ("tile", BluetoothDeviceType::Tracker),
    ("smarttag", BluetoothDeviceType::Tracker),
    ("smart tag", BluetoothDeviceType::Tracker),
    ("chipolo", BluetoothDeviceType::Tracker),
    ("keyboard", BluetoothDeviceType::Input),
    ("mouse", BluetoothDeviceType::Input),
    ("trackpad", BluetoothDeviceType::Input),
    ("gamepad", BluetoothDeviceType::Input),
    ("controller", BluetoothDeviceType::Input),
    ("tv", BluetoothDeviceType::Media),
    ("chromecast", BluetoothDeviceType::Media),
    ("roku", BluetoothDeviceType::Media),
    ("macbook", BluetoothDeviceType::Computer),
    ("laptop", BluetoothDeviceType::Computer),
    ("pc", BluetoothDeviceType::Computer),
    ("printer", BluetoothDeviceType::Imaging),
    ("camera", BluetoothDeviceType::Imaging),
];

/// `classify(name, class_bits?, vendor?)`, returning the first matching category.
pub fn classify(name: &str, _class_bits: Option<u32>, _vendor: Option<&str>) -> BluetoothDeviceType {
    let lower = name.to_lowercase();
    for (pattern, kind) in PATTERNS {
        if lower.contains(pattern) {
            return *kind;
        }
    }
    BluetoothDeviceType::Other
}

/// MAC-prefix table for trackers whose firmware always emits a fixed OUI.
const TRACKER_MAC_PREFIXES: &[(&str, TrackerType)] = &[
    ("FC:A1:83", TrackerType::Tile),
    ("E5:", TrackerType::AirTag),
];

pub fn detect_tracker(mac: &str, name: &str) -> Option<TrackerInfo> {
    let lower_name = name.to_lowercase();

    if lower_name.contains("airtag") {
        return Some(TrackerInfo {
            kind: TrackerType::AirTag,
            name: "AirTag".to_string(),
            risk: "high".to_string(),
        });
    }
    if lower_name.contains("tile") {
        return Some(TrackerInfo {
            kind: TrackerType::Tile,
            name: "Tile".to_string(),
            risk: "medium".to_string(),
        });
    }
    if lower_name.contains("smarttag") || lower_name.contains("smart tag") {
        return Some(TrackerInfo {
            kind: TrackerType::SmartTag,
            name: "Samsung SmartTag".to_string(),
            risk: "medium".to_string(),
        });
    }
    if lower_name.contains("chipolo") {
        return Some(TrackerInfo {
            kind: TrackerType::Chipolo,
            name: "Chipolo".to_string(),
            risk: "medium".to_string(),
        });
    }

    let upper_mac = mac.to_uppercase();
    for (prefix, kind) in TRACKER_MAC_PREFIXES {
        if upper_mac.starts_with(prefix) {
            let (name, risk) = match kind {
                TrackerType::AirTag => ("AirTag", "high"),
                TrackerType::Tile => ("Tile", "medium"),
                TrackerType::SmartTag => ("Samsung SmartTag", "medium"),
                TrackerType::Chipolo => ("Chipolo", "medium"),
            };
            return Some(TrackerInfo {
                kind: *kind,
                name: name.to_string(),
                risk: risk.to_string(),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_audio() {
        assert_eq!(classify("TestSpeaker", None, None), BluetoothDeviceType::Audio);
        assert_eq!(classify("Sony WH-1000XM4 headphones", None, None), BluetoothDeviceType::Audio);
    }

    #[test]
    fn classifies_unknown_as_other() {
        assert_eq!(classify("xyz123", None, None), BluetoothDeviceType::Other);
    }

    #[test]
    fn detects_airtag_by_name() {
        let t = detect_tracker("11:22:33:44:55:66", "Find My AirTag").unwrap();
        assert_eq!(t.kind, TrackerType::AirTag);
        assert_eq!(t.risk, "high");
    }

    #[test]
    fn detects_tile_by_mac_prefix() {
        let t = detect_tracker("FC:A1:83:00:00:01", "Unnamed Device").unwrap();
        assert_eq!(t.kind, TrackerType::Tile);
    }

    #[test]
    fn no_tracker_match() {
        assert!(detect_tracker("11:22:33:44:55:66", "Generic Device").is_none());
    }
}
