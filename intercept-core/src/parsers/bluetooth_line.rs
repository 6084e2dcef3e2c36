//! `bluetoothctl`/`hcitool lescan` stdout decoding, spec.md §4.6.

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("static ansi regex"));
static DEVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Device\s+((?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2})\s+(.+)").expect("static device regex"));

pub fn strip_ansi(line: &str) -> String {
    ANSI_RE.replace_all(line, "").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub mac: String,
    pub name: String,
}

/// Matches `bluetoothctl`'s `[NEW] Device AA:BB:CC:DD:EE:FF Some Name` (and
/// the `[CHG]`/no-tag variants) after ANSI stripping.
pub fn parse_bluetoothctl_line(line: &str) -> Option<DiscoveredDevice> {
    let clean = strip_ansi(line);
    let caps = DEVICE_RE.captures(&clean)?;
    Some(DiscoveredDevice {
        mac: caps[1].to_uppercase(),
        name: caps[2].trim().to_string(),
    })
}

/// `hcitool lescan` emits one device per line: `MAC\tname` (name may be
/// `(unknown)`).
pub fn parse_hcitool_line(line: &str) -> Option<DiscoveredDevice> {
    let mut parts = line.trim().splitn(2, '\t');
    let mac = parts.next()?.trim();
    let name = parts.next().unwrap_or("").trim();
    if !mac.contains(':') {
        return None;
    }
    Some(DiscoveredDevice {
        mac: mac.to_uppercase(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_codes() {
        assert_eq!(strip_ansi("\x1b[0;93m[NEW]\x1b[0m Device AA:BB:CC:DD:EE:FF TestSpeaker"), "[NEW] Device AA:BB:CC:DD:EE:FF TestSpeaker");
    }

    #[test]
    fn parses_bluetoothctl_device_line() {
        let d = parse_bluetoothctl_line("[NEW] Device AA:BB:CC:DD:EE:FF TestSpeaker").unwrap();
        assert_eq!(d.mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(d.name, "TestSpeaker");
    }

    #[test]
    fn parses_bluetoothctl_line_with_ansi() {
        let d = parse_bluetoothctl_line("\x1b[0;93m[NEW]\x1b[0m Device aa:bb:cc:dd:ee:ff TestSpeaker").unwrap();
        assert_eq!(d.mac, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn parses_hcitool_line() {
        let d = parse_hcitool_line("AA:BB:CC:DD:EE:FF\tTestSpeaker").unwrap();
        assert_eq!(d.mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(d.name, "TestSpeaker");
    }

    #[test]
    fn non_device_line_is_none() {
        assert!(parse_bluetoothctl_line("Agent registered").is_none());
    }
}
