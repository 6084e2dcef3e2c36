//! RTL-SDR device index parsing, C1.
//!
//! Grounded on `original_source/utils/process.py`'s `detect_devices`:
//! `rtl_test -t` writes its device table to stderr (occasionally stdout),
//! one `<index>: <name>, SN: <serial>` line per dongle, and falls back to
//! a bare `Found N device(s)` summary line when the names can't be parsed.
//! The subprocess invocation itself is server-side I/O; this module only
//! owns the text parsing so it stays unit-testable without `rtl_test`
//! installed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::RtlSdrDevice;

static DEVICE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):\s+(.+?)(?:,\s*SN:\s*(\S+))?$").expect("static device-line regex"));

static FOUND_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Found (\d+) device").expect("static found-count regex"));

/// Parses the combined stdout+stderr of `rtl_test -t` into a device list.
/// Falls back to synthesizing anonymous entries from a `Found N device(s)`
/// summary line when no per-device lines matched, matching the original's
/// two-tier parse.
pub fn parse_rtl_test_output(output: &str) -> Vec<RtlSdrDevice> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        let Some(caps) = DEVICE_LINE_RE.captures(line) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };
        let name = caps[2].trim().trim_end_matches(',').to_string();
        let serial = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_else(|| "N/A".to_string());
        devices.push(RtlSdrDevice { index, name, serial });
    }

    if devices.is_empty() {
        if let Some(caps) = FOUND_COUNT_RE.captures(output) {
            if let Ok(count) = caps[1].parse::<u32>() {
                for i in 0..count {
                    devices.push(RtlSdrDevice {
                        index: i,
                        name: format!("RTL-SDR Device {i}"),
                        serial: "Unknown".to_string(),
                    });
                }
            }
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_devices_with_serial() {
        let output = "Found 1 device(s):\n  0:  Realtek, RTL2838UHIDIR, SN: 00000001\n";
        let devices = parse_rtl_test_output(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].index, 0);
        assert_eq!(devices[0].name, "Realtek, RTL2838UHIDIR");
        assert_eq!(devices[0].serial, "00000001");
    }

    #[test]
    fn parses_device_without_serial() {
        let output = "0:  Generic RTL2832U\n";
        let devices = parse_rtl_test_output(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "N/A");
    }

    #[test]
    fn falls_back_to_found_count_when_unparseable() {
        let output = "Found 2 device(s)\ngarbled junk that matches nothing\n";
        let devices = parse_rtl_test_output(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].name, "RTL-SDR Device 1");
        assert_eq!(devices[1].serial, "Unknown");
    }

    #[test]
    fn no_devices_found() {
        assert!(parse_rtl_test_output("usb_claim_interface error -6\n").is_empty());
    }
}
