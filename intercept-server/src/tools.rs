//! External tool registry and presence probe, C1.
//!
//! Grounded on `original_source/utils/process.py`'s `detect_devices`
//! (which shells out to `rtl_test`) and the `shutil.which` checks
//! scattered across every `routes/*.py` module, consolidated here into one
//! static per-mode table per spec.md §4.1.

use intercept_core::models::{DependencyReport, ToolStatus};
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub bin: &'static str,
    pub required: bool,
    pub install_hint: &'static str,
    pub description: &'static str,
}

/// Every mode name this server recognizes, matching the HTTP route
/// prefixes in spec.md §6.
pub const MODES: &[&str] = &["pager", "sensor", "wifi", "bluetooth", "adsb", "satellite", "iridium"];

static REGISTRY: Lazy<HashMap<&'static str, Vec<ToolSpec>>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Vec<ToolSpec>> = HashMap::new();

    m.insert(
        "pager",
        vec![
            ToolSpec {
                bin: "rtl_fm",
                required: true,
                install_hint: "apt install rtl-sdr",
                description: "RTL-SDR FM demodulator",
            },
            ToolSpec {
                bin: "multimon-ng",
                required: true,
                install_hint: "apt install multimon-ng",
                description: "POCSAG/FLEX pager decoder",
            },
        ],
    );

    m.insert(
        "sensor",
        vec![ToolSpec {
            bin: "rtl_433",
            required: true,
            install_hint: "apt install rtl-433",
            description: "433 MHz ISM-band sensor decoder",
        }],
    );

    m.insert(
        "wifi",
        vec![
            ToolSpec {
                bin: "airodump-ng",
                required: true,
                install_hint: "apt install aircrack-ng",
                description: "WiFi packet capture and enumeration",
            },
            ToolSpec {
                bin: "airmon-ng",
                required: false,
                install_hint: "apt install aircrack-ng",
                description: "WiFi monitor-mode toggle helper",
            },
            ToolSpec {
                bin: "aireplay-ng",
                required: false,
                install_hint: "apt install aircrack-ng",
                description: "Deauthentication frame injection",
            },
            ToolSpec {
                bin: "aircrack-ng",
                required: false,
                install_hint: "apt install aircrack-ng",
                description: "WPA handshake verification",
            },
            ToolSpec {
                bin: "hcxdumptool",
                required: false,
                install_hint: "apt install hcxdumptool",
                description: "PMKID capture",
            },
            ToolSpec {
                bin: "hcxpcapngtool",
                required: false,
                install_hint: "apt install hcxtools",
                description: "PMKID hash extraction",
            },
        ],
    );

    m.insert(
        "bluetooth",
        vec![
            ToolSpec {
                bin: "bluetoothctl",
                required: true,
                install_hint: "apt install bluez",
                description: "BlueZ control console (classic + BLE scan)",
            },
            ToolSpec {
                bin: "hcitool",
                required: false,
                install_hint: "apt install bluez-hcidump",
                description: "Low-energy scan fallback",
            },
        ],
    );

    m.insert(
        "adsb",
        vec![
            ToolSpec {
                bin: "dump1090",
                required: false,
                install_hint: "apt install dump1090-mutability",
                description: "ADS-B decoder with JSON web endpoint",
            },
            ToolSpec {
                bin: "rtl_adsb",
                required: false,
                install_hint: "apt install rtl-sdr",
                description: "Bare-bones ADS-B raw frame decoder",
            },
        ],
    );

    m.insert(
        "satellite",
        vec![ToolSpec {
            bin: "sgp4",
            required: true,
            install_hint: "compiled in (rust sgp4 crate)",
            description: "SGP4 orbital propagation (compiled in, not probed on $PATH)",
        }],
    );

    m.insert(
        "iridium",
        vec![ToolSpec {
            bin: "rtl_fm",
            required: true,
            install_hint: "apt install rtl-sdr",
            description: "RTL-SDR raw capture (Iridium demodulation itself is demo-only)",
        }],
    );

    m
});

/// `sgp4` is compiled in, never probed on `$PATH`.
const COMPILED_IN: &[&str] = &["sgp4"];

fn probe_one(bin: &str) -> bool {
    COMPILED_IN.contains(&bin) || which::which(bin).is_ok()
}

/// Probes every tool for `mode`, returning presence, readiness and the
/// missing-required list. Pure apart from the `$PATH` stats `which`
/// performs; completes in well under spec.md §4.1's sub-hundred-millisecond
/// budget since each lookup is a handful of `stat`s.
pub fn probe(mode: &str) -> DependencyReport {
    let specs = REGISTRY.get(mode).cloned().unwrap_or_default();
    let mut missing = Vec::new();
    let mut tools = Vec::with_capacity(specs.len());

    for spec in &specs {
        let present = probe_one(spec.bin);
        if spec.required && !present {
            missing.push(spec.bin.to_string());
        }
        tools.push(ToolStatus {
            name: spec.bin.to_string(),
            present,
            required: spec.required,
            install_hint: spec.install_hint.to_string(),
            description: spec.description.to_string(),
        });
    }

    DependencyReport {
        ready: missing.is_empty(),
        missing,
        tools,
    }
}

/// Full `/dependencies` report: every mode's probe result keyed by name.
pub fn probe_all() -> HashMap<&'static str, DependencyReport> {
    MODES.iter().map(|&mode| (mode, probe(mode))).collect()
}

/// Convenience check used by mode controllers before spawning: returns the
/// first missing required tool's spec, if any.
pub fn first_missing_required(mode: &str) -> Option<ToolSpec> {
    REGISTRY
        .get(mode)
        .into_iter()
        .flatten()
        .find(|spec| spec.required && !probe_one(spec.bin))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_reports_missing_required_tools() {
        let report = probe("pager");
        // rtl_fm/multimon-ng are virtually never present in a CI sandbox.
        assert!(!report.tools.is_empty());
        assert_eq!(report.ready, report.missing.is_empty());
    }

    #[test]
    fn satellite_mode_is_always_ready() {
        let report = probe("satellite");
        assert!(report.ready);
        assert!(report.tools[0].present);
    }

    #[test]
    fn unknown_mode_yields_empty_report() {
        let report = probe("not-a-mode");
        assert!(report.tools.is_empty());
        assert!(report.ready);
    }
}
