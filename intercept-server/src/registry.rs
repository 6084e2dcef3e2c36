//! Global process registry and cleanup discipline, C5/§9.
//!
//! Grounded on `original_source/utils/process.py` (`_spawned_processes`,
//! `register_process`/`unregister_process`/`cleanup_all_processes`,
//! `atexit`/`signal` handlers), reimplemented as one owning struct per
//! spec.md §9 instead of module-level globals. Every process a
//! [`crate::supervisor::Supervisor`] spawns is registered here in addition
//! to being tracked by its own pipeline handle, so a crash in the pipeline
//! bookkeeping can never leak an orphan: the registry is the backstop the
//! global shutdown hook and `/killall` sweep through.

use std::sync::Mutex;

use log::{info, warn};

#[derive(Debug, Clone)]
pub struct RegisteredProcess {
    pub pid: u32,
    pub mode: &'static str,
    pub label: String,
}

#[derive(Default)]
pub struct ProcessRegistry {
    processes: Mutex<Vec<RegisteredProcess>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32, mode: &'static str, label: impl Into<String>) {
        self.processes.lock().unwrap().push(RegisteredProcess {
            pid,
            mode,
            label: label.into(),
        });
    }

    pub fn unregister(&self, pid: u32) {
        self.processes.lock().unwrap().retain(|p| p.pid != pid);
    }

    pub fn snapshot(&self) -> Vec<RegisteredProcess> {
        self.processes.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.lock().unwrap().is_empty()
    }

    /// Terminates every still-registered process (two-phase: SIGTERM, then
    /// SIGKILL after a short grace period) and clears the registry. Called
    /// both from the SIGTERM/SIGINT shutdown hook and from unit tests that
    /// assert the registry drains to empty (spec.md §8 property 7).
    pub fn cleanup_all(&self) {
        let processes = {
            let mut guard = self.processes.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        if processes.is_empty() {
            return;
        }
        info!("cleaning up {} registered process(es)", processes.len());
        for proc in &processes {
            terminate_pid(proc.pid);
        }
    }
}

#[cfg(target_family = "unix")]
fn terminate_pid(pid: u32) {
    use std::process::Command;
    use std::time::Duration;

    let term = Command::new("kill").args(["-TERM", &pid.to_string()]).status();
    if term.is_err() {
        warn!("failed to send SIGTERM to pid {pid}");
        return;
    }
    std::thread::sleep(Duration::from_millis(200));
    let _ = Command::new("kill").args(["-0", &pid.to_string()]).status().map(|status| {
        if status.success() {
            let _ = Command::new("kill").args(["-KILL", &pid.to_string()]).status();
        }
    });
}

#[cfg(not(target_family = "unix"))]
fn terminate_pid(_pid: u32) {}

/// Broadcast-terminates all decoder binaries by name, per spec.md §4.5's
/// `kill_all` endpoint. Host-provided services (a long-running `dump1090`
/// the operator manages independently) are intentionally excluded.
pub fn kill_all_by_name() {
    const DECODER_NAMES: &[&str] = &[
        "rtl_fm",
        "multimon-ng",
        "rtl_433",
        "airodump-ng",
        "aireplay-ng",
        "airmon-ng",
        "hcxdumptool",
        "hcitool",
        "bluetoothctl",
        "rtl_adsb",
    ];
    #[cfg(target_family = "unix")]
    for name in DECODER_NAMES {
        let _ = std::process::Command::new("pkill").args(["-9", name]).status();
    }
    #[cfg(not(target_family = "unix"))]
    let _ = DECODER_NAMES;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister_round_trip() {
        let registry = ProcessRegistry::new();
        registry.register(99999, "pager", "rtl_fm");
        assert!(!registry.is_empty());
        registry.unregister(99999);
        assert!(registry.is_empty());
    }

    #[test]
    fn cleanup_all_empties_registry() {
        let registry = ProcessRegistry::new();
        registry.register(99999, "pager", "rtl_fm");
        registry.register(99998, "wifi", "airodump-ng");
        registry.cleanup_all();
        assert!(registry.is_empty());
    }
}
