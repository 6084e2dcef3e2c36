//! Bluetooth mode (C8), spec.md §4.6/§4.8: `bluetoothctl scan on` (via PTY,
//! since bluetoothctl only line-buffers its discovery chatter against a
//! tty) or `hcitool lescan` (plain pipe) feeding one device store, plus
//! one-shot adapter reset and service-enumeration verbs.
//!
//! Grounded on spec.md §4.6's bluetoothctl/hcitool parser split and
//! `original_source/routes/wifi.py`'s pattern for bounded one-shot tool
//! invocations (`aircrack-ng`/`hcxpcapngtool` with a hard timeout), reused
//! here for `/bt/reset` and `/bt/enum`.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use intercept_core::bluetooth::{classify, detect_tracker};
use intercept_core::models::BluetoothDevice;
use intercept_core::oui::OuiTable;
use intercept_core::parsers::bluetooth_line::{parse_bluetoothctl_line, parse_hcitool_line};
use intercept_core::store::TtlStore;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

use crate::bus::EventBus;
use crate::error::{ApiError, ApiResult};
use crate::registry::ProcessRegistry;
use crate::supervisor::{CmdSpec, ModeStatusReport, ProcessSpec, Supervisor};
use crate::tools;

const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(10);

fn default_scan_mode() -> String {
    "bluetoothctl".to_string()
}
fn default_interface() -> String {
    "hci0".to_string()
}
fn default_duration() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BtScanStartRequest {
    #[serde(default = "default_scan_mode")]
    pub mode: String,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_duration")]
    pub duration: u64,
    #[serde(default = "default_true")]
    pub scan_ble: bool,
    #[serde(default)]
    pub scan_classic: bool,
}

#[derive(Debug, Deserialize)]
pub struct BtEnumRequest {
    pub mac: String,
}

type DeviceStore = Arc<std::sync::Mutex<TtlStore<String, BluetoothDevice>>>;

pub struct BluetoothController {
    supervisor: Supervisor,
    bus: EventBus,
    registry: Arc<ProcessRegistry>,
    devices: DeviceStore,
    oui: Arc<std::sync::Mutex<OuiTable>>,
}

impl BluetoothController {
    pub fn new(registry: Arc<ProcessRegistry>, oui: Arc<std::sync::Mutex<OuiTable>>) -> Self {
        Self {
            supervisor: Supervisor::new("bluetooth"),
            bus: EventBus::new(),
            registry,
            devices: Arc::new(std::sync::Mutex::new(TtlStore::new())),
            oui,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn devices(&self) -> DeviceStore {
        self.devices.clone()
    }

    pub fn devices_snapshot(&self) -> Vec<BluetoothDevice> {
        self.devices.lock().unwrap().all().map(|(_, v)| v.clone()).collect()
    }

    pub async fn status(&self) -> ModeStatusReport {
        self.supervisor.status().await
    }

    /// `hcitool dev`'s adapter list, reusing wifi.rs's one-shot-probe
    /// pattern (bounded run, tolerant of the tool being absent).
    pub async fn interfaces(&self) -> serde_json::Value {
        let adapters = match tokio::time::timeout(ONE_SHOT_TIMEOUT, Command::new("hcitool").arg("dev").output()).await {
            Ok(Ok(out)) => String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|line| line.split_whitespace().nth(0).filter(|tok| tok.starts_with("hci")))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        serde_json::json!({
            "interfaces": adapters,
            "tools": tools::probe("bluetooth"),
        })
    }

    pub async fn start(&self, req: BtScanStartRequest) -> ApiResult<()> {
        if let Some(missing) = tools::first_missing_required("bluetooth") {
            return Err(ApiError::DependencyMissing {
                tool: missing.bin.to_string(),
                install_hint: missing.install_hint.to_string(),
            });
        }

        let use_hcitool = req.mode.eq_ignore_ascii_case("hcitool");
        let spec = if use_hcitool {
            let mut args = vec!["-i".to_string(), req.interface.clone(), "lescan".to_string()];
            if !req.scan_ble {
                args.push("--passive".to_string());
            }
            ProcessSpec::new("hcitool", args)
        } else {
            ProcessSpec::new("bluetoothctl", vec!["scan".to_string(), "on".to_string()]).with_pty()
        };

        let devices = self.devices.clone();
        let bus = self.bus.clone();
        let duration = req.duration;
        let use_hcitool_inner = use_hcitool;
        let oui = self.oui.clone();

        self.supervisor
            .start(
                CmdSpec::Single(spec),
                self.bus.clone(),
                self.registry.clone(),
                move |mut source, mut stop| async move {
                    let deadline = tokio::time::sleep(Duration::from_secs(duration));
                    tokio::pin!(deadline);
                    loop {
                        tokio::select! {
                            _ = stop.wait() => break,
                            _ = &mut deadline => {
                                bus.publish(serde_json::json!({"type": "info", "text": "scan duration elapsed"}));
                                break;
                            }
                            line = source.next_line() => {
                                let Some(line) = line else { break };
                                let discovered = if use_hcitool_inner {
                                    parse_hcitool_line(&line)
                                } else {
                                    parse_bluetoothctl_line(&line)
                                };
                                match discovered {
                                    Some(found) => {
                                        let mut store = devices.lock().unwrap();
                                        let action = if store.get(&found.mac).is_some() { "update" } else { "new" };
                                        let manufacturer = oui.lock().unwrap().lookup(&found.mac).to_string();
                                        let device_type = classify(&found.name, None, Some(manufacturer.as_str()));
                                        let tracker = detect_tracker(&found.mac, &found.name);
                                        let record = BluetoothDevice {
                                            mac: found.mac.clone(),
                                            name: found.name.clone(),
                                            manufacturer,
                                            device_type,
                                            tracker,
                                            rssi: None,
                                            last_seen: Utc::now(),
                                        };
                                        store.upsert(found.mac.clone(), record.clone());
                                        drop(store);
                                        let mut payload = serde_json::to_value(&record).unwrap_or_default();
                                        if let serde_json::Value::Object(ref mut map) = payload {
                                            map.insert("type".to_string(), serde_json::Value::String("device".to_string()));
                                            map.insert("action".to_string(), serde_json::Value::String(action.to_string()));
                                        }
                                        bus.publish(payload);
                                    }
                                    None => {
                                        bus.publish(serde_json::json!({"type": "raw", "text": line}));
                                    }
                                }
                            }
                        }
                    }
                    debug!("bluetooth parser task exiting");
                },
            )
            .await?;
        Ok(())
    }

    pub async fn stop(&self) -> ApiResult<()> {
        self.supervisor.stop(&self.bus, &self.registry).await.map_err(ApiError::from)
    }

    /// One-shot `bluetoothctl power off` then `power on`, bounded by
    /// [`ONE_SHOT_TIMEOUT`]; never touches the mode slot.
    pub async fn reset_adapter(&self) -> ApiResult<String> {
        for verb in ["power off", "power on"] {
            let args: Vec<&str> = verb.split_whitespace().collect();
            let _ = tokio::time::timeout(
                ONE_SHOT_TIMEOUT,
                Command::new("bluetoothctl").args(&args).stdout(Stdio::null()).stderr(Stdio::null()).status(),
            )
            .await;
        }
        Ok("adapter reset".to_string())
    }

    /// `bluetoothctl info <mac>`, bounded by [`ONE_SHOT_TIMEOUT`]; the raw
    /// output is returned verbatim alongside a best-effort UUID extraction.
    pub async fn enumerate_services(&self, req: BtEnumRequest) -> ApiResult<serde_json::Value> {
        intercept_core::validators::validate_mac(&req.mac)?;

        let output = tokio::time::timeout(
            ONE_SHOT_TIMEOUT,
            Command::new("bluetoothctl").args(["info", &req.mac]).output(),
        )
        .await
        .map_err(|_| ApiError::Internal("bluetoothctl info timed out".to_string()))?
        .map_err(|e| ApiError::SpawnFailed {
            program: "bluetoothctl".to_string(),
            source: e,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let uuids: Vec<&str> = stdout
            .lines()
            .filter(|line| line.trim_start().starts_with("UUID:"))
            .map(str::trim)
            .collect();

        Ok(serde_json::json!({
            "mac": req.mac,
            "raw": stdout,
            "services": uuids,
        }))
    }

    /// Reloads the shared OUI table from its default location (spec.md §6's
    /// `oui_database.json`, if present), used by WiFi client vendor lookup.
    pub fn reload_oui(&self) -> usize {
        let fresh = OuiTable::load_or_default(Some(std::path::Path::new("oui_database.json")));
        let mut guard = self.oui.lock().unwrap();
        *guard = fresh;
        guard.len()
    }
}
