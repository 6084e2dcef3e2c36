//! WiFi mode (C8), spec.md §4.6/§4.8: the monitor-mode toggle, scan,
//! deauth, handshake-capture and PMKID-capture state machines. Two
//! independent mode slots mirror the original's two globals: `scan`
//! (shared by plain scanning and handshake capture, both built on
//! `airodump-ng`) and `pmkid` (built on `hcxdumptool`).
//!
//! Grounded throughout on `original_source/routes/wifi.py`: interface
//! detection (`iw`/`iwconfig`), the monitor-mode priority-ordered interface
//! resolution after `airmon-ng start`, the CSV-polling scan loop, and the
//! deauth/handshake/PMKID one-shot verb set.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use intercept_core::models::{WifiClient, WifiNetwork};
use intercept_core::oui::OuiTable;
use intercept_core::parsers::wifi_csv::parse_airodump_csv;
use intercept_core::store::TtlStore;
use intercept_core::validators::{clamp_deauth_count, validate_capture_path, validate_mac, validate_wifi_channel};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;

use crate::bus::EventBus;
use crate::error::{ApiError, ApiResult};
use crate::registry::ProcessRegistry;
use crate::supervisor::{CmdSpec, ProcessSpec, StopSignal, Supervisor};
use crate::tools;

const CSV_POLL_INTERVAL: Duration = Duration::from_secs(2);
const CSV_APPEAR_TIMEOUT: Duration = Duration::from_secs(5);
const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(15);
const DEAUTH_TIMEOUT: Duration = Duration::from_secs(30);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);
const BROADCAST_MAC: &str = "FF:FF:FF:FF:FF:FF";

static MONITOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)monitor mode.*enabled.*on\s+(\S+)").unwrap(),
        Regex::new(r"(?i)\(monitor mode.*enabled.*?(\S+mon)\)").unwrap(),
        Regex::new(r"(?i)created\s+(\S+mon)").unwrap(),
    ]
});

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MonitorState {
    Managed,
    Transitioning,
    Monitor { iface: String },
}

#[derive(Debug, Deserialize)]
pub struct MonitorRequest {
    pub interface: String,
    pub action: String,
    #[serde(default)]
    pub kill_processes: bool,
}

fn default_band() -> String {
    "bg".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ScanStartRequest {
    pub interface: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_band")]
    pub band: String,
}

fn default_broadcast() -> String {
    BROADCAST_MAC.to_string()
}

#[derive(Debug, Deserialize)]
pub struct DeauthRequest {
    pub bssid: String,
    #[serde(default = "default_broadcast")]
    pub client: String,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub interface: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HandshakeCaptureRequest {
    pub bssid: String,
    pub channel: String,
    #[serde(default)]
    pub interface: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HandshakeStatusRequest {
    pub file: String,
    pub bssid: String,
}

#[derive(Debug, Deserialize)]
pub struct PmkidCaptureRequest {
    pub bssid: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PmkidStatusRequest {
    pub file: String,
}

type NetworkStore = Arc<std::sync::Mutex<TtlStore<String, WifiNetwork>>>;
type ClientStore = Arc<std::sync::Mutex<TtlStore<String, WifiClient>>>;

pub struct WifiController {
    scan: Supervisor,
    pmkid: Supervisor,
    bus: EventBus,
    registry: Arc<ProcessRegistry>,
    networks: NetworkStore,
    clients: ClientStore,
    oui: Arc<std::sync::Mutex<OuiTable>>,
    monitor_state: AsyncMutex<MonitorState>,
    default_interface: String,
}

impl WifiController {
    pub fn new(registry: Arc<ProcessRegistry>, oui: Arc<std::sync::Mutex<OuiTable>>) -> Self {
        Self {
            scan: Supervisor::new("wifi"),
            pmkid: Supervisor::new("wifi_pmkid"),
            bus: EventBus::new(),
            registry,
            networks: Arc::new(std::sync::Mutex::new(TtlStore::new())),
            clients: Arc::new(std::sync::Mutex::new(TtlStore::new())),
            oui,
            monitor_state: AsyncMutex::new(MonitorState::Managed),
            default_interface: "wlan0".to_string(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn networks(&self) -> NetworkStore {
        self.networks.clone()
    }

    pub fn clients(&self) -> ClientStore {
        self.clients.clone()
    }

    pub async fn interfaces(&self) -> serde_json::Value {
        let interfaces = detect_wireless_interfaces().await;
        let monitor_interface = match &*self.monitor_state.lock().await {
            MonitorState::Monitor { iface } => Some(iface.clone()),
            _ => None,
        };
        serde_json::json!({
            "interfaces": interfaces,
            "tools": tools::probe("wifi"),
            "monitor_interface": monitor_interface,
        })
    }

    pub async fn set_monitor_mode(&self, req: MonitorRequest) -> ApiResult<serde_json::Value> {
        match req.action.as_str() {
            "enable" => self.enable_monitor(&req.interface, req.kill_processes).await,
            "disable" => self.disable_monitor(&req.interface).await,
            _ => Err(ApiError::BadRequest("action must be 'enable' or 'disable'".to_string())),
        }
    }

    async fn enable_monitor(&self, interface: &str, kill_processes: bool) -> ApiResult<serde_json::Value> {
        {
            let mut state = self.monitor_state.lock().await;
            if matches!(&*state, MonitorState::Monitor { .. }) {
                return Err(ApiError::Conflict { mode: "wifi" });
            }
            *state = MonitorState::Transitioning;
        }

        let before: HashSet<String> = detect_wireless_interfaces().await.into_iter().collect();

        if kill_processes {
            let _ = tokio::time::timeout(ONE_SHOT_TIMEOUT, Command::new("airmon-ng").args(["check", "kill"]).output()).await;
        }

        let start_result =
            tokio::time::timeout(ONE_SHOT_TIMEOUT, Command::new("airmon-ng").args(["start", interface]).output()).await;
        let stdout = match start_result {
            Ok(Ok(out)) => String::from_utf8_lossy(&out.stdout).into_owned(),
            _ => {
                *self.monitor_state.lock().await = MonitorState::Managed;
                return Err(ApiError::Internal(format!("failed to run airmon-ng start {interface}")));
            }
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let after: HashSet<String> = detect_wireless_interfaces().await.into_iter().collect();
        let new_ifaces: Vec<&String> = after.iter().filter(|i| !before.contains(*i)).collect();

        // (a) a new interface whose name contains "mon"
        let mut resolved = new_ifaces.iter().find(|i| i.contains("mon")).map(|s| s.to_string());
        // (b) any new interface
        if resolved.is_none() {
            resolved = new_ifaces.first().map(|s| s.to_string());
        }
        // (c) pattern match against tool output
        if resolved.is_none() {
            resolved = extract_monitor_name_from_output(&stdout);
        }
        // (d) the original interface reported as Mode:Monitor
        if resolved.is_none() && check_iwconfig_monitor(interface).await {
            resolved = Some(interface.to_string());
        }
        // (e) <orig>mon as a last resort
        let resolved = resolved.unwrap_or_else(|| format!("{interface}mon"));

        *self.monitor_state.lock().await = MonitorState::Monitor { iface: resolved.clone() };
        self.bus
            .publish(serde_json::json!({"type": "info", "text": format!("monitor mode enabled on {resolved}")}));
        Ok(serde_json::json!({"status": "success", "interface": resolved, "state": "monitor"}))
    }

    async fn disable_monitor(&self, interface: &str) -> ApiResult<serde_json::Value> {
        let iface = {
            let state = self.monitor_state.lock().await;
            match &*state {
                MonitorState::Monitor { iface } => iface.clone(),
                _ => interface.to_string(),
            }
        };
        let _ = tokio::time::timeout(ONE_SHOT_TIMEOUT, Command::new("airmon-ng").args(["stop", &iface]).output()).await;
        *self.monitor_state.lock().await = MonitorState::Managed;
        self.bus
            .publish(serde_json::json!({"type": "info", "text": format!("monitor mode disabled on {iface}")}));
        Ok(serde_json::json!({"status": "success", "state": "managed"}))
    }

    pub async fn scan_start(&self, req: ScanStartRequest) -> ApiResult<serde_json::Value> {
        if let Some(missing) = tools::first_missing_required("wifi") {
            return Err(ApiError::DependencyMissing {
                tool: missing.bin.to_string(),
                install_hint: missing.install_hint.to_string(),
            });
        }
        if !["a", "bg", "abg"].contains(&req.band.as_str()) {
            return Err(ApiError::BadRequest("band must be 'a', 'bg', or 'abg'".to_string()));
        }
        if let Some(channel) = &req.channel {
            validate_wifi_channel(channel)?;
        }

        self.networks.lock().unwrap().clear();
        self.clients.lock().unwrap().clear();
        for ext in ["csv", "cap", "kismet.csv", "kismet.netxml"] {
            let _ = tokio::fs::remove_file(format!("/tmp/intercept_wifi-01.{ext}")).await;
        }

        let mut args = vec![
            "-w".to_string(),
            "/tmp/intercept_wifi".to_string(),
            "--output-format".to_string(),
            "csv,pcap".to_string(),
            "--band".to_string(),
            req.band.clone(),
        ];
        if let Some(channel) = &req.channel {
            args.push("-c".to_string());
            args.push(channel.clone());
        }
        args.push(req.interface.clone());
        let spec = ProcessSpec::new("airodump-ng", args);

        let networks = self.networks.clone();
        let clients = self.clients.clone();
        let oui = self.oui.clone();
        let bus = self.bus.clone();

        self.scan
            .start(
                CmdSpec::Single(spec),
                self.bus.clone(),
                self.registry.clone(),
                move |_source, mut stop| async move {
                    run_csv_poller("/tmp/intercept_wifi-01.csv", networks, clients, oui, bus, &mut stop).await;
                },
            )
            .await?;

        Ok(serde_json::json!({"status": "started"}))
    }

    pub async fn scan_stop(&self) -> ApiResult<()> {
        self.scan.stop(&self.bus, &self.registry).await.map_err(ApiError::from)
    }

    pub async fn networks_snapshot(&self) -> serde_json::Value {
        let networks: Vec<WifiNetwork> = self.networks.lock().unwrap().all().map(|(_, v)| v.clone()).collect();
        let clients: Vec<WifiClient> = self.clients.lock().unwrap().all().map(|(_, v)| v.clone()).collect();
        let monitor_interface = match &*self.monitor_state.lock().await {
            MonitorState::Monitor { iface } => Some(iface.clone()),
            _ => None,
        };
        serde_json::json!({
            "networks": networks,
            "clients": clients,
            "monitor_interface": monitor_interface,
        })
    }

    pub async fn deauth(&self, req: DeauthRequest) -> ApiResult<serde_json::Value> {
        let bssid = validate_mac(&req.bssid)?;
        let client = validate_mac(&req.client)?;
        let count = clamp_deauth_count(req.count.unwrap_or(5));

        if which::which("aireplay-ng").is_err() {
            return Err(ApiError::DependencyMissing {
                tool: "aireplay-ng".to_string(),
                install_hint: "apt install aircrack-ng".to_string(),
            });
        }

        let interface = req.interface.clone().unwrap_or_else(|| self.default_interface.clone());
        let args = vec!["--deauth".to_string(), count.to_string(), "-a".to_string(), bssid, "-c".to_string(), client, interface];

        // aireplay-ng is fire-and-forget; a timeout is reported as success.
        let _ = tokio::time::timeout(DEAUTH_TIMEOUT, Command::new("aireplay-ng").args(&args).output()).await;
        Ok(serde_json::json!({"status": "success", "count": count}))
    }

    pub async fn handshake_capture(&self, req: HandshakeCaptureRequest) -> ApiResult<serde_json::Value> {
        let bssid = validate_mac(&req.bssid)?;
        let channel = validate_wifi_channel(&req.channel)?;

        if let Some(missing) = tools::first_missing_required("wifi") {
            return Err(ApiError::DependencyMissing {
                tool: missing.bin.to_string(),
                install_hint: missing.install_hint.to_string(),
            });
        }

        let interface = req.interface.clone().unwrap_or_else(|| self.default_interface.clone());
        let bssid_compact = bssid.replace(':', "");
        let capture_path = format!("/tmp/intercept_handshake_{bssid_compact}");
        validate_capture_path(&capture_path, "handshake")?;

        let spec = ProcessSpec::new(
            "airodump-ng",
            vec![
                "-c".to_string(),
                channel.to_string(),
                "--bssid".to_string(),
                bssid.clone(),
                "-w".to_string(),
                capture_path.clone(),
                "--output-format".to_string(),
                "pcap".to_string(),
                interface,
            ],
        );

        self.scan
            .start(CmdSpec::Single(spec), self.bus.clone(), self.registry.clone(), |_source, mut stop: StopSignal| async move {
                stop.wait().await;
            })
            .await?;

        Ok(serde_json::json!({"status": "started", "capture_file": format!("{capture_path}-01.cap")}))
    }

    pub async fn handshake_status(&self, req: HandshakeStatusRequest) -> ApiResult<serde_json::Value> {
        validate_capture_path(&req.file, "handshake")?;
        let bssid = validate_mac(&req.bssid)?;

        let Ok(metadata) = tokio::fs::metadata(&req.file).await else {
            return Ok(serde_json::json!({
                "file_exists": false,
                "handshake_found": false,
                "running": self.scan.is_running().await,
            }));
        };

        let file_size = metadata.len();
        let mut handshake_found = false;
        if which::which("aircrack-ng").is_ok() {
            if let Ok(Ok(output)) = tokio::time::timeout(
                VERIFY_TIMEOUT,
                Command::new("aircrack-ng").args(["-a", "2", "-b", &bssid, &req.file]).output(),
            )
            .await
            {
                let stdout = String::from_utf8_lossy(&output.stdout);
                handshake_found = stdout.contains("handshake") && !stdout.contains("0 handshake");
            }
        }

        Ok(serde_json::json!({
            "file_exists": true,
            "file_size": file_size,
            "handshake_found": handshake_found,
        }))
    }

    pub async fn pmkid_capture(&self, req: PmkidCaptureRequest) -> ApiResult<serde_json::Value> {
        let bssid = validate_mac(&req.bssid)?;

        if which::which("hcxdumptool").is_err() {
            return Err(ApiError::DependencyMissing {
                tool: "hcxdumptool".to_string(),
                install_hint: "apt install hcxdumptool".to_string(),
            });
        }

        let interface = req.interface.clone().unwrap_or_else(|| self.default_interface.clone());
        let bssid_compact = bssid.to_lowercase().replace(':', "");
        let capture_path = format!("/tmp/intercept_pmkid_{bssid_compact}.pcapng");
        validate_capture_path(&capture_path, "pmkid")?;
        let filter_path = format!("/tmp/intercept_pmkid_filter_{bssid_compact}.txt");
        tokio::fs::write(&filter_path, format!("{bssid_compact}\n"))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let mut args = vec![
            "-i".to_string(),
            interface,
            "-o".to_string(),
            capture_path.clone(),
            "--filterlist_ap".to_string(),
            filter_path,
            "--filtermode".to_string(),
            "2".to_string(),
            "--enable_status".to_string(),
            "1".to_string(),
        ];
        if let Some(channel) = &req.channel {
            validate_wifi_channel(channel)?;
            args.push("-c".to_string());
            args.push(channel.clone());
        }
        let spec = ProcessSpec::new("hcxdumptool", args);

        self.pmkid
            .start(CmdSpec::Single(spec), self.bus.clone(), self.registry.clone(), |_source, mut stop: StopSignal| async move {
                stop.wait().await;
            })
            .await?;

        Ok(serde_json::json!({"status": "started", "capture_file": capture_path}))
    }

    pub async fn pmkid_status(&self, req: PmkidStatusRequest) -> ApiResult<serde_json::Value> {
        validate_capture_path(&req.file, "pmkid")?;

        let Ok(metadata) = tokio::fs::metadata(&req.file).await else {
            return Ok(serde_json::json!({
                "file_exists": false,
                "hash_found": false,
                "running": self.pmkid.is_running().await,
            }));
        };

        let file_size = metadata.len();
        let hash_file = req.file.replace(".pcapng", ".22000");

        let hash_found = if which::which("hcxpcapngtool").is_ok() {
            let _ = tokio::time::timeout(
                VERIFY_TIMEOUT,
                Command::new("hcxpcapngtool").args(["-o", &hash_file, &req.file]).output(),
            )
            .await;
            tokio::fs::metadata(&hash_file).await.map(|m| m.len() > 0).unwrap_or(false)
        } else {
            file_size > 1000
        };

        Ok(serde_json::json!({
            "file_exists": true,
            "file_size": file_size,
            "hash_found": hash_found,
        }))
    }

    pub async fn pmkid_stop(&self) -> ApiResult<()> {
        self.pmkid.stop(&self.bus, &self.registry).await.map_err(ApiError::from)
    }
}

async fn run_csv_poller(
    csv_path: &str,
    networks: NetworkStore,
    clients: ClientStore,
    oui: Arc<std::sync::Mutex<OuiTable>>,
    bus: EventBus,
    stop: &mut StopSignal,
) {
    let started = Instant::now();
    let mut appeared = false;
    let mut warned_missing = false;
    let mut interval = tokio::time::interval(CSV_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = stop.wait() => break,
            _ = interval.tick() => {
                match tokio::fs::read_to_string(csv_path).await {
                    Ok(content) => {
                        appeared = true;
                        let (fresh_networks, fresh_clients) = {
                            let table = oui.lock().unwrap();
                            parse_airodump_csv(&content, &table)
                        };
                        publish_network_diff(&networks, fresh_networks, &bus);
                        publish_client_diff(&clients, fresh_clients, &bus);
                    }
                    Err(_) => {
                        if !appeared && !warned_missing && started.elapsed() >= CSV_APPEAR_TIMEOUT {
                            warned_missing = true;
                            bus.publish(serde_json::json!({"type": "error", "text": "airodump-ng has not produced a CSV file yet"}));
                        }
                    }
                }
            }
        }
    }
}

fn publish_network_diff(store: &NetworkStore, fresh: std::collections::HashMap<String, WifiNetwork>, bus: &EventBus) {
    let mut guard = store.lock().unwrap();
    for (bssid, network) in fresh {
        let action = if guard.get(&bssid).is_some() { "update" } else { "new" };
        guard.upsert(bssid, network.clone());
        let mut payload = serde_json::to_value(&network).unwrap_or_default();
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("type".to_string(), serde_json::Value::String("network".to_string()));
            map.insert("action".to_string(), serde_json::Value::String(action.to_string()));
        }
        bus.publish(payload);
    }
}

fn publish_client_diff(store: &ClientStore, fresh: std::collections::HashMap<String, WifiClient>, bus: &EventBus) {
    let mut guard = store.lock().unwrap();
    for (mac, client) in fresh {
        let action = if guard.get(&mac).is_some() { "update" } else { "new" };
        guard.upsert(mac, client.clone());
        let mut payload = serde_json::to_value(&client).unwrap_or_default();
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("type".to_string(), serde_json::Value::String("client".to_string()));
            map.insert("action".to_string(), serde_json::Value::String(action.to_string()));
        }
        bus.publish(payload);
    }
}

fn extract_monitor_name_from_output(output: &str) -> Option<String> {
    for pattern in MONITOR_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(output) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

async fn check_iwconfig_monitor(interface: &str) -> bool {
    match Command::new("iwconfig").arg(interface).output().await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains("Mode:Monitor"),
        Err(_) => false,
    }
}

async fn detect_wireless_interfaces() -> Vec<String> {
    if let Ok(output) = Command::new("iw").args(["dev"]).output().await {
        if output.status.success() {
            let text = String::from_utf8_lossy(&output.stdout);
            let names: Vec<String> = text
                .lines()
                .filter_map(|l| l.trim().strip_prefix("Interface ").map(str::to_string))
                .collect();
            if !names.is_empty() {
                return names;
            }
        }
    }

    if let Ok(output) = Command::new("iwconfig").output().await {
        let text = String::from_utf8_lossy(&output.stdout);
        return text
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.is_empty() && !l.contains("no wireless extensions"))
            .filter_map(|l| l.split_whitespace().next().map(str::to_string))
            .collect();
    }

    Vec::new()
}
