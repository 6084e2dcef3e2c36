//! ADS-B mode (C8), spec.md §4.6/§4.8: two cooperating paths feed one
//! aircraft store keyed by ICAO — raw Mode-S frames from `rtl_adsb`'s
//! stdout, and a JSON long-poll against a locally running `dump1090`'s web
//! endpoint. `dump1090` itself is never spawned by us (registry.rs keeps it
//! off the `killall` sweep as a host-managed service); only the raw-frame
//! path goes through the supervisor.
//!
//! Grounded on spec.md §4.6's "two cooperating paths" rule and §9's
//! re-architecture note for this exact component: "a single
//! aircraft-store writer task that consumes from two input channels
//! (raw-icao channel, json-snapshot channel) and applies updates in one
//! place — eliminates interleaved-write races." Both the raw-frame parser
//! task and the JSON poller only ever *send*; [`AircraftWriter`] is the one
//! task that locks [`AircraftStore`] for writing.

use std::sync::Arc;
use std::time::Duration;

use intercept_core::models::{Aircraft, DependencyReport};
use intercept_core::parsers::adsb::{parse_json_snapshot, parse_raw_frame_icao};
use intercept_core::store::TtlStore;
use log::debug;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::bus::EventBus;
use crate::error::{ApiError, ApiResult};
use crate::registry::ProcessRegistry;
use crate::supervisor::{CmdSpec, ModeStatusReport, ProcessSpec, Supervisor};
use crate::tools;

/// Fixed set of URLs dump1090 variants commonly serve their JSON snapshot
/// from; we try each in turn every cycle until one answers, then stick to
/// it (spec.md §4.6).
const DUMP1090_URLS: &[&str] = &[
    "http://localhost:8080/data/aircraft.json",
    "http://localhost:8754/data/aircraft.json",
    "http://localhost/dump1090/data/aircraft.json",
];

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn default_gain() -> String {
    "0".to_string()
}
fn default_device() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AdsbStartRequest {
    #[serde(default = "default_gain")]
    pub gain: String,
    #[serde(default = "default_device")]
    pub device: String,
}

type AircraftStore = Arc<std::sync::Mutex<TtlStore<String, Aircraft>>>;

pub struct AdsbController {
    supervisor: Supervisor,
    bus: EventBus,
    registry: Arc<ProcessRegistry>,
    aircraft: AircraftStore,
    raw_tx: mpsc::UnboundedSender<String>,
    snapshot_tx: mpsc::UnboundedSender<String>,
    writer: std::sync::Mutex<Option<AircraftWriter>>,
}

impl AdsbController {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        let aircraft: AircraftStore = Arc::new(std::sync::Mutex::new(TtlStore::new()));
        let bus = EventBus::new();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let writer = AircraftWriter {
            aircraft: aircraft.clone(),
            bus: bus.clone(),
            raw_rx,
            snapshot_rx,
        };

        Self {
            supervisor: Supervisor::new("adsb"),
            bus,
            registry,
            aircraft,
            raw_tx,
            snapshot_tx,
            writer: std::sync::Mutex::new(Some(writer)),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn aircraft(&self) -> AircraftStore {
        self.aircraft.clone()
    }

    pub async fn status(&self) -> ModeStatusReport {
        self.supervisor.status().await
    }

    pub fn tool_report(&self) -> DependencyReport {
        tools::probe("adsb")
    }

    /// Takes ownership of the single store-writer task; call exactly once
    /// (from [`crate::AppState::new`]) and spawn the result as a subsystem.
    pub fn writer(&self) -> AircraftWriter {
        self.writer.lock().unwrap().take().expect("adsb writer already taken")
    }

    pub async fn start(&self, req: AdsbStartRequest) -> ApiResult<()> {
        if which::which("rtl_adsb").is_err() {
            return Err(ApiError::DependencyMissing {
                tool: "rtl_adsb".to_string(),
                install_hint: "apt install rtl-sdr".to_string(),
            });
        }

        let spec = ProcessSpec::new(
            "rtl_adsb",
            vec!["-g".to_string(), req.gain.clone(), "-d".to_string(), req.device.clone()],
        );

        let raw_tx = self.raw_tx.clone();
        let bus = self.bus.clone();

        self.supervisor
            .start(
                CmdSpec::Single(spec),
                self.bus.clone(),
                self.registry.clone(),
                move |mut source, mut stop| async move {
                    loop {
                        tokio::select! {
                            _ = stop.wait() => break,
                            line = source.next_line() => {
                                let Some(line) = line else { break };
                                match parse_raw_frame_icao(&line) {
                                    Some(icao) => {
                                        let _ = raw_tx.send(icao);
                                    }
                                    None => {
                                        bus.publish(serde_json::json!({"type": "raw", "text": line}));
                                    }
                                }
                            }
                        }
                    }
                    debug!("adsb raw-frame parser task exiting");
                },
            )
            .await?;
        Ok(())
    }

    pub async fn stop(&self) -> ApiResult<()> {
        self.supervisor.stop(&self.bus, &self.registry).await.map_err(ApiError::from)
    }

    /// The JSON-polling half; spawned independently of `start`/`stop` since
    /// `dump1090` is a host-managed service we never own the lifecycle of.
    /// Only forwards fetched bodies into the writer's snapshot channel —
    /// never touches [`AircraftStore`] itself.
    pub fn json_poller(&self) -> AircraftJsonPoller {
        AircraftJsonPoller {
            snapshot_tx: self.snapshot_tx.clone(),
        }
    }
}

/// The sole writer of [`AircraftStore`], per spec.md §9's re-architecture
/// note: consumes raw ICAOs and JSON snapshot bodies off two channels and
/// applies every update from one place, so the two input paths can never
/// race each other on the same record.
pub struct AircraftWriter {
    aircraft: AircraftStore,
    bus: EventBus,
    raw_rx: mpsc::UnboundedReceiver<String>,
    snapshot_rx: mpsc::UnboundedReceiver<String>,
}

impl AircraftWriter {
    pub async fn run(mut self, subsystem: SubsystemHandle) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                icao = self.raw_rx.recv() => {
                    match icao {
                        Some(icao) => self.apply_raw(icao),
                        None => break,
                    }
                }
                body = self.snapshot_rx.recv() => {
                    match body {
                        Some(body) => self.apply_snapshot(&body),
                        None => break,
                    }
                }
                _ = subsystem.on_shutdown_requested() => break,
            }
        }
        Ok(())
    }

    fn apply_raw(&self, icao: String) {
        let mut store = self.aircraft.lock().unwrap();
        let record = store.get(&icao).cloned().unwrap_or_else(|| Aircraft {
            icao: icao.clone(),
            ..Default::default()
        });
        store.upsert(icao.clone(), record.clone());
        drop(store);
        self.publish(record);
    }

    fn apply_snapshot(&self, body: &str) {
        for entry in parse_json_snapshot(body) {
            let mut store = self.aircraft.lock().unwrap();
            let mut record = store.get(&entry.icao).cloned().unwrap_or_else(|| Aircraft {
                icao: entry.icao.clone(),
                ..Default::default()
            });
            record.merge_json(&entry.value);
            store.upsert(entry.icao.clone(), record.clone());
            drop(store);
            self.publish(record);
        }
    }

    fn publish(&self, record: Aircraft) {
        let mut payload = serde_json::to_value(&record).unwrap_or_default();
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("type".to_string(), serde_json::Value::String("aircraft".to_string()));
        }
        self.bus.publish(payload);
    }
}

pub struct AircraftJsonPoller {
    snapshot_tx: mpsc::UnboundedSender<String>,
}

impl AircraftJsonPoller {
    pub async fn run(self, subsystem: SubsystemHandle) -> anyhow::Result<()> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(2)).build()?;
        let mut sticky_url: Option<&'static str> = None;
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let urls: &[&str] = match sticky_url {
                        Some(url) => std::slice::from_ref(&url),
                        None => DUMP1090_URLS,
                    };
                    for &url in urls {
                        match client.get(url).send().await {
                            Ok(response) if response.status().is_success() => {
                                if let Ok(body) = response.text().await {
                                    let _ = self.snapshot_tx.send(body);
                                    sticky_url = Some(url);
                                }
                                break;
                            }
                            Ok(_) => continue,
                            Err(_) => continue,
                        }
                    }
                }
                _ = subsystem.on_shutdown_requested() => break,
            }
        }
        Ok(())
    }
}
