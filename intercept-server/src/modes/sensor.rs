//! 433 MHz ISM-band sensor mode (C8), spec.md §4.6/§4.8: a single
//! `rtl_433 -F json` process whose stdout is one JSON object per line.
//!
//! Grounded on `original_source/routes/pager.py`'s single-pipeline
//! start/stop/stream shape (no piped downstream decoder here, unlike
//! pager's `rtl_fm | multimon-ng`) and spec.md §4.6's sensor-parser rule:
//! invalid JSON lines become `raw` events rather than being dropped.

use std::sync::Arc;

use intercept_core::models::SensorReading;
use intercept_core::parsers::sensor::parse_sensor_line;
use intercept_core::store::TtlStore;
use log::debug;
use serde::Deserialize;

use crate::bus::EventBus;
use crate::error::{ApiError, ApiResult};
use crate::registry::ProcessRegistry;
use crate::supervisor::{CmdSpec, ModeStatusReport, ProcessSpec, Supervisor};
use crate::tools;

fn default_gain() -> String {
    "0".to_string()
}
fn default_device() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SensorStartRequest {
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_gain")]
    pub gain: String,
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_frequency() -> String {
    "433.92".to_string()
}

pub struct SensorController {
    supervisor: Supervisor,
    bus: EventBus,
    registry: Arc<ProcessRegistry>,
    readings: Arc<std::sync::Mutex<TtlStore<(String, String), SensorReading>>>,
}

impl SensorController {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self {
            supervisor: Supervisor::new("sensor"),
            bus: EventBus::new(),
            registry,
            readings: Arc::new(std::sync::Mutex::new(TtlStore::new())),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn readings(&self) -> Arc<std::sync::Mutex<TtlStore<(String, String), SensorReading>>> {
        self.readings.clone()
    }

    pub async fn status(&self) -> ModeStatusReport {
        self.supervisor.status().await
    }

    pub async fn start(&self, req: SensorStartRequest) -> ApiResult<()> {
        intercept_core::validators::validate_frequency(&req.frequency, 300.0, 928.0)?;

        if let Some(missing) = tools::first_missing_required("sensor") {
            return Err(ApiError::DependencyMissing {
                tool: missing.bin.to_string(),
                install_hint: missing.install_hint.to_string(),
            });
        }

        let spec = ProcessSpec::new(
            "rtl_433",
            vec![
                "-f".to_string(),
                format!("{}M", req.frequency),
                "-g".to_string(),
                req.gain.clone(),
                "-d".to_string(),
                req.device.clone(),
                "-F".to_string(),
                "json".to_string(),
            ],
        );

        let readings = self.readings.clone();
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
                                if line.trim().is_empty() {
                                    continue;
                                }
                                match parse_sensor_line(&line) {
                                    Ok(reading) => {
                                        let key = reading.identity();
                                        readings.lock().unwrap().upsert(key, reading.clone());
                                        let mut payload = serde_json::to_value(&reading).unwrap_or_default();
                                        if let serde_json::Value::Object(ref mut map) = payload {
                                            map.insert("type".to_string(), serde_json::Value::String("sensor".to_string()));
                                        }
                                        bus.publish(payload);
                                    }
                                    Err(_) => {
                                        bus.publish(serde_json::json!({"type": "raw", "text": line}));
                                    }
                                }
                            }
                        }
                    }
                    debug!("sensor parser task exiting");
                },
            )
            .await?;
        Ok(())
    }

    pub async fn stop(&self) -> ApiResult<()> {
        self.supervisor.stop(&self.bus, &self.registry).await.map_err(ApiError::from)
    }
}
