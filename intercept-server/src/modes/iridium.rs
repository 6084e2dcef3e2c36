//! Iridium mode (C8), DEMO ONLY: spec.md §4.6 explicitly defers real
//! demodulation. `rtl_fm` is spawned purely as a presence signal — its raw
//! IQ byte stream carries no line structure to parse, so the demo burst
//! generator ticks on its own ~100ms interval (standing in for the
//! original's 1024-byte `read()` cycle) rather than consuming the
//! supervisor's line-oriented [`crate::supervisor::LineSource`].
//!
//! Grounded on `original_source/routes/iridium.py`'s `monitor_iridium`
//! (1% chance per cycle, capped demo burst count, `DEMO_MODE = True`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use intercept_core::parsers::iridium::maybe_demo_burst;
use intercept_core::validators::validate_frequency;
use rand::Rng;
use serde::Deserialize;

use crate::bus::EventBus;
use crate::error::{ApiError, ApiResult};
use crate::registry::ProcessRegistry;
use crate::supervisor::{CmdSpec, ModeStatusReport, ProcessSpec, Supervisor};

const READ_CYCLE: Duration = Duration::from_millis(100);
const MAX_BURSTS: usize = 100;

fn default_freq() -> String {
    "1621.25".to_string()
}
fn default_gain() -> String {
    "0".to_string()
}
fn default_sample_rate() -> String {
    "2.048e6".to_string()
}
fn default_device() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct IridiumStartRequest {
    #[serde(default = "default_freq")]
    pub freq: String,
    #[serde(default = "default_gain")]
    pub gain: String,
    #[serde(rename = "sampleRate", default = "default_sample_rate")]
    pub sample_rate: String,
    #[serde(default = "default_device")]
    pub device: String,
}

pub struct IridiumController {
    supervisor: Supervisor,
    bus: EventBus,
    registry: Arc<ProcessRegistry>,
    burst_count: Arc<AtomicUsize>,
}

impl IridiumController {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self {
            supervisor: Supervisor::new("iridium"),
            bus: EventBus::new(),
            registry,
            burst_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub async fn status(&self) -> ModeStatusReport {
        self.supervisor.status().await
    }

    pub async fn start(&self, req: IridiumStartRequest) -> ApiResult<()> {
        validate_frequency(&req.freq, 1610.0, 1650.0)?;
        req.sample_rate
            .replace('e', "E")
            .parse::<f64>()
            .map_err(|_| ApiError::BadRequest("sampleRate must be numeric".to_string()))?;

        if which::which("iridium-extractor").is_err() && which::which("rtl_fm").is_err() {
            return Err(ApiError::DependencyMissing {
                tool: "rtl_fm".to_string(),
                install_hint: "apt install rtl-sdr".to_string(),
            });
        }

        let spec = ProcessSpec::new(
            "rtl_fm",
            vec![
                "-f".to_string(),
                format!("{}M", req.freq),
                "-g".to_string(),
                req.gain.clone(),
                "-s".to_string(),
                req.sample_rate.clone(),
                "-d".to_string(),
                req.device.clone(),
                "-".to_string(),
            ],
        );

        let bus = self.bus.clone();
        let burst_count = self.burst_count.clone();
        burst_count.store(0, Ordering::SeqCst);
        let frequency_display = req.freq.clone();

        self.supervisor
            .start(
                CmdSpec::Single(spec),
                self.bus.clone(),
                self.registry.clone(),
                move |_source, mut stop| async move {
                    let mut interval = tokio::time::interval(READ_CYCLE);
                    loop {
                        tokio::select! {
                            _ = stop.wait() => break,
                            _ = interval.tick() => {
                                if burst_count.load(Ordering::SeqCst) >= MAX_BURSTS {
                                    continue;
                                }
                                let sample: f64 = rand::thread_rng().gen();
                                let n = burst_count.load(Ordering::SeqCst);
                                let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f").to_string();
                                let data = format!("[SIMULATED] Frame data - Burst #{n}");
                                if let Some(burst) = maybe_demo_burst(sample, &frequency_display, &timestamp, &data) {
                                    burst_count.fetch_add(1, Ordering::SeqCst);
                                    let mut payload = serde_json::to_value(&burst).unwrap_or_default();
                                    if let serde_json::Value::Object(ref mut map) = payload {
                                        map.insert("type".to_string(), serde_json::Value::String("burst".to_string()));
                                    }
                                    bus.publish(payload);
                                }
                            }
                        }
                    }
                },
            )
            .await?;
        Ok(())
    }

    pub async fn stop(&self) -> ApiResult<()> {
        self.supervisor.stop(&self.bus, &self.registry).await.map_err(ApiError::from)
    }

    pub fn tools_report(&self) -> serde_json::Value {
        let available = which::which("iridium-extractor").is_ok() || which::which("iridium-parser").is_ok() || which::which("rtl_fm").is_ok();
        serde_json::json!({
            "available": available,
            "demo_mode": true,
            "message": "Real Iridium decoding requires gr-iridium or iridium-toolkit, which are not integrated; this mode streams simulated bursts.",
        })
    }
}
