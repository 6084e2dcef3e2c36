//! Pager mode (C8): `rtl_fm | multimon-ng`, POCSAG/FLEX decoding, spec.md §4.6.
//!
//! Grounded on `original_source/routes/pager.py`'s start/stop/stream/logging
//! verbs, with the two-stage pipeline running through
//! [`crate::supervisor::Supervisor`] instead of two module-level `Popen`
//! handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use intercept_core::parsers::pager::parse_line;
use intercept_core::validators::validate_frequency;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::bus::EventBus;
use crate::error::{ApiError, ApiResult};
use crate::registry::ProcessRegistry;
use crate::supervisor::{CmdSpec, ProcessSpec, Supervisor};
use crate::tools;

const KNOWN_PROTOCOLS: &[&str] = &["POCSAG512", "POCSAG1200", "POCSAG2400", "FLEX"];

#[derive(Debug, Deserialize)]
pub struct PagerStartRequest {
    pub frequency: String,
    #[serde(default = "default_gain")]
    pub gain: String,
    #[serde(default = "default_squelch")]
    pub squelch: String,
    #[serde(default = "default_ppm")]
    pub ppm: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub protocols: Vec<String>,
}

fn default_gain() -> String {
    "0".to_string()
}
fn default_squelch() -> String {
    "0".to_string()
}
fn default_ppm() -> String {
    "0".to_string()
}
fn default_device() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LoggingRequest {
    pub enabled: bool,
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PagerStatusResponse {
    #[serde(flatten)]
    pub mode: crate::supervisor::ModeStatusReport,
    pub logging_enabled: bool,
    pub log_file: Option<String>,
}

struct LoggingState {
    enabled: bool,
    log_file: Option<String>,
}

pub struct PagerController {
    supervisor: Supervisor,
    bus: EventBus,
    registry: Arc<ProcessRegistry>,
    logging: Mutex<LoggingState>,
    /// Set for the duration of `stop()`; lets the parser task drop any line
    /// it reads between `stop_tx` firing and the pipeline actually tearing
    /// down instead of publishing a trailing decode after the client asked
    /// us to stop.
    stopping: Arc<AtomicBool>,
}

impl PagerController {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self {
            supervisor: Supervisor::new("pager"),
            bus: EventBus::new(),
            registry,
            logging: Mutex::new(LoggingState {
                enabled: false,
                log_file: None,
            }),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub async fn status(&self) -> PagerStatusResponse {
        let log = self.logging.lock().await;
        PagerStatusResponse {
            mode: self.supervisor.status().await,
            logging_enabled: log.enabled,
            log_file: log.log_file.clone(),
        }
    }

    pub async fn set_logging(&self, req: LoggingRequest) {
        let mut log = self.logging.lock().await;
        log.enabled = req.enabled;
        if req.log_file.is_some() {
            log.log_file = req.log_file;
        }
    }

    pub async fn start(&self, req: PagerStartRequest) -> ApiResult<()> {
        validate_frequency(&req.frequency, 100.0, 1000.0)?;

        if let Some(missing) = tools::first_missing_required("pager") {
            return Err(ApiError::DependencyMissing {
                tool: missing.bin.to_string(),
                install_hint: missing.install_hint.to_string(),
            });
        }

        let mut protocols: Vec<String> = req
            .protocols
            .iter()
            .filter(|p| KNOWN_PROTOCOLS.contains(&p.as_str()))
            .cloned()
            .collect();
        if protocols.is_empty() {
            protocols.push("POCSAG1200".to_string());
        }

        let rtl_fm = ProcessSpec::new(
            "rtl_fm",
            vec![
                "-f".to_string(),
                format!("{}M", req.frequency),
                "-M".to_string(),
                "fm".to_string(),
                "-s".to_string(),
                "22050".to_string(),
                "-g".to_string(),
                req.gain.clone(),
                "-p".to_string(),
                req.ppm.clone(),
                "-l".to_string(),
                req.squelch.clone(),
                "-d".to_string(),
                req.device.clone(),
                "-".to_string(),
            ],
        );

        let mut multimon_args = vec!["-t".to_string(), "raw".to_string()];
        for protocol in &protocols {
            multimon_args.push("-a".to_string());
            multimon_args.push(protocol.clone());
        }
        multimon_args.push("-f".to_string());
        multimon_args.push("alpha".to_string());
        multimon_args.push("-".to_string());
        let multimon = ProcessSpec::new("multimon-ng", multimon_args).with_pty();

        let logging_enabled = self.logging.lock().await.enabled;
        let log_file = self.logging.lock().await.log_file.clone();
        let bus = self.bus.clone();
        let stopping = self.stopping.clone();

        self.supervisor
            .start(
                CmdSpec::Piped(rtl_fm, multimon),
                self.bus.clone(),
                self.registry.clone(),
                move |mut source, mut stop| async move {
                    let mut log_handle = match (logging_enabled, &log_file) {
                        (true, Some(path)) => tokio::fs::OpenOptions::new().create(true).append(true).open(path).await.ok(),
                        _ => None,
                    };
                    loop {
                        tokio::select! {
                            _ = stop.wait() => break,
                            line = source.next_line() => {
                                let Some(line) = line else { break };
                                if stopping.load(Ordering::SeqCst) {
                                    continue;
                                }
                                let timestamp = chrono::Utc::now().format("%H:%M:%S").to_string();
                                match parse_line(&line, &timestamp) {
                                    Some(message) => {
                                        let mut payload = serde_json::to_value(&message).unwrap_or_default();
                                        if let serde_json::Value::Object(ref mut map) = payload {
                                            map.insert("type".to_string(), serde_json::Value::String("message".to_string()));
                                        }
                                        if let Some(handle) = log_handle.as_mut() {
                                            // One tab-separated line per message, spec.md §4.6.
                                            let field = |key: &str| payload.get(key).and_then(|v| v.as_str()).unwrap_or_default();
                                            let entry = format!(
                                                "{}\t{}\t{}\t{}\t{}\t{}\n",
                                                field("timestamp"),
                                                field("protocol"),
                                                field("address"),
                                                field("function"),
                                                field("msg_type"),
                                                field("message"),
                                            );
                                            let _ = handle.write_all(entry.as_bytes()).await;
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
                    debug!("pager parser task exiting");
                },
            )
            .await?;
        Ok(())
    }

    pub async fn stop(&self) -> ApiResult<()> {
        self.stopping.store(true, Ordering::SeqCst);
        let result = self.supervisor.stop(&self.bus, &self.registry).await;
        self.stopping.store(false, Ordering::SeqCst);
        result.map_err(ApiError::from)
    }
}
