//! Domain entities from spec.md §3. Unknown fields from free-form external
//! JSON (the 433 MHz sensor payload in particular) are preserved under
//! `extra` rather than dropped, so the browser UI contract survives fields
//! this struct set does not name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtlSdrDevice {
    pub index: u32,
    pub name: String,
    pub serial: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PagerProtocol {
    #[serde(rename = "POCSAG512")]
    Pocsag512,
    #[serde(rename = "POCSAG1200")]
    Pocsag1200,
    #[serde(rename = "POCSAG2400")]
    Pocsag2400,
    Flex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Alpha,
    Numeric,
    Tone,
    #[serde(rename = "ALN")]
    Aln,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerMessage {
    pub protocol: PagerProtocol,
    pub address: String,
    pub function: String,
    pub msg_type: MessageType,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SensorReading {
    /// Identity key per spec.md §3: `(model, id|channel|unit|"0")`.
    pub fn identity(&self) -> (String, String) {
        let model = self.model.clone().unwrap_or_else(|| "unknown".to_string());
        let sub = ["id", "channel", "unit"]
            .iter()
            .find_map(|key| self.extra.get(*key))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "0".to_string());
        (model, sub)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub bssid: String,
    pub essid: String,
    pub channel: String,
    pub privacy: String,
    pub cipher: String,
    pub auth: String,
    pub power: String,
    pub beacons: String,
    pub first_seen: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiClient {
    pub mac: String,
    pub bssid: String,
    pub power: String,
    pub packets: String,
    pub probes: String,
    pub vendor: String,
    pub first_seen: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BluetoothDeviceType {
    Audio,
    Wearable,
    Phone,
    Tracker,
    Input,
    Media,
    Computer,
    Imaging,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerType {
    AirTag,
    Tile,
    SmartTag,
    Chipolo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerInfo {
    #[serde(rename = "type")]
    pub kind: TrackerType,
    pub name: String,
    pub risk: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub mac: String,
    pub name: String,
    pub manufacturer: String,
    pub device_type: BluetoothDeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerInfo>,
    pub rssi: Option<i32>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aircraft {
    pub icao: String,
    pub callsign: Option<String>,
    pub altitude: Option<i32>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub squawk: Option<String>,
    pub rssi: Option<f64>,
    #[serde(skip)]
    pub last_seen: Option<std::time::Instant>,
}

impl Aircraft {
    /// Merge a JSON enrichment snapshot; missing fields retain prior values.
    pub fn merge_json(&mut self, snapshot: &serde_json::Value) {
        macro_rules! merge_field {
            ($field:ident, $json_key:expr, $as_fn:ident) => {
                if let Some(v) = snapshot.get($json_key).and_then(|v| v.$as_fn()) {
                    self.$field = Some(v.into());
                }
            };
        }
        merge_field!(callsign, "flight", as_str);
        if let Some(v) = snapshot.get("altitude").and_then(|v| v.as_i64()) {
            self.altitude = Some(v as i32);
        }
        merge_field!(speed, "gs", as_f64);
        merge_field!(heading, "track", as_f64);
        merge_field!(lat, "lat", as_f64);
        merge_field!(lon, "lon", as_f64);
        merge_field!(squawk, "squawk", as_str);
        merge_field!(rssi, "rssi", as_f64);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassTrajectoryPoint {
    pub el: f64,
    pub az: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTrackPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatellitePass {
    pub satellite: String,
    pub norad: u32,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "startTimeISO")]
    pub start_time_iso: String,
    #[serde(rename = "maxEl")]
    pub max_el: f64,
    pub duration: i64,
    pub trajectory: Vec<PassTrajectoryPoint>,
    #[serde(rename = "groundTrack")]
    pub ground_track: Vec<GroundTrackPoint>,
    #[serde(rename = "currentPos")]
    pub current_pos: GroundTrackPoint,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub past: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatellitePosition {
    pub satellite: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub elevation: f64,
    pub azimuth: f64,
    pub distance: f64,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<Vec<TrackPoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IridiumBurst {
    pub demo: bool,
    pub time: String,
    pub frequency: String,
    pub data: String,
}

/// Per-tool probe result backing `/dependencies` (C1, ambient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    pub present: bool,
    pub required: bool,
    pub install_hint: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub ready: bool,
    pub missing: Vec<String>,
    pub tools: Vec<ToolStatus>,
}

/// Classified early-exit/runtime cause, spec.md §4.5 step 6 / §7.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum SupervisorFailure {
    Permission,
    NoSuchDevice,
    Busy,
    MonitorModeNotActive,
    Generic { detail: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_command: Option<String>,
}

pub type ExtraFields = HashMap<String, serde_json::Value>;
