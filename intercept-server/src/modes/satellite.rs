//! Satellite tracking mode (C8/C9), spec.md §4.8/§4.9: a thin HTTP-facing
//! wrapper over `intercept_core::satellite`'s pure SGP4 math and
//! `intercept_core::tle`'s cache, plus the CelesTrak network fetch.
//!
//! Grounded on `original_source/routes/satellite.py`'s `predict`/`position`/
//! `update-tle`/`celestrak/<category>` handlers, reimplemented against
//! `sgp4` instead of `skyfield` (see DESIGN.md) with the same
//! NORAD-id/display-name/color tables now living in `intercept_core::tle`.

use std::sync::Arc;

use chrono::Utc;
use intercept_core::models::{SatellitePass, SatellitePosition};
use intercept_core::tle::{display_color, norad_for, TleCache};
use intercept_core::validators::{validate_hours, validate_latitude, validate_longitude, validate_min_elevation};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::ApiResult;
use crate::satellite_fetch::{self, FetchError};

const DEFAULT_SATELLITES: &[&str] = &["ISS", "NOAA-15", "NOAA-18", "NOAA-19"];

fn default_lat() -> f64 {
    51.5074
}
fn default_lon() -> f64 {
    -0.1278
}
fn default_hours() -> f64 {
    24.0
}
fn default_min_el() -> f64 {
    10.0
}
fn default_true() -> bool {
    true
}
fn default_satellites() -> Vec<String> {
    DEFAULT_SATELLITES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(alias = "lat", default = "default_lat")]
    pub latitude: f64,
    #[serde(alias = "lon", default = "default_lon")]
    pub longitude: f64,
    #[serde(default = "default_hours")]
    pub hours: f64,
    #[serde(rename = "minEl", default = "default_min_el")]
    pub min_el: f64,
    #[serde(default = "default_satellites")]
    pub satellites: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    #[serde(alias = "lat", default = "default_lat")]
    pub latitude: f64,
    #[serde(alias = "lon", default = "default_lon")]
    pub longitude: f64,
    #[serde(default)]
    pub satellites: Vec<String>,
    #[serde(rename = "includeTrack", default = "default_true")]
    pub include_track: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTleRequest {
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,
}

fn default_groups() -> Vec<String> {
    vec!["stations".to_string(), "weather".to_string()]
}

pub struct SatelliteController {
    cache: Arc<Mutex<TleCache>>,
}

impl SatelliteController {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(TleCache::default())),
        }
    }

    pub fn cache(&self) -> Arc<Mutex<TleCache>> {
        self.cache.clone()
    }

    pub async fn predict(&self, req: PredictRequest) -> ApiResult<Vec<SatellitePass>> {
        let lat = validate_latitude(req.latitude)?;
        let lon = validate_longitude(req.longitude)?;
        let hours = validate_hours(req.hours)?;
        let min_el = validate_min_elevation(req.min_el)?;

        let cache = self.cache.lock().await;
        let mut satellites = Vec::new();
        for name in &req.satellites {
            let Some(entry) = cache.get(name) else { continue };
            let Some(norad) = norad_for(name) else { continue };
            satellites.push((name.clone(), norad, entry.clone(), display_color(name).to_string()));
        }
        drop(cache);

        Ok(intercept_core::satellite::predict(&satellites, lat, lon, hours, min_el, Utc::now()))
    }

    pub async fn position(&self, req: PositionRequest) -> ApiResult<Vec<SatellitePosition>> {
        let lat = validate_latitude(req.latitude)?;
        let lon = validate_longitude(req.longitude)?;

        let cache = self.cache.lock().await;
        let mut satellites = Vec::new();
        for name in &req.satellites {
            let Some(entry) = cache.get(name) else { continue };
            satellites.push((name.clone(), entry.clone()));
        }
        drop(cache);

        Ok(intercept_core::satellite::position(
            &satellites,
            lat,
            lon,
            req.include_track,
            Utc::now(),
        ))
    }

    pub async fn update_tle(&self, req: UpdateTleRequest) -> Result<Vec<String>, FetchError> {
        let mut updated = Vec::new();
        for group in &req.groups {
            match satellite_fetch::update_from_celestrak(&self.cache, group).await {
                Ok(n) if n > 0 => updated.push(format!("{group} ({n})")),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(updated)
    }

    pub async fn celestrak_category(&self, category: &str) -> Result<Vec<intercept_core::tle::TleTriplet>, FetchError> {
        satellite_fetch::fetch_category(category).await
    }
}

impl Default for SatelliteController {
    fn default() -> Self {
        Self::new()
    }
}

pub const VALID_CELESTRAK_CATEGORIES: &[&str] = &[
    "stations",
    "weather",
    "noaa",
    "goes",
    "resource",
    "sarsat",
    "dmc",
    "tdrss",
    "argos",
    "planet",
    "spire",
    "geo",
    "intelsat",
    "ses",
    "iridium",
    "iridium-NEXT",
    "starlink",
    "oneweb",
    "amateur",
    "cubesat",
    "visual",
];
