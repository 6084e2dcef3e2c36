//! Satellite pass prediction and live position, C2/§4.9.
//!
//! Orbit propagation itself is delegated to the `sgp4` crate; this module
//! owns only the rise/set search, trajectory sampling and ground-track
//! geometry that `original_source/routes/satellite.py` built on top of
//! skyfield's `find_discrete`/`wgs84.subpoint`.

use crate::models::{GroundTrackPoint, PassTrajectoryPoint, SatellitePass, SatellitePosition, TrackPoint};
use crate::tle::TleEntry;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use thiserror::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;
const WGS84_A_KM: f64 = 6378.137;
const WGS84_F: f64 = 1.0 / 298.257223563;

#[derive(Error, Debug)]
pub enum SatelliteError {
    #[error("satellite {0} has no seeded TLE data")]
    Unseeded(String),
    #[error("invalid TLE elements for {0}")]
    InvalidElements(String),
    #[error("propagation failed for {0}")]
    Propagation(String),
}

struct Propagator {
    constants: sgp4::Constants,
    epoch: chrono::NaiveDateTime,
}

fn build_propagator(display_name: &str, line1: &str, line2: &str) -> Result<Propagator, SatelliteError> {
    let elements = sgp4::Elements::from_tle(
        Some(display_name.to_string()),
        line1.as_bytes(),
        line2.as_bytes(),
    )
    .map_err(|_| SatelliteError::InvalidElements(display_name.to_string()))?;
    let epoch = elements.datetime;
    let constants = sgp4::Constants::from_elements(&elements)
        .map_err(|_| SatelliteError::InvalidElements(display_name.to_string()))?;
    Ok(Propagator { constants, epoch })
}

/// Minutes-since-TLE-epoch for an arbitrary UTC instant, the unit `sgp4`
/// propagates against.
fn datetime_to_minutes_since_epoch(prop: &Propagator, at: DateTime<Utc>) -> f64 {
    let delta = at.naive_utc() - prop.epoch;
    delta.num_milliseconds() as f64 / 60_000.0
}

struct Geo {
    lat_deg: f64,
    lon_deg: f64,
    alt_km: f64,
}

/// ECI (true-equator-of-date, `sgp4`'s TEME frame) position to a geodetic
/// fix, ignoring Earth rotation-to-ECEF precision refinements beyond GMST.
fn eci_to_geodetic(position_km: [f64; 3], at: DateTime<Utc>) -> Geo {
    let gmst = greenwich_mean_sidereal_time(at);
    let x = position_km[0];
    let y = position_km[1];
    let z = position_km[2];

    let lon_eci = y.atan2(x);
    let mut lon_deg = (lon_eci - gmst).to_degrees() % 360.0;
    if lon_deg > 180.0 {
        lon_deg -= 360.0;
    }
    if lon_deg < -180.0 {
        lon_deg += 360.0;
    }

    let r_xy = (x * x + y * y).sqrt();
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let mut lat = z.atan2(r_xy);
    for _ in 0..5 {
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        lat = (z + n * e2 * sin_lat).atan2(r_xy);
    }
    let sin_lat = lat.sin();
    let n = WGS84_A_KM / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let alt_km = r_xy / lat.cos() - n;

    Geo {
        lat_deg: lat.to_degrees(),
        lon_deg,
        alt_km,
    }
}

fn greenwich_mean_sidereal_time(at: DateTime<Utc>) -> f64 {
    let jd = julian_day(at);
    let t = (jd - 2451545.0) / 36525.0;
    let mut gmst_deg = 280.460_618_37 + 360.985_647_366_29 * (jd - 2451545.0)
        + 0.000387933 * t * t
        - t * t * t / 38710000.0;
    gmst_deg %= 360.0;
    if gmst_deg < 0.0 {
        gmst_deg += 360.0;
    }
    gmst_deg.to_radians()
}

fn julian_day(at: DateTime<Utc>) -> f64 {
    let unix_seconds = at.timestamp() as f64 + at.timestamp_subsec_millis() as f64 / 1000.0;
    unix_seconds / 86400.0 + 2440587.5
}

struct TopoFix {
    elevation_deg: f64,
    azimuth_deg: f64,
    distance_km: f64,
}

/// Elevation/azimuth/slant range of `sat_km` as seen from `observer_lat`/`observer_lon`
/// at sea level, using a spherical-Earth ECEF approximation adequate for a
/// tactical orchestrator (not survey-grade geodesy).
fn topocentric(sat_eci_km: [f64; 3], at: DateTime<Utc>, observer_lat: f64, observer_lon: f64) -> TopoFix {
    let gmst = greenwich_mean_sidereal_time(at);
    // Rotate satellite ECI -> ECEF.
    let cos_g = gmst.cos();
    let sin_g = gmst.sin();
    let sat_ecef = [
        sat_eci_km[0] * cos_g + sat_eci_km[1] * sin_g,
        -sat_eci_km[0] * sin_g + sat_eci_km[1] * cos_g,
        sat_eci_km[2],
    ];

    let lat = observer_lat.to_radians();
    let lon = observer_lon.to_radians();
    let obs_ecef = [
        EARTH_RADIUS_KM * lat.cos() * lon.cos(),
        EARTH_RADIUS_KM * lat.cos() * lon.sin(),
        EARTH_RADIUS_KM * lat.sin(),
    ];

    let rx = sat_ecef[0] - obs_ecef[0];
    let ry = sat_ecef[1] - obs_ecef[1];
    let rz = sat_ecef[2] - obs_ecef[2];

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let sin_lon = lon.sin();
    let cos_lon = lon.cos();

    let south = sin_lat * cos_lon * rx + sin_lat * sin_lon * ry - cos_lat * rz;
    let east = -sin_lon * rx + cos_lon * ry;
    let up = cos_lat * cos_lon * rx + cos_lat * sin_lon * ry + sin_lat * rz;

    let range = (rx * rx + ry * ry + rz * rz).sqrt();
    let elevation = (up / range).asin().to_degrees();
    let mut azimuth = east.atan2(-south).to_degrees();
    if azimuth < 0.0 {
        azimuth += 360.0;
    }

    TopoFix {
        elevation_deg: elevation,
        azimuth_deg: azimuth,
        distance_km: range,
    }
}

fn propagate(prop: &Propagator, at: DateTime<Utc>) -> Result<[f64; 3], SatelliteError> {
    let minutes = datetime_to_minutes_since_epoch(prop, at);
    let prediction = prop
        .constants
        .propagate(sgp4::MinutesSinceEpoch(minutes))
        .map_err(|_| SatelliteError::Propagation(String::new()))?;
    Ok(prediction.position)
}

fn resolve(name: &str, entry: &TleEntry) -> Result<Propagator, SatelliteError> {
    match entry {
        TleEntry::Unseeded => Err(SatelliteError::Unseeded(name.to_string())),
        TleEntry::Seeded {
            display_name,
            line1,
            line2,
        } => build_propagator(display_name, line1, line2),
    }
}

/// Predicts passes above `min_el_deg` over the next `hours`, for every
/// `(internal_name, norad, tle, color)` tuple in `satellites`.
pub fn predict(
    satellites: &[(String, u32, TleEntry, String)],
    observer_lat: f64,
    observer_lon: f64,
    hours: f64,
    min_el_deg: f64,
    now: DateTime<Utc>,
) -> Vec<SatellitePass> {
    let mut passes = Vec::new();
    let horizon = now + ChronoDuration::milliseconds((hours * 3_600_000.0) as i64);

    for (name, norad, entry, color) in satellites {
        let prop = match resolve(name, entry) {
            Ok(p) => p,
            Err(_) => continue,
        };

        let step = ChronoDuration::seconds(120);
        let mut t = now;
        let mut was_up = match is_above_horizon(&prop, t, observer_lat, observer_lon) {
            Some(v) => v,
            None => continue,
        };
        let mut rise: Option<DateTime<Utc>> = if was_up { Some(t) } else { None };

        t = t + step;
        while t <= horizon {
            let up = match is_above_horizon(&prop, t, observer_lat, observer_lon) {
                Some(v) => v,
                None => {
                    t = t + step;
                    continue;
                }
            };
            if up && !was_up {
                rise = Some(t);
            } else if !up && was_up {
                if let Some(rise_time) = rise.take() {
                    if let Some(pass) = build_pass(
                        &prop, name, *norad, color, rise_time, t, observer_lat, observer_lon, min_el_deg, now,
                    ) {
                        passes.push(pass);
                    }
                }
            }
            was_up = up;
            t = t + step;
        }
    }

    passes.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    passes
}

fn is_above_horizon(prop: &Propagator, at: DateTime<Utc>, lat: f64, lon: f64) -> Option<bool> {
    let eci = propagate(prop, at).ok()?;
    let fix = topocentric(eci, at, lat, lon);
    Some(fix.elevation_deg > 0.0)
}

#[allow(clippy::too_many_arguments)]
fn build_pass(
    prop: &Propagator,
    name: &str,
    norad: u32,
    color: &str,
    rise: DateTime<Utc>,
    set: DateTime<Utc>,
    observer_lat: f64,
    observer_lon: f64,
    min_el_deg: f64,
    now: DateTime<Utc>,
) -> Option<SatellitePass> {
    const NUM_TRAJECTORY_POINTS: usize = 30;
    const NUM_GROUND_TRACK_POINTS: usize = 60;

    let duration_seconds = (set - rise).num_milliseconds() as f64 / 1000.0;
    let mut trajectory = Vec::with_capacity(NUM_TRAJECTORY_POINTS);
    let mut max_elevation = 0.0_f64;

    for k in 0..NUM_TRAJECTORY_POINTS {
        let frac = k as f64 / (NUM_TRAJECTORY_POINTS - 1) as f64;
        let t_point = rise + ChronoDuration::milliseconds((duration_seconds * frac * 1000.0) as i64);
        let eci = propagate(prop, t_point).ok()?;
        let fix = topocentric(eci, t_point, observer_lat, observer_lon);
        if fix.elevation_deg > max_elevation {
            max_elevation = fix.elevation_deg;
        }
        trajectory.push(PassTrajectoryPoint {
            el: fix.elevation_deg.max(0.0),
            az: fix.azimuth_deg,
        });
    }

    if max_elevation < min_el_deg {
        return None;
    }

    let mut ground_track = Vec::with_capacity(NUM_GROUND_TRACK_POINTS);
    for k in 0..NUM_GROUND_TRACK_POINTS {
        let frac = k as f64 / (NUM_GROUND_TRACK_POINTS - 1) as f64;
        let t_point = rise + ChronoDuration::milliseconds((duration_seconds * frac * 1000.0) as i64);
        let eci = propagate(prop, t_point).ok()?;
        let geo = eci_to_geodetic(eci, t_point);
        ground_track.push(GroundTrackPoint {
            lat: geo.lat_deg,
            lon: geo.lon_deg,
        });
    }

    let current_eci = propagate(prop, now).ok()?;
    let current_geo = eci_to_geodetic(current_eci, now);

    Some(SatellitePass {
        satellite: name.to_string(),
        norad,
        start_time: rise.format("%Y-%m-%d %H:%M UTC").to_string(),
        start_time_iso: rise.to_rfc3339(),
        max_el: (max_elevation * 10.0).round() / 10.0,
        duration: (duration_seconds / 60.0) as i64,
        trajectory,
        ground_track,
        current_pos: GroundTrackPoint {
            lat: current_geo.lat_deg,
            lon: current_geo.lon_deg,
        },
        color: color.to_string(),
    })
}

/// Live position (and, optionally, a ±45 minute ground track) for each
/// `(name, tle)` pair.
pub fn position(
    satellites: &[(String, TleEntry)],
    observer_lat: f64,
    observer_lon: f64,
    include_track: bool,
    now: DateTime<Utc>,
) -> Vec<SatellitePosition> {
    let mut positions = Vec::new();

    for (name, entry) in satellites {
        let prop = match resolve(name, entry) {
            Ok(p) => p,
            Err(_) => continue,
        };
        let eci = match propagate(&prop, now) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let geo = eci_to_geodetic(eci, now);
        let fix = topocentric(eci, now, observer_lat, observer_lon);

        let track = if include_track {
            let mut points = Vec::with_capacity(91);
            for offset in -45..=45 {
                let t_point = now + ChronoDuration::minutes(offset);
                if let Ok(eci_point) = propagate(&prop, t_point) {
                    let geo_point = eci_to_geodetic(eci_point, t_point);
                    points.push(TrackPoint {
                        lat: geo_point.lat_deg,
                        lon: geo_point.lon_deg,
                        past: offset < 0,
                    });
                }
            }
            Some(points)
        } else {
            None
        };

        positions.push(SatellitePosition {
            satellite: name.clone(),
            lat: geo.lat_deg,
            lon: geo.lon_deg,
            altitude: geo.alt_km,
            elevation: fix.elevation_deg,
            azimuth: fix.azimuth_deg,
            distance: fix.distance_km,
            visible: fix.elevation_deg > 0.0,
            track,
        });
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISS_LINE1: &str = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9002";
    const ISS_LINE2: &str = "2 25544  51.6400 208.9163 0006317  69.9862  25.2280 15.49560892372430";

    fn iss_entry() -> TleEntry {
        TleEntry::Seeded {
            display_name: "ISS (ZARYA)".to_string(),
            line1: ISS_LINE1.to_string(),
            line2: ISS_LINE2.to_string(),
        }
    }

    #[test]
    fn position_reports_sane_ranges() {
        let now = DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
        let positions = position(&[("ISS".to_string(), iss_entry())], 51.5074, -0.1278, false, now);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert!((-90.0..=90.0).contains(&p.lat));
        assert!((-180.0..=180.0).contains(&p.lon));
        assert!(p.altitude > 300.0 && p.altitude < 500.0);
        assert!(p.distance > 0.0);
    }

    #[test]
    fn unseeded_satellite_is_skipped_not_panicking() {
        let now = DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
        let positions = position(&[("NOAA-15".to_string(), TleEntry::Unseeded)], 51.5074, -0.1278, false, now);
        assert!(positions.is_empty());
    }

    #[test]
    fn track_includes_past_and_future_points() {
        let now = DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
        let positions = position(&[("ISS".to_string(), iss_entry())], 51.5074, -0.1278, true, now);
        let track = positions[0].track.as_ref().unwrap();
        assert!(track.len() > 80);
        assert!(track.iter().any(|p| p.past));
        assert!(track.iter().any(|p| !p.past));
    }

    #[test]
    fn predict_sorts_by_start_time() {
        let now = DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
        let satellites = vec![("ISS".to_string(), 25544u32, iss_entry(), "#00ffff".to_string())];
        let passes = predict(&satellites, 51.5074, -0.1278, 24.0, 0.0, now);
        let mut sorted = passes.clone();
        sorted.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        assert_eq!(
            passes.iter().map(|p| p.start_time.clone()).collect::<Vec<_>>(),
            sorted.iter().map(|p| p.start_time.clone()).collect::<Vec<_>>()
        );
    }
}
