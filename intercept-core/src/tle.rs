//! TLE (Two-Line Element) cache, C2.
//!
//! The seed set mirrors `original_source/routes/satellite.py`'s
//! `TLE_SATELLITES`, but unseeded entries are represented explicitly rather
//! than as syntactically-plausible zero-valued elements (see DESIGN.md,
//! Open Question 2): predicting against an `Unseeded` entry is a typed,
//! reportable condition instead of a silently meaningless pass list.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum TleEntry {
    Unseeded,
    Seeded {
        display_name: String,
        line1: String,
        line2: String,
    },
}

#[derive(Error, Debug)]
pub enum TleError {
    #[error("malformed TLE line pair")]
    Malformed,
}

/// Internal-name -> NORAD id, for the bundled satellite set.
pub fn norad_for(internal_name: &str) -> Option<u32> {
    match internal_name {
        "ISS" => Some(25544),
        "NOAA-15" => Some(25338),
        "NOAA-18" => Some(28654),
        "NOAA-19" => Some(33591),
        "NOAA-20" => Some(43013),
        "METEOR-M2" => Some(40069),
        "METEOR-M2-3" => Some(57166),
        _ => None,
    }
}

pub fn name_for_norad(norad: u32) -> Option<&'static str> {
    match norad {
        25544 => Some("ISS"),
        25338 => Some("NOAA-15"),
        28654 => Some("NOAA-18"),
        33591 => Some("NOAA-19"),
        43013 => Some("NOAA-20"),
        40069 => Some("METEOR-M2"),
        57166 => Some("METEOR-M2-3"),
        _ => None,
    }
}

/// Maps a display name as returned by CelesTrak (`"ISS (ZARYA)"`) back to
/// our internal key (`"ISS"`).
pub fn internal_name_for_display(display_name: &str) -> &str {
    match display_name {
        "ISS (ZARYA)" => "ISS",
        "NOAA 15" => "NOAA-15",
        "NOAA 18" => "NOAA-18",
        "NOAA 19" => "NOAA-19",
        "METEOR-M 2" => "METEOR-M2",
        "METEOR-M2 3" => "METEOR-M2-3",
        other => other,
    }
}

pub fn display_color(internal_name: &str) -> &'static str {
    match internal_name {
        "ISS" => "#00ffff",
        "NOAA-15" => "#00ff00",
        "NOAA-18" => "#ff6600",
        "NOAA-19" => "#ff3366",
        "NOAA-20" => "#00ffaa",
        "METEOR-M2" => "#9370DB",
        "METEOR-M2-3" => "#ff00ff",
        _ => "#00ff00",
    }
}

#[derive(Debug, Clone)]
pub struct TleCache {
    entries: HashMap<String, TleEntry>,
}

impl Default for TleCache {
    fn default() -> Self {
        let mut entries = HashMap::new();
        for name in ["ISS", "NOAA-15", "NOAA-18", "NOAA-19", "NOAA-20", "METEOR-M2", "METEOR-M2-3"] {
            entries.insert(name.to_string(), TleEntry::Unseeded);
        }
        Self { entries }
    }
}

impl TleCache {
    pub fn get(&self, internal_name: &str) -> Option<&TleEntry> {
        self.entries.get(internal_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Validates the two TLE lines by attempting to parse them with `sgp4`
    /// before replacing the cached entry.
    pub fn update(
        &mut self,
        internal_name: &str,
        display_name: &str,
        line1: &str,
        line2: &str,
    ) -> Result<(), TleError> {
        sgp4::Elements::from_tle(Some(display_name.to_string()), line1.as_bytes(), line2.as_bytes())
            .map_err(|_| TleError::Malformed)?;
        self.entries.insert(
            internal_name.to_string(),
            TleEntry::Seeded {
                display_name: display_name.to_string(),
                line1: line1.to_string(),
                line2: line2.to_string(),
            },
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TleTriplet {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

/// Parses CelesTrak's plaintext `FORMAT=tle` response into name/line1/line2
/// triplets. Malformed groups (line1/line2 not starting with `"1 "`/`"2 "`)
/// are skipped rather than aborting the whole parse.
pub fn parse_tle_triplets(text: &str) -> Vec<TleTriplet> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut triplets = Vec::new();
    let mut i = 0;
    while i + 2 < lines.len() {
        let name = lines[i];
        let line1 = lines[i + 1];
        let line2 = lines[i + 2];
        if line1.starts_with("1 ") && line2.starts_with("2 ") {
            triplets.push(TleTriplet {
                name: name.to_string(),
                line1: line1.to_string(),
                line2: line2.to_string(),
            });
            i += 3;
        } else {
            i += 1;
        }
    }
    triplets
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISS_LINE1: &str = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9002";
    const ISS_LINE2: &str = "2 25544  51.6400 208.9163 0006317  69.9862  25.2280 15.49560892372430";

    #[test]
    fn default_cache_is_unseeded() {
        let cache = TleCache::default();
        assert!(matches!(cache.get("ISS"), Some(TleEntry::Unseeded)));
    }

    #[test]
    fn update_requires_valid_elements() {
        let mut cache = TleCache::default();
        assert!(cache.update("ISS", "ISS (ZARYA)", ISS_LINE1, ISS_LINE2).is_ok());
        assert!(matches!(cache.get("ISS"), Some(TleEntry::Seeded { .. })));
        assert!(cache.update("ISS", "ISS (ZARYA)", "garbage", "garbage").is_err());
    }

    #[test]
    fn parses_triplets_and_skips_malformed_groups() {
        let text = format!("ISS (ZARYA)\n{ISS_LINE1}\n{ISS_LINE2}\nJUNK\nnot a tle\n");
        let triplets = parse_tle_triplets(&text);
        assert_eq!(triplets.len(), 1);
        assert_eq!(triplets[0].name, "ISS (ZARYA)");
    }

    #[test]
    fn display_name_mapping() {
        assert_eq!(internal_name_for_display("ISS (ZARYA)"), "ISS");
        assert_eq!(internal_name_for_display("Some Other Sat"), "Some Other Sat");
    }
}
