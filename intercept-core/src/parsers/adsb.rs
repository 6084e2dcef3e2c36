//! ADS-B decoding: raw Mode-S frame scanning plus dump1090 JSON enrichment,
//! spec.md §4.6.
//!
//! The two paths are deliberately kept as pure functions here so the
//! server can feed them from two different input channels (raw stdout,
//! JSON poll) into one aircraft-store writer, per spec.md §9's note on
//! eliminating the original's interleaved-write races.

use once_cell::sync::Lazy;
use regex::Regex;

static MODE_S_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([0-9A-Fa-f]{6,}?);").expect("static mode-s regex"));

/// Extracts the leading 6-hex ICAO address from a raw Mode-S frame line
/// (`*8D4840D6202CC371C32CE0576098;`), or `None` if the line carries no frame.
pub fn parse_raw_frame_icao(line: &str) -> Option<String> {
    let caps = MODE_S_RE.captures(line.trim())?;
    let hex = &caps[1];
    if hex.len() < 6 {
        return None;
    }
    Some(hex[..6].to_uppercase())
}

/// One aircraft record as served by dump1090's `aircraft.json`-style endpoint.
#[derive(Debug, Clone)]
pub struct JsonAircraftSnapshot {
    pub icao: String,
    pub value: serde_json::Value,
}

/// Parses a dump1090 JSON snapshot (`{"aircraft": [...]}` or a bare array)
/// into per-ICAO enrichment records, each still a raw JSON object for
/// `Aircraft::merge_json` to consume.
pub fn parse_json_snapshot(body: &str) -> Vec<JsonAircraftSnapshot> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };
    let aircraft = value
        .get("aircraft")
        .cloned()
        .or_else(|| value.as_array().map(|a| serde_json::Value::Array(a.clone())));
    let Some(serde_json::Value::Array(items)) = aircraft else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| {
            let icao = item
                .get("hex")
                .or_else(|| item.get("icao"))
                .and_then(|v| v.as_str())
                .map(|s| s.trim_start_matches('~').to_uppercase())?;
            Some(JsonAircraftSnapshot { icao, value: item })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_icao_from_raw_frame() {
        let icao = parse_raw_frame_icao("*8D4840D6202CC371C32CE0576098;").unwrap();
        assert_eq!(icao, "4840D6");
    }

    #[test]
    fn non_frame_line_is_none() {
        assert!(parse_raw_frame_icao("not a frame").is_none());
    }

    #[test]
    fn parses_aircraft_wrapper_object() {
        let body = r#"{"now":1, "aircraft":[{"hex":"4840d6","flight":"UAL123  ","alt_baro":35000,"gs":450,"track":270,"lat":51.1,"lon":-0.2,"squawk":"2345","rssi":-3.2}]}"#;
        let snapshots = parse_json_snapshot(body);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].icao, "4840D6");
        assert_eq!(snapshots[0].value.get("flight").unwrap(), "UAL123  ");
    }

    #[test]
    fn parses_bare_array() {
        let body = r#"[{"icao":"ABC123"}]"#;
        let snapshots = parse_json_snapshot(body);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].icao, "ABC123");
    }

    #[test]
    fn malformed_json_yields_empty() {
        assert!(parse_json_snapshot("not json").is_empty());
    }
}
