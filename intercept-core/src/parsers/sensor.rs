//! rtl_433 JSON line decoding, spec.md §4.6/C6.

use crate::models::SensorReading;

/// Parses one line of `rtl_433 -F json` output. `Err` lines are the
/// caller's cue to fall back to a bare `raw` event instead of a `sensor` one.
pub fn parse_sensor_line(line: &str) -> Result<SensorReading, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line.trim())?;
    let mut extra = match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let model = extra.remove("model").and_then(|v| v.as_str().map(str::to_string));
    let kind = extra
        .remove("type")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "sensor".to_string());

    Ok(SensorReading { kind, model, extra })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_json_line() {
        let line = r#"{"model":"Acurite-Tower","id":123,"channel":"A","temperature_C":21.5}"#;
        let reading = parse_sensor_line(line).unwrap();
        assert_eq!(reading.model.as_deref(), Some("Acurite-Tower"));
        assert_eq!(reading.kind, "sensor");
        assert_eq!(reading.extra.get("id").unwrap(), &serde_json::json!(123));
        let (model, sub) = reading.identity();
        assert_eq!(model, "Acurite-Tower");
        assert_eq!(sub, "123");
    }

    #[test]
    fn invalid_json_is_err() {
        assert!(parse_sensor_line("not json at all").is_err());
    }

    #[test]
    fn missing_model_falls_back_in_identity() {
        let reading = parse_sensor_line(r#"{"channel":2}"#).unwrap();
        let (model, sub) = reading.identity();
        assert_eq!(model, "unknown");
        assert_eq!(sub, "2");
    }
}
