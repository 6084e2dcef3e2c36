//! Pure input validation. No I/O, no panics on bad input — every function
//! returns a [`ValidationError`] describing which field was rejected.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}")]
pub struct ValidationError {
    pub field: &'static str,
}

fn reject(field: &'static str) -> ValidationError {
    ValidationError { field }
}

/// `^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$`
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn validate_mac(mac: &str) -> Result<String, ValidationError> {
    if is_valid_mac(mac) {
        Ok(mac.to_string())
    } else {
        Err(reject("mac"))
    }
}

/// WiFi channel: integer in `[1, 200]`.
pub fn is_valid_channel(channel: &str) -> bool {
    match channel.parse::<i64>() {
        Ok(c) => (1..=200).contains(&c),
        Err(_) => false,
    }
}

pub fn validate_wifi_channel(channel: &str) -> Result<u32, ValidationError> {
    let c: i64 = channel.parse().map_err(|_| reject("channel"))?;
    if (1..=200).contains(&c) {
        Ok(c as u32)
    } else {
        Err(reject("channel"))
    }
}

/// Frequency in MHz, within a caller-supplied inclusive range. Rejects NaN/Inf.
pub fn validate_frequency(value: &str, min_mhz: f64, max_mhz: f64) -> Result<f64, ValidationError> {
    let f: f64 = value.parse().map_err(|_| reject("frequency"))?;
    if !f.is_finite() || f < min_mhz || f > max_mhz {
        return Err(reject("frequency"));
    }
    Ok(f)
}

pub fn validate_latitude(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (-90.0..=90.0).contains(&value) {
        Ok(value)
    } else {
        Err(reject("latitude"))
    }
}

pub fn validate_longitude(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (-180.0..=180.0).contains(&value) {
        Ok(value)
    } else {
        Err(reject("longitude"))
    }
}

/// Gain: integer/float in `[0, 60]`, or the literal `"auto"`.
pub fn validate_gain(value: &str) -> Result<String, ValidationError> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok("auto".to_string());
    }
    let g: f64 = value.parse().map_err(|_| reject("gain"))?;
    if (0.0..=60.0).contains(&g) {
        Ok(value.to_string())
    } else {
        Err(reject("gain"))
    }
}

pub fn validate_hours(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 && value <= 24.0 * 14.0 {
        Ok(value)
    } else {
        Err(reject("hours"))
    }
}

pub fn validate_min_elevation(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (0.0..=90.0).contains(&value) {
        Ok(value)
    } else {
        Err(reject("minEl"))
    }
}

pub fn validate_device_index(value: &str) -> Result<u32, ValidationError> {
    value.parse::<u32>().map_err(|_| reject("device"))
}

/// `count` for deauth bursts, clamped rather than rejected per spec.
pub fn clamp_deauth_count(value: i64) -> u32 {
    value.clamp(1, 100) as u32
}

/// Capture file path: must start with the feature-specific `/tmp/intercept_<feature>_`
/// prefix and must not contain `..`.
pub fn validate_capture_path(path: &str, feature_prefix: &str) -> Result<String, ValidationError> {
    let full_prefix = format!("/tmp/intercept_{feature_prefix}_");
    if path.starts_with(&full_prefix) && !path.contains("..") {
        Ok(path.to_string())
    } else {
        Err(reject("path"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_validation() {
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE"));
        assert!(!is_valid_mac(""));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE:GG"));
        assert!(is_valid_mac("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn channel_validation() {
        assert!(!is_valid_channel("0"));
        assert!(is_valid_channel("1"));
        assert!(is_valid_channel("200"));
        assert!(!is_valid_channel("201"));
        assert!(!is_valid_channel("abc"));
    }

    #[test]
    fn frequency_rejects_non_finite() {
        assert!(validate_frequency("nan", 0.0, 2000.0).is_err());
        assert!(validate_frequency("inf", 0.0, 2000.0).is_err());
        assert!(validate_frequency("153.350", 100.0, 200.0).is_ok());
        assert!(validate_frequency("99.0", 100.0, 200.0).is_err());
    }

    #[test]
    fn lat_lon_bounds() {
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(90.1).is_err());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(180.1).is_err());
    }

    #[test]
    fn gain_auto_or_numeric() {
        assert_eq!(validate_gain("auto").unwrap(), "auto");
        assert_eq!(validate_gain("AUTO").unwrap(), "auto");
        assert!(validate_gain("0").is_ok());
        assert!(validate_gain("60").is_ok());
        assert!(validate_gain("61").is_err());
        assert!(validate_gain("-1").is_err());
    }

    #[test]
    fn deauth_count_clamped() {
        assert_eq!(clamp_deauth_count(0), 1);
        assert_eq!(clamp_deauth_count(5), 5);
        assert_eq!(clamp_deauth_count(1000), 100);
    }

    #[test]
    fn capture_path_prefix_and_traversal() {
        assert!(validate_capture_path("/tmp/intercept_handshake_AABBCC-01.cap", "handshake").is_ok());
        assert!(validate_capture_path("/etc/shadow", "handshake").is_err());
        assert!(validate_capture_path("/tmp/intercept_handshake_../../etc/shadow", "handshake").is_err());
        assert!(validate_capture_path("/tmp/intercept_pmkid_AABBCC.pcapng", "pmkid").is_ok());
    }
}
