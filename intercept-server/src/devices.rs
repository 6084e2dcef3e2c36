//! Device index (C1): `GET /devices` probes for RTL-SDR dongles on demand.
//!
//! Grounded on `original_source/utils/process.py`'s `detect_devices`
//! (`rtl_test -t`, 5s timeout, stdout+stderr concatenated before parsing).
//! Parsing itself lives in `intercept_core::devices`; this is just the
//! shell-out and timeout handling.

use std::time::Duration;

use intercept_core::models::RtlSdrDevice;
use tokio::process::Command;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `rtl_test -t` and parses its output. Returns an empty list (never
/// an error) when the tool is missing, times out, or reports no devices —
/// `/devices` degrading to `[]` is the expected "no hardware attached"
/// response, not a failure.
pub async fn detect_devices() -> Vec<RtlSdrDevice> {
    if which::which("rtl_test").is_err() {
        return Vec::new();
    }

    let output = match tokio::time::timeout(PROBE_TIMEOUT, Command::new("rtl_test").arg("-t").output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            log::warn!("rtl_test probe failed to spawn: {e}");
            return Vec::new();
        }
        Err(_) => {
            log::warn!("rtl_test probe timed out after {PROBE_TIMEOUT:?}");
            return Vec::new();
        }
    };

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    intercept_core::devices::parse_rtl_test_output(&combined)
}
