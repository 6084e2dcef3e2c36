//! Iridium burst demo generator, spec.md §4.6 / DESIGN.md Open Question 1.
//!
//! Real Iridium demodulation is out of scope (the original is explicitly a
//! placeholder — see `original_source/routes/iridium.py`'s `monitor_iridium`).
//! This module only fixes the event shape and the ~1%-per-cycle sampling
//! rule; it takes the random sample as a parameter so callers can supply
//! their own RNG and the function stays deterministic for tests.

use crate::models::IridiumBurst;

/// Probability per read cycle that a cycle produces a burst (spec.md §4.6).
pub const BURST_PROBABILITY: f64 = 0.01;

/// Given a uniform `sample` in `[0, 1)`, decides whether this read cycle
/// should emit a burst and, if so, builds one tagged `demo: true`.
pub fn maybe_demo_burst(sample: f64, frequency_mhz: &str, timestamp: &str, data_hex: &str) -> Option<IridiumBurst> {
    if sample >= BURST_PROBABILITY {
        return None;
    }
    Some(IridiumBurst {
        demo: true,
        time: timestamp.to_string(),
        frequency: frequency_mhz.to_string(),
        data: data_hex.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_below_threshold_emits_burst() {
        let burst = maybe_demo_burst(0.0, "1626.0", "12:00:00", "deadbeef").unwrap();
        assert!(burst.demo);
        assert_eq!(burst.frequency, "1626.0");
    }

    #[test]
    fn sample_at_or_above_threshold_is_none() {
        assert!(maybe_demo_burst(BURST_PROBABILITY, "1626.0", "12:00:00", "deadbeef").is_none());
        assert!(maybe_demo_burst(0.5, "1626.0", "12:00:00", "deadbeef").is_none());
    }
}
