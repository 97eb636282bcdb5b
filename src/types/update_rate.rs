//! Subscriber update rate control

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a subscriber wants samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every sample the station produces
    Native,

    /// At most this many samples per second, latest wins.
    /// Falls back to Native when the source is already slower.
    Max(u32),
}

impl UpdateRate {
    /// Resolve the rate against the source frequency.
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval, if the subscriber needs one.
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_than_source_is_native() {
        assert_eq!(UpdateRate::Max(20).normalize(10.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(10).normalize(10.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(0).normalize(10.0), UpdateRate::Native);
    }

    #[test]
    fn slower_than_source_throttles() {
        assert_eq!(UpdateRate::Max(2).normalize(10.0), UpdateRate::Max(2));
        assert_eq!(
            UpdateRate::Max(4).throttle_interval(10.0),
            Some(Duration::from_millis(250))
        );
        assert_eq!(UpdateRate::Native.throttle_interval(10.0), None);
    }
}
