//! Sampling decision.
//!
//! A trace is sampled when the inbound header says so explicitly
//! (`Sampled=1` / `Sampled=0`). Any other raw value, including one that merely
//! looks like a boolean, falls back to a static probability. The comparison
//! is exact; the header decoder strips surrounding whitespace before it gets
//! here.

use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probability in `[0, 1]` that a trace without an explicit decision is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SamplingRate(f64);

impl SamplingRate {
    pub const ALWAYS: Self = Self(1.0);
    pub const NEVER: Self = Self(0.0);

    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::InvalidSamplingRate(rate));
        }
        Ok(Self(rate))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Draw one independent decision.
    pub fn draw(self) -> bool {
        if self.0 <= 0.0 {
            false
        } else if self.0 >= 1.0 {
            true
        } else {
            rand::thread_rng().gen_bool(self.0)
        }
    }
}

impl Default for SamplingRate {
    fn default() -> Self {
        Self::ALWAYS
    }
}

impl TryFrom<f64> for SamplingRate {
    type Error = ConfigError;

    fn try_from(rate: f64) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<SamplingRate> for f64 {
    fn from(rate: SamplingRate) -> Self {
        rate.0
    }
}

/// Interpret a raw `Sampled` header value. Only `"1"` and `"0"` count.
pub fn explicit_decision(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("1") => Some(true),
        Some("0") => Some(false),
        _ => None,
    }
}

/// Resolve the sampled flag for a new trace.
pub fn decide(raw: Option<&str>, rate: SamplingRate) -> bool {
    explicit_decision(raw).unwrap_or_else(|| rate.draw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_override_rate() {
        for _ in 0..100 {
            assert!(decide(Some("1"), SamplingRate::NEVER));
            assert!(!decide(Some("0"), SamplingRate::ALWAYS));
        }
    }

    #[test]
    fn test_non_binary_values_fall_back_to_rate() {
        for raw in [None, Some(""), Some("abc"), Some("true"), Some("false"), Some(" 1")] {
            for _ in 0..100 {
                assert!(!decide(raw, SamplingRate::NEVER), "raw={raw:?}");
                assert!(decide(raw, SamplingRate::ALWAYS), "raw={raw:?}");
            }
        }
    }

    #[test]
    fn test_rate_bounds() {
        assert!(SamplingRate::new(0.0).is_ok());
        assert!(SamplingRate::new(0.25).is_ok());
        assert!(SamplingRate::new(1.0).is_ok());
        assert!(SamplingRate::new(-0.1).is_err());
        assert!(SamplingRate::new(1.5).is_err());
        assert!(SamplingRate::new(f64::NAN).is_err());
    }

    #[test]
    fn test_fractional_rate_draws_both_outcomes() {
        let rate = SamplingRate::new(0.5).unwrap();
        let hits = (0..2000).filter(|_| rate.draw()).count();
        assert!(hits > 0 && hits < 2000, "hits={hits}");
    }
}
