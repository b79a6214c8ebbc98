use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::BloomError;
use crate::pyramid::MAX_ITERATIONS;

/// Smallest accepted brightness threshold.
pub const MIN_THRESHOLD: f32 = 0.0;
/// Largest accepted brightness threshold.
pub const MAX_THRESHOLD: f32 = 10.0;

/// User-facing bloom settings.
///
/// Values outside the documented ranges are clamped by
/// [`validated`](Self::validated) rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Bloom", inline)]
#[serde(default)]
pub struct BloomOptions {
    /// Pyramid depth cap.
    #[schemars(title = "Iterations", range(min = 1, max = 16), extend("step" = 1))]
    pub iterations: u32,
    /// Brightness cutoff passed to the prefilter pass.
    #[schemars(title = "Threshold", range(min = 0.0, max = 10.0), extend("step" = 0.05))]
    pub threshold: f32,
}

impl Default for BloomOptions {
    fn default() -> Self {
        Self {
            iterations: 1,
            threshold: 1.0,
        }
    }
}

impl BloomOptions {
    /// Clamp every field into its accepted range.
    ///
    /// # Errors
    ///
    /// [`BloomError::InvalidConfig`] if the threshold is not a finite number.
    pub fn validated(&self) -> Result<BloomSettings, BloomError> {
        if !self.threshold.is_finite() {
            return Err(BloomError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        let settings = BloomSettings {
            iterations: self.iterations.clamp(1, MAX_ITERATIONS),
            threshold: self.threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD),
        };
        if settings.iterations != self.iterations || settings.threshold != self.threshold {
            log::debug!(
                "bloom options clamped: iterations {} -> {}, threshold {} -> {}",
                self.iterations,
                settings.iterations,
                self.threshold,
                settings.threshold
            );
        }
        Ok(settings)
    }
}

/// Bloom settings after clamping. Immutable for one `process` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    /// Pyramid depth cap, in `1..=16`.
    pub iterations: u32,
    /// Brightness cutoff, in `0.0..=10.0`.
    pub threshold: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = BloomOptions::default();
        assert_eq!(opts.iterations, 1);
        assert_eq!(opts.threshold, 1.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let opts = BloomOptions {
            iterations: 20,
            threshold: 12.5,
        };
        let settings = opts.validated().unwrap();
        assert_eq!(settings.iterations, 16);
        assert_eq!(settings.threshold, 10.0);

        let low = BloomOptions {
            iterations: 0,
            threshold: -1.0,
        };
        let settings = low.validated().unwrap();
        assert_eq!(settings.iterations, 1);
        assert_eq!(settings.threshold, 0.0);
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let opts = BloomOptions {
            iterations: 4,
            threshold: f32::NAN,
        };
        assert!(matches!(
            opts.validated(),
            Err(BloomError::InvalidConfig(_))
        ));
    }
}
