//! Square-pulse current clamp.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CableError, Result};
use crate::morphology::Location;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClampParams {
    /// Onset (ms)
    pub delay: f64,
    /// Pulse length (ms)
    pub duration: f64,
    /// Injected current while on (nA)
    pub amplitude: f64,
}

impl Default for ClampParams {
    fn default() -> Self {
        Self {
            delay: 0.0,
            duration: 0.0,
            amplitude: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CurrentClamp {
    target: Location,
    params: ClampParams,
    /// Current applied during the last step
    i: f64,
}

impl CurrentClamp {
    pub fn new(target: Location, params: ClampParams) -> Result<Self> {
        if !(params.delay >= 0.0 && params.delay.is_finite()) {
            return Err(CableError::InvalidParameter("clamp delay must be >= 0"));
        }
        if !(params.duration >= 0.0) {
            return Err(CableError::InvalidParameter("clamp duration must be >= 0"));
        }
        if !params.amplitude.is_finite() {
            return Err(CableError::InvalidParameter("clamp amplitude must be finite"));
        }
        Ok(Self {
            target,
            params,
            i: 0.0,
        })
    }

    pub fn target(&self) -> Location {
        self.target
    }

    pub fn params(&self) -> &ClampParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ClampParams {
        &mut self.params
    }

    pub fn amplitude_at(&self, t: f64) -> f64 {
        let p = &self.params;
        if t >= p.delay && t < p.delay + p.duration {
            p.amplitude
        } else {
            0.0
        }
    }

    /// Latch the current for the step starting at `t`.
    pub fn update(&mut self, t: f64) -> f64 {
        self.i = self.amplitude_at(t);
        self.i
    }

    pub fn current(&self) -> f64 {
        self.i
    }

    pub fn reset(&mut self) {
        self.i = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERE: Location = Location { section: 0, index: 0 };

    #[test]
    fn pulse_window_is_half_open() {
        let clamp = CurrentClamp::new(
            HERE,
            ClampParams { delay: 10.0, duration: 90.0, amplitude: 0.25 },
        )
        .unwrap();
        assert_eq!(clamp.amplitude_at(9.999), 0.0);
        assert_eq!(clamp.amplitude_at(10.0), 0.25);
        assert_eq!(clamp.amplitude_at(99.99), 0.25);
        assert_eq!(clamp.amplitude_at(100.0), 0.0);
    }

    #[test]
    fn rejects_negative_timing() {
        let bad = ClampParams { delay: -1.0, duration: 1.0, amplitude: 1.0 };
        assert!(CurrentClamp::new(HERE, bad).is_err());
        let bad = ClampParams { delay: 1.0, duration: -1.0, amplitude: 1.0 };
        assert!(CurrentClamp::new(HERE, bad).is_err());
        // an infinitely long pulse is fine
        let ok = ClampParams { delay: 0.0, duration: f64::INFINITY, amplitude: 1.0 };
        assert!(CurrentClamp::new(HERE, ok).is_ok());
    }
}
