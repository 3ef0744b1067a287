//! Fixed-step simulation clock.
//!
//! Time is `origin + steps * dt` rather than a running sum, so long runs do
//! not drift off the step grid.

use cable_core::{CableError, Result};

/// Default integration step (ms).
pub const DEFAULT_DT: f64 = 0.025;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimClock {
    origin: f64,
    steps: u64,
    dt: f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            origin: 0.0,
            steps: 0,
            dt: DEFAULT_DT,
        }
    }
}

impl SimClock {
    pub fn new(dt: f64) -> Result<Self> {
        check_step(dt)?;
        Ok(Self {
            dt,
            ..Self::default()
        })
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.origin + self.steps as f64 * self.dt
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Steps taken since the last rebase.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Change the step size. The current time becomes the new origin.
    pub fn set_step(&mut self, dt: f64) -> Result<()> {
        check_step(dt)?;
        self.origin = self.time();
        self.steps = 0;
        self.dt = dt;
        Ok(())
    }

    #[inline]
    pub fn tick(&mut self) {
        self.steps += 1;
    }

    pub fn reset(&mut self) {
        self.origin = 0.0;
        self.steps = 0;
    }

    /// Slack used when comparing times that should sit on the step grid.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.dt * 1e-9
    }
}

fn check_step(dt: f64) -> Result<()> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(CableError::InvalidParameter("step must be positive and finite"))
    }
}
