//! Sensor simulator for the soil moisture and humidity channels.
//!
//! Models a deliberately simple closed loop:
//! - Fast soil wetting while the pump runs (fixed recovery rate)
//! - Slow random drying while it is off (evaporation / drainage)
//! - Symmetric random humidity drift, independent of the pump
//!
//! Arithmetic happens in `f64`; values are rounded only when stored back
//! into [`SystemState`].  Randomness comes from an injected [`RandomSource`]
//! so steps can be replayed deterministically.

use crate::state::{round_percent, SystemState, PERCENT_MAX};

// ---------------------------------------------------------------------------
// Random source
// ---------------------------------------------------------------------------

/// Uniform random draws in `[0, 1)`.
pub trait RandomSource {
    fn unit(&mut self) -> f64;
}

impl RandomSource for fastrand::Rng {
    fn unit(&mut self) -> f64 {
        self.f64()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn unit(&mut self) -> f64 {
        (**self).unit()
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Per-tick rates, in percentage points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Soil moisture gained per tick while the pump is on.
    pub recovery_rate: f64,
    /// Upper bound (exclusive) of the soil moisture lost per tick while the
    /// pump is off.
    pub max_drain: f64,
    /// Humidity moves by a draw in `[-swing, swing)` each tick.
    pub humidity_swing: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            recovery_rate: 15.0,
            max_drain: 2.0,
            humidity_swing: 3.0,
        }
    }
}

/// Readings produced by one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readings {
    pub soil_moisture: u8,
    pub humidity: u8,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct SensorSimulator<R> {
    params: SimParams,
    rng: R,
}

impl<R: RandomSource> SensorSimulator<R> {
    pub fn new(params: SimParams, rng: R) -> Self {
        Self { params, rng }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Compute the next readings from the current state.
    ///
    /// Draw order is fixed: one draw for soil (only when the pump is off),
    /// then one for humidity.
    pub fn advance(&mut self, state: &SystemState) -> Readings {
        let max = PERCENT_MAX as f64;

        let soil = state.soil_moisture as f64;
        let soil = if state.pump_on {
            (soil + self.params.recovery_rate).min(max)
        } else {
            (soil - self.draw() * self.params.max_drain).max(0.0)
        };

        let swing = self.params.humidity_swing;
        let delta = self.draw() * 2.0 * swing - swing;
        let humidity = (state.humidity as f64 + delta).clamp(0.0, max);

        Readings {
            soil_moisture: round_percent(soil),
            humidity: round_percent(humidity),
        }
    }

    /// One draw, forced into `[0, 1)` whatever the source returns.
    fn draw(&mut self) -> f64 {
        let u = self.rng.unit();
        if u.is_finite() {
            u.clamp(0.0, 1.0 - f64::EPSILON)
        } else {
            0.0
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
