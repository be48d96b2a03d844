//! Automatic pump decision.
//!
//! No hysteresis: the pump runs exactly while the soil is strictly below its
//! threshold and the humidity is not strictly above its own.

use serde::Serialize;

use crate::state::SystemState;

/// Breakdown of one automatic decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub needs_water: bool,
    pub prevent_watering: bool,
}

impl Decision {
    pub fn evaluate(state: &SystemState) -> Self {
        Self {
            needs_water: state.soil_moisture < state.soil_threshold,
            prevent_watering: state.humidity > state.humidity_threshold,
        }
    }

    pub fn pump_on(&self) -> bool {
        self.needs_water && !self.prevent_watering
    }
}

/// Pump command for automatic mode.  Callers must not invoke this while
/// `state.manual_mode` is set.
pub fn decide(state: &SystemState) -> bool {
    Decision::evaluate(state).pump_on()
}

// ===========================================================================
// Tests
// ===========================================================================
