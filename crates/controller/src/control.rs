//! Synchronous control core: one owner for the state, the simulator and the
//! chart window.
//!
//! ## Mode state machine
//!
//! ```text
//!              toggle_mode (pump frozen as last decided)
//! Automatic ───────────────────────────────────────────▶ Manual
//!     ▲                                                    │
//!     └──── toggle_mode (decide() re-run immediately) ─────┘
//! ```
//!
//! Ticks run in both modes; only automatic mode re-derives `pump_on`.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::policy::{self, Decision};
use crate::series::{Sample, SeriesWindow};
use crate::sim::{RandomSource, SensorSimulator};
use crate::state::{clamp_percent, Mode, SystemState};

/// Operator requests coming from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "intent", content = "value", rename_all = "snake_case")]
pub enum Intent {
    ToggleMode,
    ToggleManualPump,
    /// Raw slider value; clamped to 0..=100 before use.
    SetSoilThreshold(i64),
    /// Raw slider value; clamped to 0..=100 before use.
    SetHumidityThreshold(i64),
}

impl Intent {
    /// Threshold intents must be persisted after they are applied.
    pub fn touches_thresholds(&self) -> bool {
        matches!(
            self,
            Self::SetSoilThreshold(_) | Self::SetHumidityThreshold(_)
        )
    }
}

pub struct Controller<R> {
    state: SystemState,
    sim: SensorSimulator<R>,
    series: SeriesWindow,
    ticks: u64,
}

impl<R: RandomSource> Controller<R> {
    pub fn new(state: SystemState, sim: SensorSimulator<R>) -> Self {
        Self {
            state,
            sim,
            series: SeriesWindow::new(),
            ticks: 0,
        }
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn series(&self) -> &SeriesWindow {
        &self.series
    }

    /// Ticks completed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One control step: simulate, decide (automatic mode only), record.
    pub fn tick(&mut self, now: OffsetDateTime) -> Sample {
        let readings = self.sim.advance(&self.state);
        self.state.soil_moisture = readings.soil_moisture;
        self.state.humidity = readings.humidity;

        if !self.state.manual_mode {
            let decision = Decision::evaluate(&self.state);
            let pump_on = decision.pump_on();
            if pump_on != self.state.pump_on {
                info!(
                    pump_on,
                    soil = self.state.soil_moisture,
                    humidity = self.state.humidity,
                    needs_water = decision.needs_water,
                    prevent_watering = decision.prevent_watering,
                    "automatic pump change"
                );
            }
            self.state.pump_on = pump_on;
        }

        let sample = Sample::capture(now, &self.state);
        self.series.push(sample.clone());
        self.ticks += 1;

        debug!(
            tick = self.ticks,
            soil = self.state.soil_moisture,
            humidity = self.state.humidity,
            pump_on = self.state.pump_on,
            mode = %self.state.mode(),
            "tick"
        );

        sample
    }

    pub fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::ToggleMode => self.toggle_mode(),
            Intent::ToggleManualPump => self.toggle_manual_pump(),
            Intent::SetSoilThreshold(v) => self.set_soil_threshold(v),
            Intent::SetHumidityThreshold(v) => self.set_humidity_threshold(v),
        }
    }

    /// Switch authority over the pump.  Leaving manual mode re-runs the
    /// automatic decision at once; entering it leaves the pump as it was.
    pub fn toggle_mode(&mut self) {
        self.state.manual_mode = !self.state.manual_mode;
        if !self.state.manual_mode {
            self.state.pump_on = policy::decide(&self.state);
        }
        info!(
            mode = %self.state.mode(),
            pump_on = self.state.pump_on,
            "mode switched"
        );
    }

    /// Flip the pump; ignored outside manual mode.
    pub fn toggle_manual_pump(&mut self) {
        if self.state.mode() != Mode::Manual {
            debug!("manual pump toggle ignored in automatic mode");
            return;
        }
        self.state.pump_on = !self.state.pump_on;
        info!(pump_on = self.state.pump_on, "manual pump toggle");
    }

    pub fn set_soil_threshold(&mut self, value: i64) {
        self.state.soil_threshold = clamp_percent(value);
        info!(soil_threshold = self.state.soil_threshold, "soil threshold set");
    }

    pub fn set_humidity_threshold(&mut self, value: i64) {
        self.state.humidity_threshold = clamp_percent(value);
        info!(
            humidity_threshold = self.state.humidity_threshold,
            "humidity threshold set"
        );
    }
}

// ===========================================================================
// Tests
// ===========================================================================
