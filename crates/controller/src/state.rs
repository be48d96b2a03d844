//! The single mutable aggregate driven by the control loop.

use serde::Serialize;
use std::fmt;

/// Upper bound of every percentage reading and threshold.
pub const PERCENT_MAX: u8 = 100;

pub const DEFAULT_SOIL_MOISTURE: u8 = 60;
pub const DEFAULT_HUMIDITY: u8 = 55;
pub const DEFAULT_SOIL_THRESHOLD: u8 = 40;
pub const DEFAULT_HUMIDITY_THRESHOLD: u8 = 85;

/// Clamp an arbitrary integer (slider input, persisted value) into 0..=100.
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, PERCENT_MAX as i64) as u8
}

/// Round and clamp a floating-point reading into 0..=100.
pub(crate) fn round_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, PERCENT_MAX as f64) as u8
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Who has authority over the pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Automatic,
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Automatic => write!(f, "Automatic"),
            Self::Manual => write!(f, "Manual"),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Operator-configured trigger points, the only persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    /// Below this soil moisture the zone counts as dry.
    pub soil: u8,
    /// Above this humidity automatic watering is suppressed.
    pub humidity: u8,
}

impl Thresholds {
    pub fn new(soil: i64, humidity: i64) -> Self {
        Self {
            soil: clamp_percent(soil),
            humidity: clamp_percent(humidity),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            soil: DEFAULT_SOIL_THRESHOLD,
            humidity: DEFAULT_HUMIDITY_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// SystemState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemState {
    pub soil_moisture: u8,
    pub humidity: u8,
    pub pump_on: bool,
    pub manual_mode: bool,
    pub soil_threshold: u8,
    pub humidity_threshold: u8,
}

impl SystemState {
    /// Startup state: default readings, pump off, automatic mode.
    pub fn new(thresholds: Thresholds) -> Self {
        Self::with_readings(DEFAULT_SOIL_MOISTURE, DEFAULT_HUMIDITY, thresholds)
    }

    pub fn with_readings(soil_moisture: u8, humidity: u8, thresholds: Thresholds) -> Self {
        Self {
            soil_moisture: soil_moisture.min(PERCENT_MAX),
            humidity: humidity.min(PERCENT_MAX),
            pump_on: false,
            manual_mode: false,
            soil_threshold: thresholds.soil.min(PERCENT_MAX),
            humidity_threshold: thresholds.humidity.min(PERCENT_MAX),
        }
    }

    pub fn mode(&self) -> Mode {
        if self.manual_mode {
            Mode::Manual
        } else {
            Mode::Automatic
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            soil: self.soil_threshold,
            humidity: self.humidity_threshold,
        }
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
