use irrigation_controller::{ControlHandle, Mode, Sample, Snapshot, SystemState};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<AppState>;

/// What the web layer holds: a handle to the control loop, nothing mutable.
pub struct AppState {
    pub started_at: Instant,
    pub tick_interval: Duration,
    pub control: ControlHandle,
}

impl AppState {
    pub fn new(control: ControlHandle, tick_interval: Duration) -> SharedState {
        Arc::new(Self {
            started_at: Instant::now(),
            tick_interval,
            control,
        })
    }

    pub fn to_status(&self, snapshot: &Snapshot) -> StatusResponse {
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            tick_interval_ms: self.tick_interval.as_millis() as u64,
            ticks: snapshot.ticks,
            mode: snapshot.state.mode(),
            state: snapshot.state.clone(),
            display: DisplayLabels::from(&snapshot.state),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON responses (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    /// Dashboard polls at this period.
    pub tick_interval_ms: u64,
    pub ticks: u64,
    pub mode: Mode,
    #[serde(flatten)]
    pub state: SystemState,
    pub display: DisplayLabels,
}

/// Ready-to-render text for the dashboard widgets.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DisplayLabels {
    pub pump_status: &'static str,
    /// CSS class for the pump badge.
    pub pump_class: &'static str,
    pub mode_status: String,
    pub mode_button: &'static str,
    pub pump_button: &'static str,
    pub pump_button_disabled: bool,
    pub soil_value: String,
    pub humidity_value: String,
    pub soil_threshold_value: String,
    pub humidity_threshold_value: String,
}

impl From<&SystemState> for DisplayLabels {
    fn from(st: &SystemState) -> Self {
        let manual = st.mode() == Mode::Manual;
        Self {
            pump_status: if st.pump_on { "ON 💧" } else { "OFF ✅" },
            pump_class: if st.pump_on { "on" } else { "off" },
            mode_status: st.mode().to_string(),
            mode_button: if manual {
                "Switch to Automatic"
            } else {
                "Switch to Manual"
            },
            pump_button: if st.pump_on {
                "Turn Pump OFF"
            } else {
                "Turn Pump ON"
            },
            pump_button_disabled: !manual,
            soil_value: format!("{}%", st.soil_moisture),
            humidity_value: format!("{}%", st.humidity),
            soil_threshold_value: format!("{}%", st.soil_threshold),
            humidity_threshold_value: format!("{}%", st.humidity_threshold),
        }
    }
}

/// One chart point.
#[derive(Serialize)]
pub struct SeriesPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub label: String,
    pub soil_moisture: u8,
    pub humidity: u8,
}

impl From<&Sample> for SeriesPoint {
    fn from(s: &Sample) -> Self {
        Self {
            timestamp: s.timestamp,
            label: s.label(),
            soil_moisture: s.soil_moisture,
            humidity: s.humidity,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn automatic_pump_off_labels() {
        let labels = DisplayLabels::from(&SystemState::default());
        assert_eq!(labels.pump_status, "OFF ✅");
        assert_eq!(labels.pump_class, "off");
        assert_eq!(labels.mode_status, "Automatic");
        assert_eq!(labels.mode_button, "Switch to Manual");
        assert_eq!(labels.pump_button, "Turn Pump ON");
        assert!(labels.pump_button_disabled);
        assert_eq!(labels.soil_value, "60%");
        assert_eq!(labels.humidity_value, "55%");
        assert_eq!(labels.soil_threshold_value, "40%");
        assert_eq!(labels.humidity_threshold_value, "85%");
    }

    #[test]
    fn manual_pump_on_labels() {
        let mut st = SystemState::default();
        st.manual_mode = true;
        st.pump_on = true;
        let labels = DisplayLabels::from(&st);
        assert_eq!(labels.pump_status, "ON 💧");
        assert_eq!(labels.pump_class, "on");
        assert_eq!(labels.mode_status, "Manual");
        assert_eq!(labels.mode_button, "Switch to Automatic");
        assert_eq!(labels.pump_button, "Turn Pump OFF");
        assert!(!labels.pump_button_disabled);
    }

    #[test]
    fn series_point_carries_label() {
        let sample = Sample {
            timestamp: datetime!(2025-06-01 14:03:07 UTC),
            soil_moisture: 45,
            humidity: 61,
        };
        let json = serde_json::to_value(SeriesPoint::from(&sample)).unwrap();
        assert_eq!(json["label"], "14:03:07");
        assert_eq!(json["timestamp"], "2025-06-01T14:03:07Z");
        assert_eq!(json["soil_moisture"], 45);
        assert_eq!(json["humidity"], 61);
    }
}
