//! Closed-loop irrigation control core.
//!
//! Simulates a soil moisture and a humidity sensor, decides whether the
//! pump should run (automatically from two thresholds, or by hand), keeps a
//! short rolling window of readings for charting and persists the two
//! thresholds.  [`runner::ControlLoop`] drives it all from a single task.

pub mod control;
pub mod policy;
pub mod runner;
pub mod series;
pub mod settings;
pub mod sim;
pub mod state;

pub use control::{Controller, Intent};
pub use runner::{ControlHandle, ControlLoop, LoopConfig, Snapshot, TickObserver};
pub use series::{Sample, SeriesWindow, WINDOW_CAPACITY};
pub use settings::{JsonFileStore, MemoryStore, SettingsStore, StoredSettings};
pub use sim::{RandomSource, Readings, SensorSimulator, SimParams};
pub use state::{clamp_percent, Mode, SystemState, Thresholds};
