//! TOML config file loading, environment overrides and validation.

use anyhow::{bail, Context, Result};
use irrigation_controller::{LoopConfig, SimParams};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tick_interval_ms: i64,
    pub settings_path: String,
    pub web_port: u16,
    pub simulation: SimulationEntry,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationEntry {
    pub initial_soil_moisture: i64,
    pub initial_humidity: i64,
    pub pump_recovery_rate: f64,
    pub max_drain_per_tick: f64,
    pub humidity_swing: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            settings_path: "irrigation-settings.json".to_string(),
            web_port: 8080,
            simulation: SimulationEntry::default(),
        }
    }
}

impl Default for SimulationEntry {
    fn default() -> Self {
        let params = SimParams::default();
        Self {
            initial_soil_moisture: 60,
            initial_humidity: 55,
            pump_recovery_rate: params.recovery_rate,
            max_drain_per_tick: params.max_drain,
            humidity_swing: params.humidity_swing,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate every field. Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.tick_interval_ms <= 0 {
            errors.push(format!(
                "tick_interval_ms must be positive, got {}",
                self.tick_interval_ms
            ));
        }
        if self.settings_path.trim().is_empty() {
            errors.push("settings_path is empty".to_string());
        }

        self.simulation.validate(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    /// Apply `TICK_INTERVAL_MS`, `SETTINGS_PATH` and `WEB_PORT` overrides.
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("TICK_INTERVAL_MS") {
            match raw.trim().parse() {
                Ok(ms) => self.tick_interval_ms = ms,
                Err(e) => tracing::warn!(value = %raw, "ignoring TICK_INTERVAL_MS: {e}"),
            }
        }
        if let Some(path) = lookup("SETTINGS_PATH") {
            self.settings_path = path;
        }
        if let Some(raw) = lookup("WEB_PORT") {
            match raw.trim().parse() {
                Ok(port) => self.web_port = port,
                Err(e) => tracing::warn!(value = %raw, "ignoring WEB_PORT: {e}"),
            }
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1) as u64)
    }

    /// Control loop settings.  Assumes `validate` passed.
    pub fn loop_config(&self) -> LoopConfig {
        let sim = &self.simulation;
        LoopConfig {
            tick_interval: self.tick_interval(),
            initial_soil_moisture: irrigation_controller::clamp_percent(sim.initial_soil_moisture),
            initial_humidity: irrigation_controller::clamp_percent(sim.initial_humidity),
            sim: SimParams {
                recovery_rate: sim.pump_recovery_rate,
                max_drain: sim.max_drain_per_tick,
                humidity_swing: sim.humidity_swing,
            },
        }
    }
}

impl SimulationEntry {
    fn validate(&self, errors: &mut Vec<String>) {
        // ── Initial readings ────────────────────────────────
        for (name, value) in [
            ("initial_soil_moisture", self.initial_soil_moisture),
            ("initial_humidity", self.initial_humidity),
        ] {
            if !(0..=100).contains(&value) {
                errors.push(format!("simulation: {name} {value} out of range [0, 100]"));
            }
        }

        // ── Rates ───────────────────────────────────────────
        if !(self.pump_recovery_rate > 0.0 && self.pump_recovery_rate <= 100.0) {
            errors.push(format!(
                "simulation: pump_recovery_rate {} out of range (0, 100]",
                self.pump_recovery_rate
            ));
        }
        for (name, value) in [
            ("max_drain_per_tick", self.max_drain_per_tick),
            ("humidity_swing", self.humidity_swing),
        ] {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("simulation: {name} {value} out of range [0, 100]"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read and parse a TOML config file.  A missing file yields the defaults.
pub fn load(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        tracing::info!(path, "no config file, using defaults");
        return Ok(Config::default());
    }
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    parse(&contents).with_context(|| format!("failed to parse config: {path}"))
}

pub fn parse(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}

/// File, then environment overrides, then validation.
pub fn resolve(path: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config = load(path)?;
    config.apply_env(lookup);
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
