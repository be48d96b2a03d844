//! The control loop task.
//!
//! A single tokio task owns the [`Controller`]: periodic ticks and operator
//! intents are handled by one `select!`, so ticks never overlap and nothing
//! outside the task ever touches the live state.  After every tick or intent
//! a full [`Snapshot`] is published to the watch channel and to the
//! registered [`TickObserver`]s.
//!
//! ```text
//! ControlHandle ──Intent──▶ ┌──────────────┐ ──Snapshot──▶ watch::Receiver (web)
//!                           │ control task │
//!      interval ──tick────▶ └──────────────┘ ──Snapshot──▶ TickObserver (pump relay)
//! ```

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::control::{Controller, Intent};
use crate::series::Sample;
use crate::settings::SettingsStore;
use crate::sim::{RandomSource, SensorSimulator, SimParams};
use crate::state::{SystemState, DEFAULT_HUMIDITY, DEFAULT_SOIL_MOISTURE};

/// Default tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2000);

/// Depth of the intent queue between handles and the control task.
const COMMAND_QUEUE: usize = 32;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Everything a presentation layer needs, captured atomically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: SystemState,
    /// Chart window, oldest first.
    pub series: Vec<Sample>,
    pub ticks: u64,
}

/// Receives every published snapshot on the control task.  Implementations
/// must not block.
pub trait TickObserver: Send {
    fn observe(&mut self, snapshot: &Snapshot);

    /// Called once when the loop exits, after the last snapshot.  Outputs
    /// should return to their safe state here.
    fn on_stop(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub tick_interval: Duration,
    pub initial_soil_moisture: u8,
    pub initial_humidity: u8,
    pub sim: SimParams,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            initial_soil_moisture: DEFAULT_SOIL_MOISTURE,
            initial_humidity: DEFAULT_HUMIDITY,
            sim: SimParams::default(),
        }
    }
}

enum Command {
    Apply(Intent, oneshot::Sender<Snapshot>),
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front door to a running control loop.  The loop stops when
/// [`ControlHandle::shutdown`] is called or every handle is dropped.
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl ControlHandle {
    /// Apply an intent and return the snapshot published right after it.
    pub async fn send(&self, intent: Intent) -> Result<Snapshot> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Apply(intent, reply))
            .await
            .map_err(|_| anyhow!("control loop has stopped"))?;
        response
            .await
            .context("control loop stopped before answering")
    }

    pub async fn toggle_mode(&self) -> Result<Snapshot> {
        self.send(Intent::ToggleMode).await
    }

    pub async fn toggle_manual_pump(&self) -> Result<Snapshot> {
        self.send(Intent::ToggleManualPump).await
    }

    pub async fn set_soil_threshold(&self, value: i64) -> Result<Snapshot> {
        self.send(Intent::SetSoilThreshold(value)).await
    }

    pub async fn set_humidity_threshold(&self, value: i64) -> Result<Snapshot> {
        self.send(Intent::SetHumidityThreshold(value)).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Ask the loop to stop.  Returns once the request is queued, or at once
    /// if the loop is already gone.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

pub struct ControlLoop<R, S> {
    controller: Controller<R>,
    store: S,
    observers: Vec<Box<dyn TickObserver>>,
    tick_interval: Duration,
}

impl<R, S> ControlLoop<R, S>
where
    R: RandomSource + Send + 'static,
    S: SettingsStore + 'static,
{
    /// Build the loop, reading persisted thresholds from `store` once.
    pub fn new(config: &LoopConfig, store: S, rng: R) -> Self {
        let thresholds = store.load().resolve();
        let state = SystemState::with_readings(
            config.initial_soil_moisture,
            config.initial_humidity,
            thresholds,
        );
        info!(
            soil_threshold = thresholds.soil,
            humidity_threshold = thresholds.humidity,
            "thresholds loaded"
        );

        Self {
            controller: Controller::new(state, SensorSimulator::new(config.sim, rng)),
            store,
            observers: Vec::new(),
            tick_interval: config.tick_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn with_observer(mut self, observer: impl TickObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Start the loop on the current runtime.
    pub fn spawn(self) -> (ControlHandle, JoinHandle<()>) {
        let (commands, inbox) = mpsc::channel(COMMAND_QUEUE);
        let (publisher, snapshots) = watch::channel(self.capture());
        let handle = ControlHandle {
            commands,
            snapshots,
        };
        let task = tokio::spawn(self.run(inbox, publisher));
        (handle, task)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Command>, publisher: watch::Sender<Snapshot>) {
        // First tick one full period after start, like a plain repeating timer.
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            observers = self.observers.len(),
            "control loop started"
        );
        self.publish(&publisher);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.controller.tick(OffsetDateTime::now_utc());
                    self.publish(&publisher);
                }
                cmd = inbox.recv() => match cmd {
                    Some(Command::Apply(intent, reply)) => {
                        self.controller.apply(intent);
                        if intent.touches_thresholds() {
                            self.persist();
                        }
                        let snapshot = self.publish(&publisher);
                        // Requester may have given up; the intent still stands.
                        let _ = reply.send(snapshot);
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        for observer in &mut self.observers {
            observer.on_stop();
        }
        info!(ticks = self.controller.ticks(), "control loop stopped");
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            state: self.controller.state().clone(),
            series: self.controller.series().snapshot(),
            ticks: self.controller.ticks(),
        }
    }

    fn publish(&mut self, publisher: &watch::Sender<Snapshot>) -> Snapshot {
        let snapshot = self.capture();
        for observer in &mut self.observers {
            observer.observe(&snapshot);
        }
        publisher.send_replace(snapshot.clone());
        snapshot
    }

    fn persist(&self) {
        let thresholds = self.controller.state().thresholds();
        if let Err(e) = self.store.save(&thresholds) {
            warn!(
                soil_threshold = thresholds.soil,
                humidity_threshold = thresholds.humidity,
                "failed to save thresholds: {e:#}"
            );
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
