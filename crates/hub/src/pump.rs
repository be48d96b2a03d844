//! Pump relay output.  There is no hardware behind it: the relay is a mock
//! that tracks the pin level it would drive and logs every switch.

use irrigation_controller::{Snapshot, TickObserver};
use tracing::info;

pub(crate) struct PumpRelay {
    active_low: bool, // many relay boards are active-low
    on: bool,
    switches: u64,
}

impl PumpRelay {
    /// Starts in the OFF position.
    pub(crate) fn new(active_low: bool) -> Self {
        let relay = Self {
            active_low,
            on: false,
            switches: 0,
        };
        info!(
            active_low,
            pin_high = relay.pin_high(),
            "[mock-gpio] pump relay initialised (no hardware)"
        );
        relay
    }

    pub(crate) fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        self.on = on;
        self.switches += 1;
        info!(
            pin_high = self.pin_high(),
            switches = self.switches,
            "[mock-gpio] pump set {}",
            if on { "ON" } else { "OFF" }
        );
    }

    /// Level of the (virtual) relay pin: active-low boards are LOW when ON.
    pub(crate) fn pin_high(&self) -> bool {
        self.on != self.active_low
    }
}

#[cfg(test)]
impl PumpRelay {
    fn is_on(&self) -> bool {
        self.on
    }

    fn switch_count(&self) -> u64 {
        self.switches
    }
}

impl TickObserver for PumpRelay {
    fn observe(&mut self, snapshot: &Snapshot) {
        self.set(snapshot.state.pump_on);
    }

    /// Fail-safe: never leave the pump running once the loop is gone.
    fn on_stop(&mut self) {
        self.set(false);
        info!(pin_high = self.pin_high(), "[mock-gpio] pump relay released");
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_controller::SystemState;

    fn snapshot(pump_on: bool) -> Snapshot {
        let mut state = SystemState::default();
        state.pump_on = pump_on;
        Snapshot {
            state,
            series: Vec::new(),
            ticks: 0,
        }
    }

    #[test]
    fn new_relay_is_off() {
        let relay = PumpRelay::new(true);
        assert!(!relay.is_on());
        assert_eq!(relay.switch_count(), 0);
    }

    #[test]
    fn active_low_pin_levels() {
        let mut relay = PumpRelay::new(true);
        assert!(relay.pin_high(), "active-low OFF is HIGH");
        relay.set(true);
        assert!(!relay.pin_high(), "active-low ON is LOW");
    }

    #[test]
    fn active_high_pin_levels() {
        let mut relay = PumpRelay::new(false);
        assert!(!relay.pin_high());
        relay.set(true);
        assert!(relay.pin_high());
    }

    #[test]
    fn only_transitions_are_counted() {
        let mut relay = PumpRelay::new(true);
        relay.set(false);
        relay.set(true);
        relay.set(true);
        relay.set(false);
        assert_eq!(relay.switch_count(), 2);
        assert!(!relay.is_on());
    }

    #[test]
    fn observer_follows_snapshots() {
        let mut relay = PumpRelay::new(true);
        for pump_on in [false, true, true, false, true] {
            relay.observe(&snapshot(pump_on));
            assert_eq!(relay.is_on(), pump_on);
        }
        assert_eq!(relay.switch_count(), 3);
    }

    #[test]
    fn stop_turns_a_running_pump_off() {
        let mut relay = PumpRelay::new(true);
        relay.observe(&snapshot(true));
        relay.on_stop();
        assert!(!relay.is_on());
        assert!(relay.pin_high(), "active-low OFF is HIGH");
        assert_eq!(relay.switch_count(), 2);
    }

    #[tokio::test]
    async fn relay_is_off_after_loop_shutdown() {
        use irrigation_controller::{ControlLoop, LoopConfig, MemoryStore};
        use std::sync::{Arc, Mutex};

        // Shares the relay so the test can read it after the loop owns it.
        struct Shared(Arc<Mutex<PumpRelay>>);

        impl TickObserver for Shared {
            fn observe(&mut self, snapshot: &Snapshot) {
                self.0.lock().unwrap().observe(snapshot);
            }

            fn on_stop(&mut self) {
                self.0.lock().unwrap().on_stop();
            }
        }

        let relay = Arc::new(Mutex::new(PumpRelay::new(true)));
        let rng = fastrand::Rng::with_seed(7);
        let (handle, task) = ControlLoop::new(&LoopConfig::default(), MemoryStore::new(), rng)
            .with_observer(Shared(relay.clone()))
            .spawn();

        handle.toggle_mode().await.unwrap();
        handle.toggle_manual_pump().await.unwrap();
        assert!(relay.lock().unwrap().is_on());

        handle.shutdown().await;
        task.await.unwrap();
        assert!(!relay.lock().unwrap().is_on());
    }
}
