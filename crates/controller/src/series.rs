use serde::Serialize;
use std::collections::VecDeque;
use time::OffsetDateTime;

use crate::state::SystemState;

/// Number of samples retained for the chart.
pub const WINDOW_CAPACITY: usize = 15;

/// One tick's readings, captured after the tick completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub soil_moisture: u8,
    pub humidity: u8,
}

impl Sample {
    pub fn capture(timestamp: OffsetDateTime, state: &SystemState) -> Self {
        Self {
            timestamp,
            soil_moisture: state.soil_moisture,
            humidity: state.humidity,
        }
    }

    /// Chart axis label, `HH:MM:SS` in the timestamp's offset (UTC for
    /// samples taken by the loop).  Browsers relabel in local time.
    pub fn label(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.timestamp.hour(),
            self.timestamp.minute(),
            self.timestamp.second()
        )
    }
}

/// Fixed-capacity FIFO of recent samples, oldest first.
#[derive(Debug, Clone)]
pub struct SeriesWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SeriesWindow {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    /// A zero capacity is bumped to one so the latest sample is always kept.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SeriesWindow {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    fn sample(i: i64) -> Sample {
        Sample {
            timestamp: datetime!(2025-06-01 12:00:00 UTC) + Duration::seconds(2 * i),
            soil_moisture: (i % 101) as u8,
            humidity: ((i * 3) % 101) as u8,
        }
    }

    #[test]
    fn length_is_min_of_pushes_and_capacity() {
        for k in 0..40 {
            let mut w = SeriesWindow::new();
            for i in 0..k {
                w.push(sample(i));
            }
            assert_eq!(w.len(), (k as usize).min(WINDOW_CAPACITY), "k={k}");
            assert_eq!(w.snapshot().len(), w.len());
        }
    }

    #[test]
    fn twenty_pushes_keep_last_fifteen_oldest_first() {
        let mut w = SeriesWindow::new();
        for i in 0..20 {
            w.push(sample(i));
        }
        let snap = w.snapshot();
        let expected: Vec<Sample> = (5..20).map(sample).collect();
        assert_eq!(snap, expected);
        assert_eq!(w.latest(), Some(&sample(19)));
    }

    #[test]
    fn snapshot_preserves_insertion_order_before_eviction() {
        let mut w = SeriesWindow::new();
        for i in 0..7 {
            w.push(sample(i));
        }
        let ts: Vec<_> = w.snapshot().iter().map(|s| s.timestamp).collect();
        let mut sorted = ts.clone();
        sorted.sort();
        assert_eq!(ts, sorted);
        assert_eq!(w.snapshot()[0], sample(0));
    }

    #[test]
    fn never_grows_past_capacity() {
        let mut w = SeriesWindow::with_capacity(3);
        for i in 0..1000 {
            w.push(sample(i));
            assert!(w.len() <= 3);
        }
        assert_eq!(w.snapshot(), vec![sample(997), sample(998), sample(999)]);
    }

    #[test]
    fn empty_window() {
        let w = SeriesWindow::default();
        assert!(w.is_empty());
        assert!(w.latest().is_none());
        assert!(w.snapshot().is_empty());
        assert_eq!(w.capacity(), WINDOW_CAPACITY);
    }

    #[test]
    fn zero_capacity_still_keeps_latest() {
        let mut w = SeriesWindow::with_capacity(0);
        w.push(sample(1));
        w.push(sample(2));
        assert_eq!(w.snapshot(), vec![sample(2)]);
    }

    #[test]
    fn capture_copies_readings() {
        let mut st = SystemState::default();
        st.soil_moisture = 33;
        st.humidity = 77;
        let s = Sample::capture(datetime!(2025-06-01 08:05:09 UTC), &st);
        assert_eq!(s.soil_moisture, 33);
        assert_eq!(s.humidity, 77);
        assert_eq!(s.label(), "08:05:09");
    }

    #[test]
    fn sample_serializes_rfc3339_timestamp() {
        let json = serde_json::to_value(sample(0)).unwrap();
        assert_eq!(json["timestamp"], "2025-06-01T12:00:00Z");
        assert_eq!(json["soil_moisture"], 0);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn label_follows_the_timestamp_offset() {
        let st = SystemState::default();
        let utc = Sample::capture(datetime!(2025-06-01 23:30:00 UTC), &st);
        let local = Sample::capture(datetime!(2025-06-02 01:30:00 +02:00), &st);
        assert_eq!(utc.timestamp, local.timestamp);
        assert_eq!(utc.label(), "23:30:00");
        assert_eq!(local.label(), "01:30:00");
        // The wire form carries the offset so clients can relabel.
        let json = serde_json::to_value(&local).unwrap();
        assert_eq!(json["timestamp"], "2025-06-02T01:30:00+02:00");
    }
}
