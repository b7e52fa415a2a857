//! Three-sample history voting filter.
//!
//! Every sensor keeps the last three raw echo widths, oldest first.  After
//! each new sample the filter compares the three pairwise gaps
//!
//! ```text
//! d1 = |h0 - h1|   d2 = |h1 - h2|   d3 = |h0 - h2|
//! ```
//!
//! and returns the sample attached to the strictly smallest gap: `h0` for
//! `d1`, `h1` for `d2`, `h2` for `d3`.  When no gap is strictly smallest the
//! previous filtered reading is kept.  A single spike therefore never makes
//! it through: it is far from both neighbours, so the smallest gap is always
//! between the two good samples.
//!
//! # Example
//!
//! ```rust
//! use corridor_perception::history::{HistoryFilter, vote};
//! use corridor_perception::ReadingFilter;
//! use corridor_types::SensorId;
//!
//! assert_eq!(vote([100, 102, 500], 0), 100);
//!
//! let mut filter = HistoryFilter::new();
//! for raw in [1800, 1820, 1805] {
//!     filter.record(SensorId::FRONT, raw).unwrap();
//! }
//! assert_eq!(filter.reading(SensorId::FRONT), Some(1805));
//! ```

use corridor_types::{CorridorError, MAX_CHANNELS, SensorId, Ticks};
use tracing::trace;

use crate::filter::ReadingFilter;

/// Pick the history entry attached to the strictly smallest pairwise gap, or
/// `previous` on a tie.
pub fn vote(history: [Ticks; 3], previous: Ticks) -> Ticks {
    let [h0, h1, h2] = history;
    let d1 = h0.abs_diff(h1);
    let d2 = h1.abs_diff(h2);
    let d3 = h0.abs_diff(h2);

    if d1 < d2 && d1 < d3 {
        h0
    } else if d2 < d1 && d2 < d3 {
        h1
    } else if d3 < d1 && d3 < d2 {
        h2
    } else {
        previous
    }
}

/// Per-sensor history buffers and voted readings.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    histories: [[Ticks; 3]; MAX_CHANNELS],
    readings: [Ticks; MAX_CHANNELS],
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three raw samples currently held for `sensor`, oldest first.
    pub fn history(&self, sensor: SensorId) -> Option<[Ticks; 3]> {
        self.histories.get(sensor.index()).copied()
    }
}

impl ReadingFilter for HistoryFilter {
    fn record(&mut self, sensor: SensorId, raw: Ticks) -> Result<Ticks, CorridorError> {
        let i = sensor.index();
        let (Some(history), Some(reading)) = (self.histories.get_mut(i), self.readings.get_mut(i))
        else {
            return Err(CorridorError::UnknownChannel(i));
        };

        history.rotate_left(1);
        history[2] = raw;
        *reading = vote(*history, *reading);
        trace!(%sensor, raw, filtered = *reading, "vote");
        Ok(*reading)
    }

    fn reading(&self, sensor: SensorId) -> Option<Ticks> {
        self.readings.get(sensor.index()).copied()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(filter: &mut HistoryFilter, sensor: SensorId, samples: &[Ticks]) -> Vec<Ticks> {
        samples
            .iter()
            .map(|&raw| filter.record(sensor, raw).unwrap())
            .collect()
    }

    #[test]
    fn vote_rejects_single_spike() {
        let picked = vote([100, 102, 500], 0);
        assert!(picked == 100 || picked == 102);
    }

    #[test]
    fn vote_picks_each_position() {
        assert_eq!(vote([10, 11, 90], 0), 10);
        assert_eq!(vote([90, 10, 11], 0), 10);
        assert_eq!(vote([10, 90, 11], 0), 11);
    }

    #[test]
    fn vote_three_way_tie_keeps_previous() {
        assert_eq!(vote([0, 0, 0], 42), 42);
        // d1 = d2 = 10, d3 = 20: no strict minimum
        assert_eq!(vote([10, 20, 30], 7), 7);
    }

    #[test]
    fn vote_two_way_tie_for_minimum_keeps_previous() {
        // d1 = 5, d2 = 5, d3 = 0 → d3 is strictly smallest
        assert_eq!(vote([5, 10, 5], 1), 5);
        // d1 = 5, d3 = 5, d2 = 10 → tie on the minimum
        assert_eq!(vote([10, 5, 15], 1), 1);
    }

    #[test]
    fn fresh_filter_trace() {
        let mut f = HistoryFilter::new();
        let out = feed(&mut f, SensorId::FRONT, &[1200, 1150, 1180]);
        assert_eq!(out, vec![0, 1200, 1180]);
        assert_eq!(f.history(SensorId::FRONT), Some([1200, 1150, 1180]));
    }

    #[test]
    fn steady_input_settles_on_that_value() {
        let mut f = HistoryFilter::new();
        let out = feed(&mut f, SensorId::SIDE, &[2400, 2400, 2400, 2400]);
        assert_eq!(*out.last().unwrap(), 2400);
        assert_eq!(f.reading(SensorId::SIDE), Some(2400));
    }

    #[test]
    fn reading_is_always_from_history_or_previous() {
        let mut f = HistoryFilter::new();
        let samples = [3000, 120, 2980, 3010, 9000, 3005, 0, 2990, 3001];
        let mut previous = 0;
        for raw in samples {
            let out = f.record(SensorId::FRONT, raw).unwrap();
            let history = f.history(SensorId::FRONT).unwrap();
            assert!(history.contains(&out) || out == previous);
            previous = out;
        }
    }

    #[test]
    fn sensors_are_independent() {
        let mut f = HistoryFilter::new();
        feed(&mut f, SensorId::FRONT, &[500, 500, 500]);
        assert_eq!(f.history(SensorId::SIDE), Some([0, 0, 0]));
        assert_eq!(f.reading(SensorId::SIDE), Some(0));
    }

    #[test]
    fn unknown_sensor_is_rejected() {
        let mut f = HistoryFilter::new();
        assert_eq!(
            f.record(SensorId(MAX_CHANNELS), 10),
            Err(CorridorError::UnknownChannel(MAX_CHANNELS))
        );
        assert_eq!(f.reading(SensorId(MAX_CHANNELS)), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut f = HistoryFilter::new();
        feed(&mut f, SensorId::FRONT, &[700, 710, 705]);
        f.reset();
        assert_eq!(f.reading(SensorId::FRONT), Some(0));
        assert_eq!(f.history(SensorId::FRONT), Some([0, 0, 0]));
    }
}
