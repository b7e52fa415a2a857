//! [`SpikeGate`] – jump-rejecting filter of the first firmware revision.
//!
//! A new sample replaces the previous reading unless it lands a "suspicious"
//! distance away: further than `min_jump` but closer than `max_jump`.  Small
//! changes are tracked directly, and very large ones (the robot really did
//! turn a corner) are accepted as well.  The very first sample is always
//! accepted.

use corridor_types::{CorridorError, MAX_CHANNELS, SensorId, Ticks};
use tracing::trace;

use crate::filter::ReadingFilter;

/// Default lower jump bound: 10 inches at 1.2 MHz.
pub const DEFAULT_MIN_JUMP: Ticks = 1776;
/// Default upper jump bound: 100 inches at 1.2 MHz.
pub const DEFAULT_MAX_JUMP: Ticks = 17_760;

#[derive(Debug, Clone)]
pub struct SpikeGate {
    min_jump: Ticks,
    max_jump: Ticks,
    readings: [Ticks; MAX_CHANNELS],
}

impl SpikeGate {
    pub fn new(min_jump: Ticks, max_jump: Ticks) -> Self {
        Self {
            min_jump,
            max_jump,
            readings: [0; MAX_CHANNELS],
        }
    }

    fn holds(&self, previous: Ticks, raw: Ticks) -> bool {
        let jump = previous.abs_diff(raw);
        previous != 0 && self.min_jump < jump && jump < self.max_jump
    }
}

impl Default for SpikeGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_JUMP, DEFAULT_MAX_JUMP)
    }
}

impl ReadingFilter for SpikeGate {
    fn record(&mut self, sensor: SensorId, raw: Ticks) -> Result<Ticks, CorridorError> {
        let i = sensor.index();
        let previous = *self
            .readings
            .get(i)
            .ok_or(CorridorError::UnknownChannel(i))?;
        if self.holds(previous, raw) {
            trace!(%sensor, raw, kept = previous, "spike rejected");
        } else {
            self.readings[i] = raw;
        }
        Ok(self.readings[i])
    }

    fn reading(&self, sensor: SensorId) -> Option<Ticks> {
        self.readings.get(sensor.index()).copied()
    }

    fn reset(&mut self) {
        self.readings = [0; MAX_CHANNELS];
    }
}
