//! [`Ranger`] – a ranging sequencer paired with a reading filter.
//!
//! Every ping's raw echo width goes straight into the filter, and the
//! filtered value is what the navigator sees.

use std::time::Duration;

use corridor_hal::RangingSequencer;
use corridor_perception::ReadingFilter;
use corridor_types::{CorridorError, SensorId, Ticks};

pub struct Ranger {
    sequencer: RangingSequencer,
    filter: Box<dyn ReadingFilter>,
}

impl Ranger {
    pub fn new(sequencer: RangingSequencer, filter: Box<dyn ReadingFilter>) -> Self {
        Self { sequencer, filter }
    }

    /// Ping `sensor` and return its filtered reading.
    pub fn ping(&mut self, sensor: SensorId) -> Result<Ticks, CorridorError> {
        let raw = self.sequencer.ping(sensor)?;
        self.filter.record(sensor, raw)
    }

    /// Latest filtered reading of `sensor`, `0` before its first ping.
    pub fn reading(&self, sensor: SensorId) -> Ticks {
        self.filter.reading(sensor).unwrap_or(0)
    }

    pub fn wait(&mut self, duration: Duration) {
        self.sequencer.wait(duration);
    }

    pub fn sequencer(&self) -> &RangingSequencer {
        &self.sequencer
    }
}
