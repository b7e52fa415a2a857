//! [`RangingSequencer`] – fires one sensor at a time and reads back its echo
//! width.
//!
//! Only one sensor may be ranging at any moment, otherwise the second
//! sensor's burst is picked up as the first sensor's echo.  The sequencer
//! guarantees this by construction: [`RangingSequencer::ping`] takes
//! `&mut self` and blocks for the full echo window before returning.

use std::sync::Arc;
use std::time::Duration;

use corridor_types::{CorridorError, MAX_CHANNELS, SensorId, Ticks};
use tracing::debug;

use crate::capture::CaptureEngine;
use crate::delay::Delay;
use crate::trigger::TriggerOutput;

/// Pulse and listening times for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorTiming {
    /// How long the trigger line is held high.
    pub trigger_pulse: Duration,
    /// How long to wait after releasing the trigger before reading the echo.
    pub echo_window: Duration,
}

impl Default for SensorTiming {
    fn default() -> Self {
        Self {
            trigger_pulse: Duration::from_micros(10),
            echo_window: Duration::from_millis(25),
        }
    }
}

pub struct RangingSequencer {
    engine: Arc<CaptureEngine>,
    trigger: Box<dyn TriggerOutput>,
    delay: Box<dyn Delay>,
    timings: [SensorTiming; MAX_CHANNELS],
}

impl RangingSequencer {
    pub fn new(
        engine: Arc<CaptureEngine>,
        trigger: Box<dyn TriggerOutput>,
        delay: Box<dyn Delay>,
    ) -> Self {
        Self {
            engine,
            trigger,
            delay,
            timings: [SensorTiming::default(); MAX_CHANNELS],
        }
    }

    /// Override the timing of a single sensor.  Unknown sensors are ignored.
    pub fn with_timing(mut self, sensor: SensorId, timing: SensorTiming) -> Self {
        if let Some(slot) = self.timings.get_mut(sensor.index()) {
            *slot = timing;
        }
        self
    }

    pub fn timing(&self, sensor: SensorId) -> Option<SensorTiming> {
        self.timings.get(sensor.index()).copied()
    }

    pub fn engine(&self) -> &Arc<CaptureEngine> {
        &self.engine
    }

    /// Trigger `sensor`, wait out its echo window, and return the latest
    /// echo width recorded on its channel.
    ///
    /// The returned value may be stale if no falling edge arrived inside the
    /// window, or `0` if the channel has never completed a pulse.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::UnknownChannel`] for an unwired sensor; the
    /// trigger line is not touched.
    pub fn ping(&mut self, sensor: SensorId) -> Result<Ticks, CorridorError> {
        let timing = self
            .timing(sensor)
            .ok_or(CorridorError::UnknownChannel(sensor.index()))?;

        self.trigger.assert_trigger(sensor);
        self.delay.wait(timing.trigger_pulse);
        self.trigger.deassert_trigger(sensor);
        self.delay.wait(timing.echo_window);

        let ticks = self.engine.latest_duration(sensor.index())?;
        debug!(%sensor, ticks, "ping");
        Ok(ticks)
    }

    /// Block for `duration` without triggering anything.
    pub fn wait(&mut self, duration: Duration) {
        self.delay.wait(duration);
    }
}
