//! `TriggerOutput` trait for the per-sensor ranging trigger lines.

use corridor_types::SensorId;

/// Digital outputs that start an ultrasonic ping.
///
/// The [`RangingSequencer`][crate::sequencer::RangingSequencer] asserts a
/// sensor's line for the configured pulse width and then releases it; the
/// sensor starts its burst on the falling edge.
pub trait TriggerOutput: Send {
    /// Drive the trigger line of `sensor` high.
    fn assert_trigger(&mut self, sensor: SensorId);

    /// Drive the trigger line of `sensor` low.
    fn deassert_trigger(&mut self, sensor: SensorId);
}
