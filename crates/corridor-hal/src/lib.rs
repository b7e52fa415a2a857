//! `corridor-hal` – Ranging & Drive Hardware
//!
//! Everything that touches a pin, a timer register, or the motor driver's
//! serial line lives here, behind small traits so the control loop can run
//! unchanged against real peripherals or the in-process simulation.
//!
//! # Modules
//!
//! - [`capture`] – [`CaptureEngine`][capture::CaptureEngine]: converts echo
//!   edges delivered by the capture interrupt into pulse widths, with timer
//!   rollover handling.
//! - [`sequencer`] – [`RangingSequencer`][sequencer::RangingSequencer]:
//!   triggers one sensor at a time and returns its latest echo width after
//!   the echo window.
//! - [`motor`] – [`MotorChannel`][motor::MotorChannel]: the one-byte serial
//!   protocol of the dual motor driver.
//! - [`trigger`] / [`delay`] – platform seams for the trigger lines and
//!   blocking waits.
//! - [`sim`] – [`SimRig`][sim::SimRig]: stub drivers sharing a virtual timer,
//!   scripted echoes, and a recorded motor byte stream.

pub mod capture;
pub mod delay;
pub mod motor;
pub mod sequencer;
pub mod sim;
pub mod trigger;

pub use capture::{CaptureEngine, CaptureTimer, ChannelSnapshot, DEFAULT_TICK_MAX, pulse_duration};
pub use delay::{Delay, MonotonicDelay};
pub use motor::{ALL_STOP_BYTE, MotorChannel, MotorLink};
pub use sequencer::{RangingSequencer, SensorTiming};
pub use sim::{DEFAULT_HISTORY, SimHardware, SimProbe, SimRig};
pub use trigger::TriggerOutput;
