//! In-process simulation rig for running the ranging and motor pipeline
//! without hardware.
//!
//! [`SimRig`] builds a set of stub drivers that share one virtual world:
//!
//! - [`SimTrigger`] records every trigger pulse and, when a line is
//!   released, schedules the rising and falling echo edges for that sensor
//!   from its scripted echo durations.
//! - [`SimDelay`] advances a virtual timer instead of sleeping and delivers
//!   every scheduled edge that falls inside the wait through
//!   [`CaptureEngine::on_edge`], standing in for the capture interrupt that
//!   would preempt the foreground loop on the board.
//! - [`SimMotorLink`] records every byte written to the motor driver.
//! - [`SimProbe`] inspects and perturbs the world from tests.
//!
//! Triggers and motor bytes are counted without limit, but only the most
//! recent [`DEFAULT_HISTORY`] of each are kept for inspection (see
//! [`SimRig::with_history_limit`]), so an unbounded run holds constant memory.
//!
//! Echo scripts hold their last sample once exhausted unless built with
//! [`SimRig::with_cycled_echoes`].  A sample of `0` produces no edges at all,
//! as when nothing reflects the burst.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use corridor_hal::capture::CaptureEngine;
//! use corridor_hal::delay::Delay;
//! use corridor_hal::sim::SimRig;
//! use corridor_hal::trigger::TriggerOutput;
//! use corridor_types::SensorId;
//!
//! let engine = Arc::new(CaptureEngine::new(0xFFFF));
//! let mut rig = SimRig::new(Arc::clone(&engine), 1_200_000)
//!     .with_echoes(SensorId::FRONT, vec![1800])
//!     .build();
//!
//! rig.trigger.assert_trigger(SensorId::FRONT);
//! rig.trigger.deassert_trigger(SensorId::FRONT);
//! rig.delay.wait(Duration::from_millis(25));
//! assert_eq!(engine.latest_duration(0).unwrap(), 1800);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use corridor_types::{MAX_CHANNELS, SensorId, Ticks};
use tracing::warn;

use crate::capture::{CaptureEngine, CaptureTimer};
use crate::delay::Delay;
use crate::motor::MotorLink;
use crate::trigger::TriggerOutput;

/// Number of triggers and of motor bytes a rig keeps for inspection.
pub const DEFAULT_HISTORY: usize = 4096;

// ────────────────────────────────────────────────────────────────────────────
// Echo scripts
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct EchoScript {
    samples: Vec<Ticks>,
    cycle: bool,
    cursor: usize,
}

impl EchoScript {
    fn new(samples: Vec<Ticks>, cycle: bool) -> Self {
        Self {
            samples,
            cycle,
            cursor: 0,
        }
    }

    fn next_sample(&mut self) -> Option<Ticks> {
        if self.samples.is_empty() {
            return None;
        }
        if self.cursor >= self.samples.len() {
            if !self.cycle {
                return self.samples.last().copied();
            }
            self.cursor = 0;
        }
        let sample = self.samples[self.cursor];
        self.cursor += 1;
        Some(sample)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared world
// ────────────────────────────────────────────────────────────────────────────

struct SimWorld {
    engine: Arc<CaptureEngine>,
    clock_hz: u32,
    /// Virtual timer, never wrapped; the capture registers see it modulo the
    /// timer period.
    now: u64,
    scripts: [EchoScript; MAX_CHANNELS],
    /// Scheduled edges as `(time, channel)`, kept sorted by time.
    pending: Vec<(u64, usize)>,
    asserted: Option<SensorId>,
    overlaps: u32,
    history_limit: usize,
    triggers: VecDeque<SensorId>,
    trigger_count: u64,
    flags_cleared: [u32; MAX_CHANNELS],
    motor_bytes: VecDeque<u8>,
    motor_byte_count: u64,
    motor_busy_polls: u32,
    busy_left: u32,
}

impl SimWorld {
    fn ticks_for(&self, duration: Duration) -> u64 {
        let ticks = duration.as_nanos() * u128::from(self.clock_hz) / 1_000_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    fn schedule(&mut self, time: u64, channel: usize) {
        let at = self.pending.partition_point(|&(t, _)| t <= time);
        self.pending.insert(at, (time, channel));
    }

    fn fire(&mut self, time: u64, channel: usize) {
        let period = u64::from(self.engine.tick_max()) + 1;
        let mut latch = LatchedCapture {
            value: (time % period) as Ticks,
            cleared: &mut self.flags_cleared,
        };
        if let Err(e) = self.engine.on_edge(channel, &mut latch) {
            warn!(error = %e, channel, "simulated edge rejected");
        }
    }

    fn advance(&mut self, ticks: u64) {
        let target = self.now.saturating_add(ticks);
        let due = self.pending.partition_point(|&(t, _)| t <= target);
        let edges: Vec<(u64, usize)> = self.pending.drain(..due).collect();
        for (time, channel) in edges {
            self.now = time;
            self.fire(time, channel);
        }
        self.now = target;
    }
}

/// Append `item`, dropping the oldest entry once `limit` are held.
fn remember<T>(log: &mut VecDeque<T>, item: T, limit: usize) {
    if limit == 0 {
        return;
    }
    if log.len() >= limit {
        log.pop_front();
    }
    log.push_back(item);
}

struct LatchedCapture<'a> {
    value: Ticks,
    cleared: &'a mut [u32; MAX_CHANNELS],
}

impl CaptureTimer for LatchedCapture<'_> {
    fn capture_value(&mut self, _channel: usize) -> Ticks {
        self.value
    }

    fn clear_flag(&mut self, channel: usize) {
        if let Some(count) = self.cleared.get_mut(channel) {
            *count += 1;
        }
    }
}

type World = Arc<Mutex<SimWorld>>;

fn lock(world: &World) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Stub drivers
// ────────────────────────────────────────────────────────────────────────────

/// Simulated trigger lines.  Releasing a line schedules that sensor's next
/// scripted echo.
pub struct SimTrigger {
    world: World,
}

impl TriggerOutput for SimTrigger {
    fn assert_trigger(&mut self, sensor: SensorId) {
        let mut w = lock(&self.world);
        if w.asserted.is_some_and(|active| active != sensor) {
            w.overlaps += 1;
        }
        w.asserted = Some(sensor);
        w.trigger_count += 1;
        let limit = w.history_limit;
        remember(&mut w.triggers, sensor, limit);
    }

    fn deassert_trigger(&mut self, sensor: SensorId) {
        let mut w = lock(&self.world);
        w.asserted = None;
        let channel = sensor.index();
        if channel >= MAX_CHANNELS {
            return;
        }
        if let Some(echo) = w.scripts[channel].next_sample()
            && echo > 0
        {
            let start = w.now;
            w.schedule(start, channel);
            w.schedule(start + u64::from(echo), channel);
        }
    }
}

/// Virtual-time delay that delivers due echo edges while "waiting".
pub struct SimDelay {
    world: World,
}

impl Delay for SimDelay {
    fn wait(&mut self, duration: Duration) {
        let mut w = lock(&self.world);
        let ticks = w.ticks_for(duration);
        w.advance(ticks);
    }
}

/// Simulated serial link to the motor driver.
pub struct SimMotorLink {
    world: World,
}

impl MotorLink for SimMotorLink {
    fn is_ready(&self) -> bool {
        let mut w = lock(&self.world);
        if w.busy_left == 0 {
            true
        } else {
            w.busy_left -= 1;
            false
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut w = lock(&self.world);
        w.motor_byte_count += 1;
        let limit = w.history_limit;
        remember(&mut w.motor_bytes, byte, limit);
        w.busy_left = w.motor_busy_polls;
    }
}

/// Test and telemetry access to the simulated world.
#[derive(Clone)]
pub struct SimProbe {
    world: World,
}

impl SimProbe {
    /// Virtual timer ticks elapsed since the rig was built (plus the start
    /// offset).
    pub fn now_ticks(&self) -> u64 {
        lock(&self.world).now
    }

    /// The most recently triggered sensors, oldest first.
    pub fn triggers(&self) -> Vec<SensorId> {
        lock(&self.world).triggers.iter().copied().collect()
    }

    /// Total trigger pulses since the rig was built.
    pub fn trigger_count(&self) -> u64 {
        lock(&self.world).trigger_count
    }

    /// Number of times a trigger was asserted while another was still high.
    pub fn overlaps(&self) -> u32 {
        lock(&self.world).overlaps
    }

    /// The most recent bytes written to the motor link, oldest first.
    pub fn motor_bytes(&self) -> Vec<u8> {
        lock(&self.world).motor_bytes.iter().copied().collect()
    }

    /// Total bytes written to the motor link since the rig was built.
    pub fn motor_byte_count(&self) -> u64 {
        lock(&self.world).motor_byte_count
    }

    /// Number of capture flags acknowledged on `channel`.
    pub fn flags_cleared(&self, channel: usize) -> u32 {
        lock(&self.world).flags_cleared.get(channel).copied().unwrap_or(0)
    }

    /// Deliver one stray edge on `channel` right now, as a glitch on the
    /// echo line would.
    pub fn inject_edge(&self, channel: usize) {
        let mut w = lock(&self.world);
        let now = w.now;
        w.fire(now, channel);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// The stub drivers produced by [`SimRig::build`].
pub struct SimHardware {
    pub trigger: Box<SimTrigger>,
    pub delay: Box<SimDelay>,
    pub motor_link: Box<SimMotorLink>,
    pub probe: SimProbe,
}

/// Builder for a simulated ranging and motor rig around a shared
/// [`CaptureEngine`].
pub struct SimRig {
    engine: Arc<CaptureEngine>,
    clock_hz: u32,
    start_tick: u64,
    scripts: [EchoScript; MAX_CHANNELS],
    motor_busy_polls: u32,
    history_limit: usize,
}

impl SimRig {
    /// Start a rig whose timer runs at `clock_hz`.  No sensor echoes until
    /// given a script.
    pub fn new(engine: Arc<CaptureEngine>, clock_hz: u32) -> Self {
        Self {
            engine,
            clock_hz,
            start_tick: 0,
            scripts: Default::default(),
            motor_busy_polls: 0,
            history_limit: DEFAULT_HISTORY,
        }
    }

    /// Echo durations for `sensor`, one per ping; the last one repeats.
    pub fn with_echoes(mut self, sensor: SensorId, samples: Vec<Ticks>) -> Self {
        if let Some(script) = self.scripts.get_mut(sensor.index()) {
            *script = EchoScript::new(samples, false);
        }
        self
    }

    /// Echo durations for `sensor` that restart from the top once exhausted.
    pub fn with_cycled_echoes(mut self, sensor: SensorId, samples: Vec<Ticks>) -> Self {
        if let Some(script) = self.scripts.get_mut(sensor.index()) {
            *script = EchoScript::new(samples, true);
        }
        self
    }

    /// Start the virtual timer at `tick` instead of zero.
    pub fn starting_at(mut self, tick: u64) -> Self {
        self.start_tick = tick;
        self
    }

    /// Make the motor link report busy for `polls` polls after every byte.
    pub fn with_motor_busy_polls(mut self, polls: u32) -> Self {
        self.motor_busy_polls = polls;
        self
    }

    /// Keep at most `limit` triggers and motor bytes for [`SimProbe`].
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn build(self) -> SimHardware {
        let world = Arc::new(Mutex::new(SimWorld {
            engine: self.engine,
            clock_hz: self.clock_hz,
            now: self.start_tick,
            scripts: self.scripts,
            pending: Vec::new(),
            asserted: None,
            overlaps: 0,
            history_limit: self.history_limit,
            triggers: VecDeque::new(),
            trigger_count: 0,
            flags_cleared: [0; MAX_CHANNELS],
            motor_bytes: VecDeque::new(),
            motor_byte_count: 0,
            motor_busy_polls: self.motor_busy_polls,
            busy_left: 0,
        }));
        SimHardware {
            trigger: Box::new(SimTrigger {
                world: Arc::clone(&world),
            }),
            delay: Box::new(SimDelay {
                world: Arc::clone(&world),
            }),
            motor_link: Box::new(SimMotorLink {
                world: Arc::clone(&world),
            }),
            probe: SimProbe { world },
        }
    }
}
