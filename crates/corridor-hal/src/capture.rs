//! [`CaptureEngine`] – echo-edge capture and pulse-width computation.
//!
//! Each ultrasonic sensor's echo line is wired to a hardware capture channel
//! that latches the free-running timer on both edges and raises an
//! interrupt.  The platform's interrupt handler calls
//! [`CaptureEngine::on_edge`] with the channel number; the engine alternates
//! between recording a rising and a falling timestamp and, on every falling
//! edge, stores the pulse width in timer ticks.
//!
//! # Sharing with the foreground loop
//!
//! The engine is written from interrupt context and read from the control
//! loop.  Every field is an atomic, so a single value such as
//! [`CaptureEngine::latest_duration`] can never be observed half-written.
//! [`CaptureEngine::snapshot`] additionally uses a per-channel sequence
//! counter so that all fields of one channel are read as a consistent set.
//! Each channel must have a single writer (its interrupt).
//!
//! # Missed edges
//!
//! The engine does not detect two consecutive edges of the same polarity.  A
//! glitched or missed edge flips the phase bookkeeping and silently corrupts
//! the next measurement; downstream filtering is relied upon to absorb it.
//!
//! # Example
//!
//! ```rust
//! use corridor_hal::capture::{CaptureEngine, CaptureTimer};
//!
//! struct Latched(u32);
//! impl CaptureTimer for Latched {
//!     fn capture_value(&mut self, _channel: usize) -> u32 { self.0 }
//!     fn clear_flag(&mut self, _channel: usize) {}
//! }
//!
//! let engine = CaptureEngine::new(0xFFFF);
//! engine.on_edge(0, &mut Latched(100)).unwrap();
//! engine.on_edge(0, &mut Latched(1900)).unwrap();
//! assert_eq!(engine.latest_duration(0).unwrap(), 1800);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering, fence};

use corridor_types::{CorridorError, EdgePhase, MAX_CHANNELS, Ticks};

/// Largest count of the default 16-bit capture timer.
pub const DEFAULT_TICK_MAX: Ticks = 0xFFFF;

// ────────────────────────────────────────────────────────────────────────────
// Platform seam
// ────────────────────────────────────────────────────────────────────────────

/// Access to the capture registers of the timer peripheral.
pub trait CaptureTimer {
    /// Return the timer count latched by the most recent edge on `channel`.
    fn capture_value(&mut self, channel: usize) -> Ticks;

    /// Acknowledge the capture interrupt for `channel`.
    fn clear_flag(&mut self, channel: usize);
}

/// Elapsed ticks between a rising and a falling timestamp.
///
/// A falling timestamp numerically below the rising one means the counter
/// wrapped once during the pulse; the result is then
/// `(tick_max - rising) + falling`.  Timestamps above `tick_max` saturate.
pub fn pulse_duration(rising: Ticks, falling: Ticks, tick_max: Ticks) -> Ticks {
    if falling < rising {
        tick_max.saturating_sub(rising).saturating_add(falling)
    } else {
        falling - rising
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Channel state
// ────────────────────────────────────────────────────────────────────────────

/// Consistent copy of one channel's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Edge the channel expects next.
    pub expecting: EdgePhase,
    pub rising: Ticks,
    pub falling: Ticks,
    /// Cumulative edges seen; wraps on overflow.
    pub edges: u32,
    /// Most recent pulse width.
    pub duration: Ticks,
}

#[derive(Default)]
struct CaptureChannel {
    /// Odd while the interrupt is mid-update.
    seq: AtomicU32,
    expecting_falling: AtomicBool,
    rising: AtomicU32,
    falling: AtomicU32,
    edges: AtomicU32,
    duration: AtomicU32,
}

impl CaptureChannel {
    fn begin_write(&self) -> u32 {
        let seq = self.seq.load(Ordering::Relaxed).wrapping_add(1);
        self.seq.store(seq, Ordering::Relaxed);
        fence(Ordering::Release);
        seq
    }

    fn end_write(&self, seq: u32) {
        self.seq.store(seq.wrapping_add(1), Ordering::Release);
    }

    fn expecting(&self) -> EdgePhase {
        if self.expecting_falling.load(Ordering::Relaxed) {
            EdgePhase::Falling
        } else {
            EdgePhase::Rising
        }
    }

    fn read(&self) -> ChannelSnapshot {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let snapshot = ChannelSnapshot {
                expecting: self.expecting(),
                rising: self.rising.load(Ordering::Relaxed),
                falling: self.falling.load(Ordering::Relaxed),
                edges: self.edges.load(Ordering::Relaxed),
                duration: self.duration.load(Ordering::Relaxed),
            };
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return snapshot;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CaptureEngine
// ────────────────────────────────────────────────────────────────────────────

/// Per-channel echo timing state, shared between the capture interrupt and
/// the control loop.
pub struct CaptureEngine {
    tick_max: Ticks,
    channels: [CaptureChannel; MAX_CHANNELS],
}

impl CaptureEngine {
    /// Create an engine for a timer that counts from 0 to `tick_max`.
    ///
    /// Every channel starts zeroed and expecting a rising edge.
    pub fn new(tick_max: Ticks) -> Self {
        Self {
            tick_max,
            channels: Default::default(),
        }
    }

    pub fn tick_max(&self) -> Ticks {
        self.tick_max
    }

    /// Handle one capture interrupt on `channel`.
    ///
    /// Records the latched timer count as the rising or falling timestamp,
    /// computes the pulse width on a falling edge, flips the expected phase,
    /// bumps the edge counter, and finally clears the capture flag.  Returns
    /// the phase that was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::UnknownChannel`] without touching the timer
    /// when `channel` is not wired.
    pub fn on_edge<T>(&self, channel: usize, timer: &mut T) -> Result<EdgePhase, CorridorError>
    where
        T: CaptureTimer + ?Sized,
    {
        let ch = self
            .channels
            .get(channel)
            .ok_or(CorridorError::UnknownChannel(channel))?;
        let now = timer.capture_value(channel);

        let seq = ch.begin_write();
        let phase = ch.expecting();
        match phase {
            EdgePhase::Rising => ch.rising.store(now, Ordering::Relaxed),
            EdgePhase::Falling => {
                ch.falling.store(now, Ordering::Relaxed);
                let rising = ch.rising.load(Ordering::Relaxed);
                ch.duration
                    .store(pulse_duration(rising, now, self.tick_max), Ordering::Relaxed);
            }
        }
        ch.expecting_falling
            .store(phase == EdgePhase::Rising, Ordering::Relaxed);
        ch.edges.fetch_add(1, Ordering::Relaxed);
        ch.end_write(seq);

        timer.clear_flag(channel);
        Ok(phase)
    }

    /// Most recent pulse width on `channel`, in ticks.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::UnknownChannel`] for an unwired channel.
    pub fn latest_duration(&self, channel: usize) -> Result<Ticks, CorridorError> {
        self.channel(channel)
            .map(|ch| ch.duration.load(Ordering::Acquire))
    }

    /// Cumulative number of edges handled on `channel`.
    pub fn edge_count(&self, channel: usize) -> Result<u32, CorridorError> {
        self.channel(channel).map(|ch| ch.edges.load(Ordering::Acquire))
    }

    /// Read every field of `channel` as one consistent set.
    pub fn snapshot(&self, channel: usize) -> Result<ChannelSnapshot, CorridorError> {
        self.channel(channel).map(CaptureChannel::read)
    }

    fn channel(&self, channel: usize) -> Result<&CaptureChannel, CorridorError> {
        self.channels
            .get(channel)
            .ok_or(CorridorError::UnknownChannel(channel))
    }
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Capture register double that returns a fixed count and records acks.
    struct Latched {
        value: Ticks,
        cleared: Vec<usize>,
    }

    impl Latched {
        fn at(value: Ticks) -> Self {
            Self {
                value,
                cleared: Vec::new(),
            }
        }
    }

    impl CaptureTimer for Latched {
        fn capture_value(&mut self, _channel: usize) -> Ticks {
            self.value
        }

        fn clear_flag(&mut self, channel: usize) {
            self.cleared.push(channel);
        }
    }

    fn pulse(engine: &CaptureEngine, channel: usize, rising: Ticks, falling: Ticks) {
        engine.on_edge(channel, &mut Latched::at(rising)).unwrap();
        engine.on_edge(channel, &mut Latched::at(falling)).unwrap();
    }

    #[test]
    fn duration_without_rollover() {
        assert_eq!(pulse_duration(100, 1900, 0xFFFF), 1800);
        assert_eq!(pulse_duration(500, 500, 0xFFFF), 0);
    }

    #[test]
    fn duration_with_rollover() {
        // (0xFFFF - 0xFF00) + 0x0100 = 0xFF + 0x100
        assert_eq!(pulse_duration(0xFF00, 0x0100, 0xFFFF), 0x01FF);
        assert_eq!(pulse_duration(0xFFFF, 0, 0xFFFF), 0);
    }

    #[test]
    fn duration_is_never_negative() {
        let samples = [0, 1, 7, 1000, 0x7FFF, 0xFFFE, 0xFFFF];
        for &r in &samples {
            for &f in &samples {
                let d = pulse_duration(r, f, 0xFFFF);
                if f < r {
                    assert_eq!(d, (0xFFFF - r) + f);
                } else {
                    assert_eq!(d, f - r);
                }
            }
        }
    }

    #[test]
    fn out_of_range_rising_saturates() {
        assert_eq!(pulse_duration(0x1_0000, 10, 0xFFFF), 10);
    }

    #[test]
    fn rising_then_falling_stores_duration() {
        let engine = CaptureEngine::new(0xFFFF);
        let mut timer = Latched::at(1000);
        assert_eq!(engine.on_edge(1, &mut timer).unwrap(), EdgePhase::Rising);
        assert_eq!(engine.latest_duration(1).unwrap(), 0);

        let mut timer = Latched::at(3400);
        assert_eq!(engine.on_edge(1, &mut timer).unwrap(), EdgePhase::Falling);
        assert_eq!(engine.latest_duration(1).unwrap(), 2400);
    }

    #[test]
    fn edge_clears_flag_and_counts() {
        let engine = CaptureEngine::default();
        let mut timer = Latched::at(5);
        engine.on_edge(2, &mut timer).unwrap();
        engine.on_edge(2, &mut timer).unwrap();
        assert_eq!(timer.cleared, vec![2, 2]);
        assert_eq!(engine.edge_count(2).unwrap(), 2);
        assert_eq!(engine.edge_count(0).unwrap(), 0);
    }

    /// Double that checks, at acknowledge time, that the engine has already
    /// published the edge.
    struct AckLast<'a> {
        engine: &'a CaptureEngine,
        value: Ticks,
        edges: u32,
        duration: Ticks,
        acked: bool,
    }

    impl CaptureTimer for AckLast<'_> {
        fn capture_value(&mut self, _channel: usize) -> Ticks {
            self.value
        }

        fn clear_flag(&mut self, channel: usize) {
            assert_eq!(self.engine.edge_count(channel).unwrap(), self.edges);
            assert_eq!(self.engine.latest_duration(channel).unwrap(), self.duration);
            assert_eq!(self.engine.snapshot(channel).unwrap().rising, 700);
            self.acked = true;
        }
    }

    #[test]
    fn flag_is_cleared_after_state_update() {
        let engine = CaptureEngine::default();
        let mut rising = AckLast {
            engine: &engine,
            value: 700,
            edges: 1,
            duration: 0,
            acked: false,
        };
        engine.on_edge(1, &mut rising).unwrap();
        assert!(rising.acked);

        let mut falling = AckLast {
            engine: &engine,
            value: 2500,
            edges: 2,
            duration: 1800,
            acked: false,
        };
        engine.on_edge(1, &mut falling).unwrap();
        assert!(falling.acked);
    }

    #[test]
    fn rollover_pulse_through_engine() {
        let engine = CaptureEngine::new(0xFFFF);
        pulse(&engine, 0, 0xFFF0, 0x0010);
        assert_eq!(engine.latest_duration(0).unwrap(), 0x0F + 0x10);
    }

    #[test]
    fn channels_are_independent() {
        let engine = CaptureEngine::default();
        pulse(&engine, 0, 0, 1800);
        pulse(&engine, 1, 100, 2500);
        assert_eq!(engine.latest_duration(0).unwrap(), 1800);
        assert_eq!(engine.latest_duration(1).unwrap(), 2400);
    }

    #[test]
    fn unknown_channel_is_rejected_without_ack() {
        let engine = CaptureEngine::default();
        let mut timer = Latched::at(5);
        assert_eq!(
            engine.on_edge(MAX_CHANNELS, &mut timer),
            Err(CorridorError::UnknownChannel(MAX_CHANNELS))
        );
        assert!(timer.cleared.is_empty());
        assert!(engine.latest_duration(7).is_err());
    }

    #[test]
    fn missed_edge_mislabels_following_pulse() {
        // A falling edge is lost: the next rising edge is taken as falling.
        let engine = CaptureEngine::default();
        pulse(&engine, 0, 1000, 2000);
        engine.on_edge(0, &mut Latched::at(3000)).unwrap(); // rising
        // falling at 3500 never arrives
        let phase = engine.on_edge(0, &mut Latched::at(9000)).unwrap();
        assert_eq!(phase, EdgePhase::Falling);
        assert_eq!(engine.latest_duration(0).unwrap(), 6000);
    }

    #[test]
    fn snapshot_reflects_last_pulse() {
        let engine = CaptureEngine::default();
        pulse(&engine, 1, 40, 2240);
        let snap = engine.snapshot(1).unwrap();
        assert_eq!(
            snap,
            ChannelSnapshot {
                expecting: EdgePhase::Rising,
                rising: 40,
                falling: 2240,
                edges: 2,
                duration: 2200,
            }
        );
    }

    #[test]
    fn concurrent_reader_never_sees_torn_snapshot() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(CaptureEngine::default());
        let writer = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..2000u32 {
                    let start = i % 1000;
                    pulse(&engine, 0, start, start + 1500);
                }
            })
        };
        for _ in 0..2000 {
            let snap = engine.snapshot(0).unwrap();
            if snap.expecting == EdgePhase::Rising && snap.edges > 0 {
                assert_eq!(snap.falling - snap.rising, snap.duration);
            }
        }
        writer.join().unwrap();
    }
}
