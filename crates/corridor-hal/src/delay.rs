//! Blocking wait primitive used for trigger pulses, echo windows, and
//! recovery pacing.

use std::time::{Duration, Instant};

/// A blocking, non-cancelable wait.
///
/// Real hardware uses [`MonotonicDelay`]; the simulation rig substitutes a
/// virtual clock that also delivers the echo edges that would arrive while
/// the foreground is waiting.
pub trait Delay: Send {
    fn wait(&mut self, duration: Duration);
}

/// Waits against [`Instant`], sleeping through the bulk of long waits and
/// spinning for the tail.
#[derive(Debug, Clone)]
pub struct MonotonicDelay {
    spin_threshold: Duration,
}

impl MonotonicDelay {
    /// `spin_threshold` is the remaining time below which the wait spins
    /// instead of sleeping.
    pub fn new(spin_threshold: Duration) -> Self {
        Self { spin_threshold }
    }
}

impl Default for MonotonicDelay {
    fn default() -> Self {
        Self::new(Duration::from_micros(200))
    }
}

impl Delay for MonotonicDelay {
    fn wait(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            if remaining > self.spin_threshold {
                std::thread::sleep(remaining - self.spin_threshold);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}
