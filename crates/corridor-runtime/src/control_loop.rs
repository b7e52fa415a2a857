//! [`ControlLoop`] – startup sequence and the foreground main loop.
//!
//! Startup:
//!
//! 1. Send the all-stop byte so both motors are idle.
//! 2. Wait out the sensor warm-up period.
//! 3. Prime the filters with alternating front/side pings so the history
//!    buffers hold real samples before the first decision.
//!
//! Each iteration then pings exactly one sensor, alternating side and front,
//! and lets the [`Navigator`] act on the freshest filtered readings.  A
//! bounded recovery that gives up is logged and the loop carries on with the
//! next iteration.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use corridor_hal::{CaptureEngine, MotorChannel, RangingSequencer, SimRig};
//! use corridor_perception::HistoryFilter;
//! use corridor_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//! use corridor_runtime::ranger::Ranger;
//! use corridor_types::SensorId;
//!
//! let engine = Arc::new(CaptureEngine::default());
//! let rig = SimRig::new(Arc::clone(&engine), 1_200_000)
//!     .with_echoes(SensorId::SIDE, vec![2400])
//!     .build();
//! let ranger = Ranger::new(
//!     RangingSequencer::new(engine, rig.trigger, rig.delay),
//!     Box::new(HistoryFilter::new()),
//! );
//! let config = ControlLoopConfig {
//!     max_iterations: Some(4),
//!     ..ControlLoopConfig::default()
//! };
//! let mut control = ControlLoop::new(config, ranger, MotorChannel::new(rig.motor_link)).unwrap();
//! let ran = control.run(&AtomicBool::new(false), |_| {}).unwrap();
//! assert_eq!(ran, 4);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use corridor_hal::MotorChannel;
use corridor_perception::ticks_to_inches;
use corridor_types::{CorridorError, CycleReport, SensorId};
use tracing::{debug, info, warn};

use crate::correction::{CorrectionController, CorrectionTable};
use crate::navigation::{NavigationPolicy, Navigator};
use crate::ranger::Ranger;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Idle time after power-up before the first ping.
    pub warmup: Duration,
    /// Alternating front/side pings issued during startup.
    pub priming_pings: u32,
    pub policy: NavigationPolicy,
    pub correction: CorrectionTable,
    /// Stop after this many iterations.  `None` runs until asked to stop.
    pub max_iterations: Option<u64>,
    /// Capture timer frequency, used to log readings in inches.
    pub clock_hz: u32,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_micros(62_500),
            priming_pings: 50,
            policy: NavigationPolicy::default(),
            correction: CorrectionTable::default(),
            max_iterations: None,
            clock_hz: 1_200_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct ControlLoop {
    ranger: Ranger,
    motors: MotorChannel,
    navigator: Navigator,
    warmup: Duration,
    priming_pings: u32,
    max_iterations: Option<u64>,
    clock_hz: u32,
    next_sensor: SensorId,
    iterations: u64,
    started: bool,
}

impl ControlLoop {
    /// Assemble a loop, validating the navigation policy and correction
    /// table.
    pub fn new(
        config: ControlLoopConfig,
        ranger: Ranger,
        motors: MotorChannel,
    ) -> Result<Self, CorridorError> {
        config.policy.validate()?;
        config.correction.validate()?;
        Ok(Self {
            ranger,
            motors,
            navigator: Navigator::new(config.policy, CorrectionController::new(config.correction)),
            warmup: config.warmup,
            priming_pings: config.priming_pings,
            max_iterations: config.max_iterations,
            clock_hz: config.clock_hz,
            next_sensor: SensorId::SIDE,
            iterations: 0,
            started: false,
        })
    }

    /// Run the startup sequence.  Called by [`ControlLoop::run`] if it has
    /// not been called yet.
    pub fn start(&mut self) -> Result<(), CorridorError> {
        self.motors.all_stop();
        self.ranger.wait(self.warmup);
        for i in 0..self.priming_pings {
            let sensor = if i % 2 == 0 {
                SensorId::FRONT
            } else {
                SensorId::SIDE
            };
            self.ranger.ping(sensor)?;
        }
        self.started = true;
        info!(
            priming_pings = self.priming_pings,
            front = self.ranger.reading(SensorId::FRONT),
            side = self.ranger.reading(SensorId::SIDE),
            "control loop started"
        );
        Ok(())
    }

    /// Ping the next sensor in round-robin order and run one navigation step.
    pub fn iterate(&mut self) -> Result<CycleReport, CorridorError> {
        let pinged = self.next_sensor;
        self.ranger.ping(pinged)?;
        self.next_sensor = if pinged == SensorId::SIDE {
            SensorId::FRONT
        } else {
            SensorId::SIDE
        };

        let state = match self.navigator.step(&mut self.ranger, &mut self.motors) {
            Ok(state) => state,
            Err(e @ CorridorError::RecoveryExhausted { .. }) => {
                warn!(error = %e, "recovery abandoned, continuing");
                self.navigator.current_state()
            }
            Err(e) => return Err(e),
        };
        self.iterations += 1;

        let front = self.ranger.reading(SensorId::FRONT);
        let side = self.ranger.reading(SensorId::SIDE);
        debug!(
            iteration = self.iterations,
            %pinged,
            %state,
            front,
            side,
            front_in = ticks_to_inches(front, self.clock_hz),
            side_in = ticks_to_inches(side, self.clock_hz),
            "cycle"
        );

        Ok(CycleReport {
            timestamp: Utc::now(),
            iteration: self.iterations,
            pinged,
            state,
            front,
            side,
            speeds: self.motors.last_speeds(),
        })
    }

    /// Iterate until `stop` is set or the iteration limit is reached, handing
    /// every report to `on_cycle`.  The motors are stopped on the way out,
    /// also when an iteration fails.  Returns the number of iterations run.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut on_cycle: F) -> Result<u64, CorridorError>
    where
        F: FnMut(&CycleReport),
    {
        let result = self.run_inner(stop, &mut on_cycle);
        self.motors.all_stop();
        info!(iterations = self.iterations, "control loop stopped");
        result.map(|()| self.iterations)
    }

    fn run_inner<F>(&mut self, stop: &AtomicBool, on_cycle: &mut F) -> Result<(), CorridorError>
    where
        F: FnMut(&CycleReport),
    {
        if !self.started {
            self.start()?;
        }
        while !stop.load(Ordering::SeqCst) {
            if self.max_iterations.is_some_and(|max| self.iterations >= max) {
                break;
            }
            let report = self.iterate()?;
            on_cycle(&report);
        }
        Ok(())
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn ranger(&self) -> &Ranger {
        &self.ranger
    }
}
