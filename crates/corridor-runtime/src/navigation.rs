//! [`Navigator`] – the wall-following state machine.
//!
//! Once per control-loop iteration the navigator looks at the filtered front
//! reading and picks one of four behaviours:
//!
//! | Front reading | State | Behaviour |
//! |---|---|---|
//! | `0` (no echo) or `>= dodge_threshold` | `Forward` | correct against the side wall |
//! | `< stop_threshold` | `StopRecover` | stop, back up until the front clears |
//! | `< dodge_threshold` | `Dodge` | swerve until front and side clear |
//! | `< dodge_threshold`, timed-turn policy | `Turn` | fixed blind turn |
//!
//! `StopRecover` and `Dodge` block inside [`Navigator::step`] until their
//! exit condition holds, unless [`NavigationPolicy::recovery_limit`] is set.
//!
//! # Example
//!
//! ```rust
//! use corridor_runtime::navigation::{NavigationPolicy, decide};
//! use corridor_types::NavigationState;
//!
//! let policy = NavigationPolicy::default();
//! assert_eq!(decide(0, &policy), NavigationState::Forward);
//! assert_eq!(decide(1769, &policy), NavigationState::StopRecover);
//! assert_eq!(decide(1805, &policy), NavigationState::Dodge);
//! assert_eq!(decide(4000, &policy), NavigationState::Forward);
//! ```

use std::time::Duration;

use corridor_hal::MotorChannel;
use corridor_types::{CorridorError, MAX_SPEED, NavigationState, SensorId, SpeedPair, Ticks};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::correction::CorrectionController;
use crate::ranger::Ranger;
use crate::recovery_guard::RecoveryGuard;

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// What to do when an obstacle is ahead but not yet close enough to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidanceStrategy {
    /// Sensor-guided swerve.
    #[default]
    Dodge,
    /// Fixed-duration blind turn.
    TimedTurn,
}

/// When a dodge is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DodgeExit {
    /// Front and side have both reached their exit thresholds.
    #[default]
    Both,
    /// Either reading has reached its exit threshold.
    Either,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPolicy {
    pub stop_threshold: Ticks,
    pub dodge_threshold: Ticks,
    /// Front reading that ends a stop-and-recover.
    pub recover_threshold: Ticks,
    pub dodge_front_exit: Ticks,
    pub dodge_side_exit: Ticks,
    pub stop_speeds: SpeedPair,
    pub reverse_speeds: SpeedPair,
    pub dodge_speeds: SpeedPair,
    pub turn_speeds: SpeedPair,
    /// Pause between stopping and reversing.
    pub stop_hold: Duration,
    /// Wait after every recovery ping.
    pub settle: Duration,
    pub turn_duration: Duration,
    pub avoidance: AvoidanceStrategy,
    pub dodge_exit: DodgeExit,
    /// Re-ping rounds after which a recovery gives up.  `None` never gives
    /// up.
    pub recovery_limit: Option<u32>,
}

impl Default for NavigationPolicy {
    fn default() -> Self {
        Self {
            stop_threshold: 1770,
            dodge_threshold: 4000,
            recover_threshold: 3800,
            dodge_front_exit: 4000,
            dodge_side_exit: 2000,
            stop_speeds: SpeedPair::NEUTRAL,
            reverse_speeds: SpeedPair::new(90, 90),
            dodge_speeds: SpeedPair::new(70, 5),
            turn_speeds: SpeedPair::new(20, 58),
            stop_hold: Duration::from_millis(100),
            settle: Duration::from_millis(25),
            turn_duration: Duration::from_micros(262_500),
            avoidance: AvoidanceStrategy::Dodge,
            dodge_exit: DodgeExit::Both,
            recovery_limit: None,
        }
    }
}

impl NavigationPolicy {
    pub fn validate(&self) -> Result<(), CorridorError> {
        if self.stop_threshold > self.dodge_threshold {
            return Err(CorridorError::InvalidConfig(format!(
                "stop_threshold {} above dodge_threshold {}",
                self.stop_threshold, self.dodge_threshold
            )));
        }
        let pairs = [
            ("stop", self.stop_speeds),
            ("reverse", self.reverse_speeds),
            ("dodge", self.dodge_speeds),
            ("turn", self.turn_speeds),
        ];
        for (name, pair) in pairs {
            if pair.right > MAX_SPEED || pair.left > MAX_SPEED {
                return Err(CorridorError::InvalidConfig(format!(
                    "{name} speeds ({}, {}) above {MAX_SPEED}",
                    pair.right, pair.left
                )));
            }
        }
        Ok(())
    }

    /// `true` once a dodge may end.
    pub fn dodge_cleared(&self, front: Ticks, side: Ticks) -> bool {
        let front_clear = front >= self.dodge_front_exit;
        let side_clear = side >= self.dodge_side_exit;
        match self.dodge_exit {
            DodgeExit::Both => front_clear && side_clear,
            DodgeExit::Either => front_clear || side_clear,
        }
    }
}

/// Pick this iteration's state from the filtered front reading.
///
/// A zero reading means no echo came back and never counts as an obstacle.
pub fn decide(front: Ticks, policy: &NavigationPolicy) -> NavigationState {
    if front != 0 && front < policy.stop_threshold {
        NavigationState::StopRecover
    } else if front != 0 && front < policy.dodge_threshold {
        match policy.avoidance {
            AvoidanceStrategy::Dodge => NavigationState::Dodge,
            AvoidanceStrategy::TimedTurn => NavigationState::Turn,
        }
    } else {
        NavigationState::Forward
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Navigator
// ─────────────────────────────────────────────────────────────────────────────

pub struct Navigator {
    policy: NavigationPolicy,
    correction: CorrectionController,
    state: NavigationState,
    turns: u32,
}

impl Navigator {
    pub fn new(policy: NavigationPolicy, correction: CorrectionController) -> Self {
        Self {
            policy,
            correction,
            state: NavigationState::Forward,
            turns: 0,
        }
    }

    pub fn current_state(&self) -> NavigationState {
        self.state
    }

    /// Timed turns taken so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Run one iteration against the latest filtered readings held by
    /// `ranger`.  Returns the state that was executed.
    ///
    /// # Errors
    ///
    /// - [`CorridorError::RecoveryExhausted`] when a bounded recovery gives
    ///   up; the motors have been set to neutral.
    /// - Any ranging error raised by a recovery ping.
    pub fn step(
        &mut self,
        ranger: &mut Ranger,
        motors: &mut MotorChannel,
    ) -> Result<NavigationState, CorridorError> {
        let front = ranger.reading(SensorId::FRONT);
        let side = ranger.reading(SensorId::SIDE);
        let next = decide(front, &self.policy);
        if next != self.state {
            info!(from = %self.state, to = %next, front, side, "navigation state changed");
        }
        self.state = next;

        match next {
            NavigationState::Forward => {
                self.correction.correct(side, motors);
            }
            NavigationState::StopRecover => self.stop_and_recover(ranger, motors)?,
            NavigationState::Dodge => self.dodge(ranger, motors)?,
            NavigationState::Turn => self.timed_turn(ranger, motors),
        }
        Ok(next)
    }

    fn stop_and_recover(
        &self,
        ranger: &mut Ranger,
        motors: &mut MotorChannel,
    ) -> Result<(), CorridorError> {
        motors.drive(self.policy.stop_speeds);
        ranger.wait(self.policy.stop_hold);
        motors.drive(self.policy.reverse_speeds);

        let mut guard = RecoveryGuard::new(self.policy.recovery_limit);
        loop {
            let front = ranger.ping(SensorId::FRONT)?;
            ranger.wait(self.policy.settle);
            if front >= self.policy.recover_threshold {
                debug!(front, rounds = guard.attempts() + 1, "front clear");
                return Ok(());
            }
            if guard.record_attempt() {
                return Err(Self::give_up(motors, NavigationState::StopRecover, &guard));
            }
        }
    }

    fn dodge(&self, ranger: &mut Ranger, motors: &mut MotorChannel) -> Result<(), CorridorError> {
        motors.drive(self.policy.dodge_speeds);

        let mut guard = RecoveryGuard::new(self.policy.recovery_limit);
        loop {
            let front = ranger.ping(SensorId::FRONT)?;
            ranger.wait(self.policy.settle);
            let side = ranger.ping(SensorId::SIDE)?;
            ranger.wait(self.policy.settle);
            if self.policy.dodge_cleared(front, side) {
                debug!(front, side, rounds = guard.attempts() + 1, "dodge clear");
                return Ok(());
            }
            if guard.record_attempt() {
                return Err(Self::give_up(motors, NavigationState::Dodge, &guard));
            }
        }
    }

    fn timed_turn(&mut self, ranger: &mut Ranger, motors: &mut MotorChannel) {
        motors.drive(self.policy.turn_speeds);
        ranger.wait(self.policy.turn_duration);
        self.turns += 1;
    }

    fn give_up(
        motors: &mut MotorChannel,
        state: NavigationState,
        guard: &RecoveryGuard,
    ) -> CorridorError {
        motors.drive(SpeedPair::NEUTRAL);
        CorridorError::RecoveryExhausted {
            state,
            attempts: guard.attempts(),
        }
    }
}
