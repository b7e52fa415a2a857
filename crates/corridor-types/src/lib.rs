use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A capture-timer count, or an elapsed number of timer ticks.
pub type Ticks = u32;

/// Number of hardware capture channels wired to echo inputs.
pub const MAX_CHANNELS: usize = 3;

/// Motor speed byte that holds a motor still.
pub const NEUTRAL_SPEED: u8 = 64;

/// Largest speed value a single motor accepts.
pub const MAX_SPEED: u8 = 127;

/// Index of an ultrasonic sensor and of its capture channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorId(pub usize);

impl SensorId {
    /// Forward-facing ranger, used for stop and dodge decisions.
    pub const FRONT: SensorId = SensorId(0);
    /// Wall-facing ranger on the left flank, used for wall following.
    pub const SIDE: SensorId = SensorId(1);

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SensorId::FRONT => write!(f, "front"),
            SensorId::SIDE => write!(f, "side"),
            SensorId(n) => write!(f, "sensor{n}"),
        }
    }
}

/// The echo edge a capture channel expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgePhase {
    Rising,
    Falling,
}

impl EdgePhase {
    pub fn flipped(self) -> Self {
        match self {
            EdgePhase::Rising => EdgePhase::Falling,
            EdgePhase::Falling => EdgePhase::Rising,
        }
    }
}

/// Which motor of the differential drive a command addresses.
///
/// The discriminant is the selector number on the serial link: motor 0 is
/// sent as the plain speed byte, motor 1 as `speed + 128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorSelector {
    Right = 0,
    Left = 1,
}

impl MotorSelector {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(MotorSelector::Right),
            1 => Some(MotorSelector::Left),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// A single speed command for one motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub selector: MotorSelector,
    /// `0..=127`; 64 is neutral.
    pub speed: u8,
}

/// Speeds for both motors, always sent right first, then left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedPair {
    pub right: u8,
    pub left: u8,
}

impl SpeedPair {
    pub const NEUTRAL: SpeedPair = SpeedPair {
        right: NEUTRAL_SPEED,
        left: NEUTRAL_SPEED,
    };

    pub const fn new(right: u8, left: u8) -> Self {
        Self { right, left }
    }

    /// The two commands in transmission order.
    pub fn commands(self) -> [MotorCommand; 2] {
        [
            MotorCommand {
                selector: MotorSelector::Right,
                speed: self.right,
            },
            MotorCommand {
                selector: MotorSelector::Left,
                speed: self.left,
            },
        ]
    }
}

/// Behaviour chosen by the navigation state machine for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationState {
    /// Wall following through the correction table.
    Forward,
    /// Legacy fixed-duration, sensor-blind turn.
    Turn,
    /// Stop, back up, and wait for the front to clear.
    StopRecover,
    /// Swerve away from an obstacle until front and side clear.
    Dodge,
}

impl std::fmt::Display for NavigationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationState::Forward => write!(f, "forward"),
            NavigationState::Turn => write!(f, "turn"),
            NavigationState::StopRecover => write!(f, "stop_recover"),
            NavigationState::Dodge => write!(f, "dodge"),
        }
    }
}

/// Per-iteration snapshot of the control loop, for logs and telemetry output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub iteration: u64,
    /// Sensor pinged at the start of this iteration.
    pub pinged: SensorId,
    pub state: NavigationState,
    pub front: Ticks,
    pub side: Ticks,
    /// Last speeds written to the motors, if any were written yet.
    pub speeds: Option<SpeedPair>,
}

/// Workspace-wide error type covering capture, actuator, recovery, and
/// configuration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorridorError {
    #[error("Unknown capture channel {0}")]
    UnknownChannel(usize),

    #[error("Invalid motor selector {0}: expected 0 or 1")]
    InvalidMotorSelector(u8),

    #[error("Motor speed {0} out of range 0..=127")]
    SpeedOutOfRange(u8),

    #[error("Recovery from {state} gave up after {attempts} attempts")]
    RecoveryExhausted {
        state: NavigationState,
        attempts: u32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_selector_from_raw() {
        assert_eq!(MotorSelector::from_raw(0), Some(MotorSelector::Right));
        assert_eq!(MotorSelector::from_raw(1), Some(MotorSelector::Left));
        assert_eq!(MotorSelector::from_raw(2), None);
        assert_eq!(MotorSelector::Left.raw(), 1);
    }

    #[test]
    fn speed_pair_commands_are_right_then_left() {
        let cmds = SpeedPair::new(45, 35).commands();
        assert_eq!(cmds[0].selector, MotorSelector::Right);
        assert_eq!(cmds[0].speed, 45);
        assert_eq!(cmds[1].selector, MotorSelector::Left);
        assert_eq!(cmds[1].speed, 35);
    }

    #[test]
    fn edge_phase_flips() {
        assert_eq!(EdgePhase::Rising.flipped(), EdgePhase::Falling);
        assert_eq!(EdgePhase::Falling.flipped(), EdgePhase::Rising);
    }

    #[test]
    fn sensor_display_names() {
        assert_eq!(SensorId::FRONT.to_string(), "front");
        assert_eq!(SensorId::SIDE.to_string(), "side");
        assert_eq!(SensorId(2).to_string(), "sensor2");
    }

    #[test]
    fn navigation_state_serializes_snake_case() {
        let json = serde_json::to_string(&NavigationState::StopRecover).unwrap();
        assert_eq!(json, "\"stop_recover\"");
    }

    #[test]
    fn cycle_report_serializes() {
        let report = CycleReport {
            timestamp: Utc::now(),
            iteration: 7,
            pinged: SensorId::SIDE,
            state: NavigationState::Forward,
            front: 9000,
            side: 2400,
            speeds: Some(SpeedPair::new(40, 40)),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"forward\""));
        let back: CycleReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.side, 2400);
        assert_eq!(back.speeds, Some(SpeedPair::new(40, 40)));
    }

    #[test]
    fn corridor_error_display() {
        let err = CorridorError::InvalidMotorSelector(7);
        assert!(err.to_string().contains("selector 7"));

        let err = CorridorError::RecoveryExhausted {
            state: NavigationState::Dodge,
            attempts: 12,
        };
        assert!(err.to_string().contains("dodge"));
        assert!(err.to_string().contains("12"));
    }
}
