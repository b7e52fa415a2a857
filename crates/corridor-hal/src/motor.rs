//! [`MotorChannel`] – one-byte serial protocol of the dual motor driver.
//!
//! Each command is a single byte.  Motor 0 (right) accepts `0..=127` and
//! motor 1 (left) the same range shifted by 128.  64 is neutral for either
//! motor; lower values drive forward, higher values reverse.  A lone `0x00`
//! byte shuts both motors down and is sent once at power-up.

use corridor_types::{
    CorridorError, MAX_SPEED, MotorCommand, MotorSelector, NEUTRAL_SPEED, SpeedPair,
};
use tracing::warn;

/// Byte that stops both motors at once.
pub const ALL_STOP_BYTE: u8 = 0x00;

/// Byte-level transmit side of the serial link to the motor driver.
pub trait MotorLink: Send {
    /// `true` once the transmit buffer can take another byte.
    fn is_ready(&self) -> bool;

    /// Put one byte on the wire.  Only called after [`MotorLink::is_ready`].
    fn write_byte(&mut self, byte: u8);
}

/// Encodes motor commands onto a [`MotorLink`] and remembers the last speed
/// sent to each motor.
pub struct MotorChannel {
    link: Box<dyn MotorLink>,
    last: [Option<u8>; 2],
}

impl MotorChannel {
    pub fn new(link: Box<dyn MotorLink>) -> Self {
        Self {
            link,
            last: [None; 2],
        }
    }

    /// Send `speed` to motor number `selector`, blocking until the link is
    /// ready.
    ///
    /// # Errors
    ///
    /// - [`CorridorError::InvalidMotorSelector`] for selectors other than 0
    ///   and 1.
    /// - [`CorridorError::SpeedOutOfRange`] for speeds above 127.
    ///
    /// Nothing is transmitted on error.
    pub fn send_raw(&mut self, selector: u8, speed: u8) -> Result<(), CorridorError> {
        let motor =
            MotorSelector::from_raw(selector).ok_or(CorridorError::InvalidMotorSelector(selector))?;
        if speed > MAX_SPEED {
            return Err(CorridorError::SpeedOutOfRange(speed));
        }
        let byte = match motor {
            MotorSelector::Right => speed,
            MotorSelector::Left => speed + 128,
        };
        self.transmit(byte);
        self.last[motor.raw() as usize] = Some(speed);
        Ok(())
    }

    pub fn send(&mut self, command: MotorCommand) -> Result<(), CorridorError> {
        self.send_raw(command.selector.raw(), command.speed)
    }

    /// Send both speeds, right motor first.
    pub fn drive(&mut self, speeds: SpeedPair) {
        for command in speeds.commands() {
            // Known defect: a rejected command is logged and dropped; callers
            // never learn that a motor kept its old speed.
            if let Err(e) = self.send(command) {
                warn!(error = %e, ?command, "motor command dropped");
            }
        }
    }

    /// Shut both motors down with the single all-stop byte.
    pub fn all_stop(&mut self) {
        self.transmit(ALL_STOP_BYTE);
        self.last = [Some(NEUTRAL_SPEED); 2];
    }

    /// Last speeds sent to the two motors, once both have been commanded.
    pub fn last_speeds(&self) -> Option<SpeedPair> {
        match self.last {
            [Some(right), Some(left)] => Some(SpeedPair { right, left }),
            _ => None,
        }
    }

    fn transmit(&mut self, byte: u8) {
        while !self.link.is_ready() {
            std::hint::spin_loop();
        }
        self.link.write_byte(byte);
    }
}
