//! Seam to the pin-level hardware driver.
//!
//! The protocol core decides *what* state the actuators should be in; a
//! `HardwareDriver` turns that into pin levels and step pulses.

use tracing::debug;

use crate::board::{MotorState, RELAY_CHANNELS};
use crate::config::BoardConfig;

pub trait HardwareDriver {
    /// Drive one relay channel. Returns true once the channel is confirmed
    /// settled in the requested state.
    fn set_relay(&mut self, channel: usize, on: bool) -> bool;

    fn set_motion(&mut self, motor: MotorState);

    fn set_hv(&mut self, enabled: bool);
}

/// Driver for running the board without real pins: logs every output
/// change against the configured pin map.
#[derive(Debug, Clone)]
pub struct LoggingDriver {
    direction_pin: u8,
    step_pin: u8,
    hv_pin: u8,
    relay_pins: [u8; RELAY_CHANNELS],
}

impl LoggingDriver {
    pub fn new(cfg: &BoardConfig) -> Self {
        Self {
            direction_pin: cfg.direction_pin,
            step_pin: cfg.step_pin,
            hv_pin: cfg.hv_pin,
            relay_pins: cfg.relay_pins,
        }
    }
}

impl HardwareDriver for LoggingDriver {
    fn set_relay(&mut self, channel: usize, on: bool) -> bool {
        let Some(&pin) = self.relay_pins.get(channel) else {
            return false;
        };
        debug!(channel, pin, level = on, "relay");
        true
    }

    fn set_motion(&mut self, motor: MotorState) {
        debug!(
            dir_pin = self.direction_pin,
            dir_level = motor.direction.is_forward(),
            step_pin = self.step_pin,
            speed = motor.speed,
            "motor"
        );
    }

    fn set_hv(&mut self, enabled: bool) {
        debug!(pin = self.hv_pin, level = enabled, "hv");
    }
}
