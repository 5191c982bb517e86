// Validation/transition functions for the relay, motor and HV controllers.
// They compute the next state without touching hardware; the dispatcher
// drives the pins and commits the result.

use super::{HvState, MotorState, RELAY_CHANNELS, RelayBank};
use crate::error::ErrorKind;
use crate::proto::MotorDirection;

pub fn set_channel(bank: RelayBank, channel: u8, on: bool) -> Result<RelayBank, ErrorKind> {
    let ch = channel as usize;
    if ch >= RELAY_CHANNELS {
        return Err(ErrorKind::OutOfRange);
    }
    Ok(bank.with(ch, on))
}

pub fn open_all() -> RelayBank {
    RelayBank::default()
}

/// Out-of-range speeds are refused, never clamped.
pub fn set_motion(
    direction: MotorDirection,
    speed: u8,
    speed_max: u8,
) -> Result<MotorState, ErrorKind> {
    if speed > speed_max {
        return Err(ErrorKind::OutOfRange);
    }
    Ok(MotorState { direction, speed })
}

pub fn set_enabled(enabled: bool) -> HvState {
    HvState { enabled }
}
