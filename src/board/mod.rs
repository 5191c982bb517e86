//! Board state owned by the slave.
//!
//! One aggregate, mutated only by the dispatcher. The host never holds an
//! authoritative copy; it sees whatever the last DATA_UPDATE/HV_UPDATED said.

pub mod actuators;
pub mod handshake;
pub mod sequencer;

use crate::proto::{MotorDirection, Snapshot};

pub const RELAY_CHANNELS: usize = 8;

/// Eight independently addressable relay channels, all open at power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayBank {
    channels: [bool; RELAY_CHANNELS],
}

impl RelayBank {
    pub fn get(&self, channel: usize) -> Option<bool> {
        self.channels.get(channel).copied()
    }

    pub fn channels(&self) -> &[bool; RELAY_CHANNELS] {
        &self.channels
    }

    pub fn any_closed(&self) -> bool {
        self.channels.iter().any(|&on| on)
    }

    /// Bit i set when channel i is closed.
    pub fn mask(&self) -> u8 {
        self.channels
            .iter()
            .enumerate()
            .fold(0u8, |m, (i, &on)| if on { m | (1 << i) } else { m })
    }

    pub(crate) fn with(mut self, channel: usize, on: bool) -> Self {
        self.channels[channel] = on;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorState {
    pub direction: MotorDirection,
    pub speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HvState {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardState {
    pub relays: RelayBank,
    pub motor: MotorState,
    pub hv: HvState,
}

impl BoardState {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            direction: self.motor.direction,
            speed: self.motor.speed,
            relays: self.relays.mask(),
            hv_enabled: self.hv.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_up_state_is_safe() {
        let b = BoardState::default();
        assert!(!b.relays.any_closed());
        assert_eq!(b.motor.speed, 0);
        assert!(!b.hv.enabled);
    }

    #[test]
    fn relay_mask_tracks_channels() {
        let bank = RelayBank::default().with(0, true).with(7, true);
        assert_eq!(bank.mask(), 0b1000_0001);
        assert_eq!(bank.get(7), Some(true));
        assert_eq!(bank.get(8), None);
    }

    #[test]
    fn snapshot_reflects_state() {
        let b = BoardState {
            relays: RelayBank::default().with(2, true),
            motor: MotorState {
                direction: MotorDirection::Backward,
                speed: 30,
            },
            hv: HvState { enabled: true },
        };
        let s = b.snapshot();
        assert_eq!(s.relays, 0b100);
        assert_eq!(s.speed, 30);
        assert_eq!(s.direction, MotorDirection::Backward);
        assert!(s.hv_enabled);
    }
}
