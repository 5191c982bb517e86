use super::order::Order;
use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotorDirection {
    #[default]
    Forward,
    Backward,
}

impl MotorDirection {
    pub fn from_forward(forward: bool) -> Self {
        if forward {
            MotorDirection::Forward
        } else {
            MotorDirection::Backward
        }
    }

    pub fn is_forward(self) -> bool {
        matches!(self, MotorDirection::Forward)
    }
}

/// Board state as reported by DATA_UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub direction: MotorDirection,
    pub speed: u8,
    /// bit i set = relay channel i closed
    pub relays: u8,
    pub hv_enabled: bool,
}

/// A decoded frame: the order plus its statically typed payload.
///
/// Range checks that depend on configuration (speed limit, channel count)
/// happen in the dispatcher, so `speed` and `channel` carry raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    // ---- Session ----
    Hello,
    AlreadyConnected,

    // ---- Actuators ----
    Motor { direction: MotorDirection, speed: u8 },
    Relay { channel: u8, on: bool },
    HvSet { enabled: bool },
    OpenRelays,

    // ---- Acknowledgement ----
    Error(ErrorKind),
    Received,
    ReadyRelay { channel: u8 },

    // ---- Test sequencing ----
    Stop,
    StartTest,
    PauseTest,

    // ---- Telemetry ----
    DataUpdate(Snapshot),
    HvUpdated { enabled: bool },
}

impl Message {
    pub fn order(&self) -> Order {
        match self {
            Message::Hello => Order::Hello,
            Message::AlreadyConnected => Order::AlreadyConnected,
            Message::Motor { .. } => Order::Motor,
            Message::Relay { .. } => Order::Relay,
            Message::HvSet { .. } => Order::HvSet,
            Message::OpenRelays => Order::OpenRelays,
            Message::Error(_) => Order::Error,
            Message::Received => Order::Received,
            Message::ReadyRelay { .. } => Order::ReadyRelay,
            Message::Stop => Order::Stop,
            Message::StartTest => Order::StartTest,
            Message::PauseTest => Order::PauseTest,
            Message::DataUpdate(_) => Order::DataUpdate,
            Message::HvUpdated { .. } => Order::HvUpdated,
        }
    }

    /// Messages that never answer a request: telemetry and relay-settled notices.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            Message::DataUpdate(_) | Message::HvUpdated { .. } | Message::ReadyRelay { .. }
        )
    }
}
