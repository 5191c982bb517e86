/// One-byte order codes shared by host and board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Order {
    // ---- Session ----
    Hello = 0,
    AlreadyConnected = 3,

    // ---- Actuators ----
    Motor = 1,
    Relay = 2,
    HvSet = 7,
    OpenRelays = 13,

    // ---- Acknowledgement ----
    Error = 4,
    Received = 5,
    ReadyRelay = 8,

    // ---- Test sequencing ----
    Stop = 6,
    StartTest = 9,
    PauseTest = 10,

    // ---- Telemetry ----
    DataUpdate = 11,
    HvUpdated = 12,
}

impl Order {
    pub const ALL: [Order; 14] = [
        Order::Hello,
        Order::Motor,
        Order::Relay,
        Order::AlreadyConnected,
        Order::Error,
        Order::Received,
        Order::Stop,
        Order::HvSet,
        Order::ReadyRelay,
        Order::StartTest,
        Order::PauseTest,
        Order::DataUpdate,
        Order::HvUpdated,
        Order::OpenRelays,
    ];

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.byte() == b)
    }

    /// Number of payload bytes that follow the discriminant on the wire.
    pub fn payload_len(self) -> usize {
        match self {
            Order::Hello
            | Order::AlreadyConnected
            | Order::Received
            | Order::Stop
            | Order::StartTest
            | Order::PauseTest
            | Order::OpenRelays => 0,
            Order::HvSet | Order::HvUpdated | Order::ReadyRelay => 1,
            Order::Motor | Order::Relay | Order::Error => 2,
            Order::DataUpdate => 4,
        }
    }

    /// Orders only the board may send. Receiving one is a protocol error.
    pub fn is_outbound_only(self) -> bool {
        matches!(
            self,
            Order::AlreadyConnected
                | Order::Error
                | Order::Received
                | Order::ReadyRelay
                | Order::DataUpdate
                | Order::HvUpdated
        )
    }
}

impl TryFrom<u8> for Order {
    type Error = u8;

    fn try_from(b: u8) -> Result<Self, u8> {
        Order::from_byte(b).ok_or(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_match_firmware_table() {
        let expected: [(Order, u8); 14] = [
            (Order::Hello, 0),
            (Order::Motor, 1),
            (Order::Relay, 2),
            (Order::AlreadyConnected, 3),
            (Order::Error, 4),
            (Order::Received, 5),
            (Order::Stop, 6),
            (Order::HvSet, 7),
            (Order::ReadyRelay, 8),
            (Order::StartTest, 9),
            (Order::PauseTest, 10),
            (Order::DataUpdate, 11),
            (Order::HvUpdated, 12),
            (Order::OpenRelays, 13),
        ];
        for (order, byte) in expected {
            assert_eq!(order.byte(), byte);
            assert_eq!(Order::try_from(byte), Ok(order));
        }
    }

    #[test]
    fn unknown_bytes_do_not_map() {
        for b in 14..=u8::MAX {
            assert_eq!(Order::from_byte(b), None);
        }
    }

    #[test]
    fn inbound_commands_are_not_outbound_only() {
        for o in [
            Order::Hello,
            Order::Motor,
            Order::Relay,
            Order::HvSet,
            Order::OpenRelays,
            Order::Stop,
            Order::StartTest,
            Order::PauseTest,
        ] {
            assert!(!o.is_outbound_only(), "{o:?}");
        }
    }
}
