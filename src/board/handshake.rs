use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloOutcome {
    /// First HELLO of the session, answered with RECEIVED.
    Established,
    /// Retry from a host that missed the first reply, answered with ALREADY_CONNECTED.
    AlreadyConnected,
}

/// The one logical host/board session.
///
/// There is no disconnect order. The session only ends when the link layer
/// reports a reset, see [`Session::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    connected: bool,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn hello(&mut self) -> HelloOutcome {
        if self.connected {
            HelloOutcome::AlreadyConnected
        } else {
            self.connected = true;
            info!("session established");
            HelloOutcome::Established
        }
    }

    pub fn reset(&mut self) {
        if self.connected {
            info!("session reset");
        }
        self.connected = false;
    }
}
