use thiserror::Error;

/// Everything the board can report back in an ERROR reply.
///
/// None of these are fatal: after sending the ERROR the board is ready for
/// the next message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[error("unknown order")]
    UnknownOrder,
    #[error("truncated payload")]
    Truncated,
    #[error("not connected")]
    NotConnected,
    #[error("outbound-only order received inbound")]
    InvalidDirection,
    #[error("payload value out of range")]
    OutOfRange,
    #[error("invalid test state transition")]
    InvalidTransition,
    #[error("test stopped")]
    TestStopped,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::UnknownOrder,
        ErrorKind::Truncated,
        ErrorKind::NotConnected,
        ErrorKind::InvalidDirection,
        ErrorKind::OutOfRange,
        ErrorKind::InvalidTransition,
        ErrorKind::TestStopped,
    ];

    /// Code carried in the ERROR payload.
    pub fn code(self) -> i16 {
        match self {
            ErrorKind::UnknownOrder => 1,
            ErrorKind::Truncated => 2,
            ErrorKind::NotConnected => 3,
            ErrorKind::InvalidDirection => 4,
            ErrorKind::OutOfRange => 5,
            ErrorKind::InvalidTransition => 6,
            ErrorKind::TestStopped => 7,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_invertible() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(-1), None);
    }
}
