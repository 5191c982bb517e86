// src/proto/codec.rs
use std::time::{Duration, Instant};

use thiserror::Error;

use super::message::{Message, MotorDirection, Snapshot};
use super::order::Order;
use crate::error::ErrorKind;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no bytes")]
    Empty,
    #[error("unknown order byte: {0}")]
    UnknownOrder(u8),
    #[error("{order:?} needs {need} payload bytes, got {got}")]
    Truncated {
        order: Order,
        need: usize,
        got: usize,
    },
    #[error("{order:?}: invalid flag byte {byte}")]
    BadFlag { order: Order, byte: u8 },
    #[error("unknown error code: {0}")]
    BadErrorCode(i16),
}

impl DecodeError {
    /// What the board reports back for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::UnknownOrder(_) => ErrorKind::UnknownOrder,
            DecodeError::Empty | DecodeError::Truncated { .. } => ErrorKind::Truncated,
            DecodeError::BadFlag { .. } | DecodeError::BadErrorCode(_) => ErrorKind::OutOfRange,
        }
    }

    /// The order of a complete frame whose payload failed validation.
    ///
    /// `None` when the frame never got that far (unknown or short).
    pub fn payload_order(&self) -> Option<Order> {
        match *self {
            DecodeError::BadFlag { order, .. } => Some(order),
            DecodeError::BadErrorCode(_) => Some(Order::Error),
            DecodeError::Empty | DecodeError::UnknownOrder(_) | DecodeError::Truncated { .. } => None,
        }
    }
}

/// Public API: decode the frame at the start of `bytes`.
///
/// Bytes past the end of the frame are left alone; they belong to the next one.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    decode_frame(bytes).map(|(msg, _)| msg)
}

/// Like [`decode`] but also returns how many bytes the frame occupied.
pub fn decode_frame(bytes: &[u8]) -> Result<(Message, usize), DecodeError> {
    let (&first, rest) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let order = Order::from_byte(first).ok_or(DecodeError::UnknownOrder(first))?;
    let need = order.payload_len();
    if rest.len() < need {
        return Err(DecodeError::Truncated {
            order,
            need,
            got: rest.len(),
        });
    }
    let p = &rest[..need];

    let msg = match order {
        Order::Hello => Message::Hello,
        Order::AlreadyConnected => Message::AlreadyConnected,
        Order::Motor => Message::Motor {
            direction: MotorDirection::from_forward(flag(order, p[0])?),
            speed: p[1],
        },
        Order::Relay => Message::Relay {
            channel: p[0],
            on: flag(order, p[1])?,
        },
        Order::HvSet => Message::HvSet {
            enabled: flag(order, p[0])?,
        },
        Order::OpenRelays => Message::OpenRelays,
        Order::Error => {
            let code = i16::from_le_bytes([p[0], p[1]]);
            Message::Error(ErrorKind::from_code(code).ok_or(DecodeError::BadErrorCode(code))?)
        }
        Order::Received => Message::Received,
        Order::ReadyRelay => Message::ReadyRelay { channel: p[0] },
        Order::Stop => Message::Stop,
        Order::StartTest => Message::StartTest,
        Order::PauseTest => Message::PauseTest,
        Order::DataUpdate => Message::DataUpdate(Snapshot {
            direction: MotorDirection::from_forward(flag(order, p[0])?),
            speed: p[1],
            relays: p[2],
            hv_enabled: flag(order, p[3])?,
        }),
        Order::HvUpdated => Message::HvUpdated {
            enabled: flag(order, p[0])?,
        },
    };
    Ok((msg, 1 + need))
}

/// Public API: serialize one message.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + msg.order().payload_len());
    encode_into(msg, &mut out);
    out
}

/// Append the encoding of `msg` to `out`.
pub fn encode_into(msg: &Message, out: &mut Vec<u8>) {
    out.push(msg.order().byte());
    match *msg {
        Message::Hello
        | Message::AlreadyConnected
        | Message::OpenRelays
        | Message::Received
        | Message::Stop
        | Message::StartTest
        | Message::PauseTest => {}
        Message::Motor { direction, speed } => {
            out.push(direction.is_forward() as u8);
            out.push(speed);
        }
        Message::Relay { channel, on } => {
            out.push(channel);
            out.push(on as u8);
        }
        Message::HvSet { enabled } | Message::HvUpdated { enabled } => out.push(enabled as u8),
        Message::Error(kind) => out.extend_from_slice(&kind.code().to_le_bytes()),
        Message::ReadyRelay { channel } => out.push(channel),
        Message::DataUpdate(s) => {
            out.push(s.direction.is_forward() as u8);
            out.push(s.speed);
            out.push(s.relays);
            out.push(s.hv_enabled as u8);
        }
    }
}

/* ---------- stream framing ---------- */

/// Splits a byte stream into frames.
///
/// The link carries no delimiters, so a frame that stops arriving halfway is
/// only detected by silence: [`FrameDecoder::expire`] flushes it as truncated
/// and the next byte is treated as a fresh discriminant.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    last_rx: Option<Instant>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8], now: Instant) {
        if bytes.is_empty() {
            return;
        }
        self.buf.extend_from_slice(bytes);
        self.last_rx = Some(now);
    }

    /// Next complete frame, or `None` when more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Result<Message, DecodeError>> {
        if self.buf.is_empty() {
            return None;
        }
        match decode_frame(&self.buf) {
            Ok((msg, used)) => {
                self.buf.drain(..used);
                Some(Ok(msg))
            }
            Err(DecodeError::Truncated { .. }) | Err(DecodeError::Empty) => None,
            Err(e @ DecodeError::UnknownOrder(_)) => {
                self.buf.drain(..1);
                Some(Err(e))
            }
            Err(e @ DecodeError::BadFlag { order, .. }) => {
                self.buf.drain(..1 + order.payload_len());
                Some(Err(e))
            }
            Err(e @ DecodeError::BadErrorCode(_)) => {
                self.buf.drain(..1 + Order::Error.payload_len());
                Some(Err(e))
            }
        }
    }

    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Drop a partial frame that has been silent for longer than `timeout`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Option<DecodeError> {
        let last = self.last_rx?;
        if self.buf.is_empty() || now.saturating_duration_since(last) < timeout {
            return None;
        }
        let err = match decode_frame(&self.buf) {
            Err(e) => e,
            // a complete frame is never left behind by next_frame
            Ok(_) => return None,
        };
        self.buf.clear();
        Some(err)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.last_rx = None;
    }
}

/* ---------- helpers ---------- */

fn flag(order: Order, byte: u8) -> Result<bool, DecodeError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::BadFlag { order, byte }),
    }
}

/* ---------- tests ---------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_motor() {
        let msg = decode(&[1, 1, 42]).unwrap();
        assert_eq!(
            msg,
            Message::Motor {
                direction: MotorDirection::Forward,
                speed: 42
            }
        );
    }

    #[test]
    fn decode_relay_off() {
        let msg = decode(&[2, 7, 0]).unwrap();
        assert_eq!(msg, Message::Relay { channel: 7, on: false });
    }

    #[test]
    fn decode_error_payload_is_little_endian() {
        let msg = decode(&[4, 6, 0]).unwrap();
        assert_eq!(msg, Message::Error(ErrorKind::InvalidTransition));
        assert_eq!(encode(&msg), vec![4, 6, 0]);
    }

    #[test]
    fn decode_leaves_trailing_bytes() {
        let (msg, used) = decode_frame(&[7, 1, 0, 9]).unwrap();
        assert_eq!(msg, Message::HvSet { enabled: true });
        assert_eq!(used, 2);
    }

    #[test]
    fn decode_errors() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
        assert_eq!(decode(&[200]), Err(DecodeError::UnknownOrder(200)));
        assert_eq!(
            decode(&[1, 1]),
            Err(DecodeError::Truncated {
                order: Order::Motor,
                need: 2,
                got: 1
            })
        );
        assert_eq!(
            decode(&[7, 2]),
            Err(DecodeError::BadFlag {
                order: Order::HvSet,
                byte: 2
            })
        );
        assert_eq!(decode(&[4, 99, 0]), Err(DecodeError::BadErrorCode(99)));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(DecodeError::UnknownOrder(99).kind(), ErrorKind::UnknownOrder);
        assert_eq!(DecodeError::Empty.kind(), ErrorKind::Truncated);
        assert_eq!(
            DecodeError::BadFlag {
                order: Order::Relay,
                byte: 5
            }
            .kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn payload_order_names_complete_frames_only() {
        assert_eq!(decode(&[2, 0, 2]).unwrap_err().payload_order(), Some(Order::Relay));
        assert_eq!(decode(&[4, 99, 0]).unwrap_err().payload_order(), Some(Order::Error));
        assert_eq!(decode(&[2, 0]).unwrap_err().payload_order(), None);
        assert_eq!(decode(&[200]).unwrap_err().payload_order(), None);
    }

    #[test]
    fn encode_data_update() {
        let msg = Message::DataUpdate(Snapshot {
            direction: MotorDirection::Backward,
            speed: 100,
            relays: 0b1000_0001,
            hv_enabled: true,
        });
        assert_eq!(encode(&msg), vec![11, 0, 100, 0x81, 1]);
    }

    #[test]
    fn frame_decoder_splits_stream() {
        let now = Instant::now();
        let mut dec = FrameDecoder::new();
        dec.push(&[0, 9, 2, 3], now);
        assert_eq!(dec.next_frame(), Some(Ok(Message::Hello)));
        assert_eq!(dec.next_frame(), Some(Ok(Message::StartTest)));
        // RELAY needs one more byte
        assert_eq!(dec.next_frame(), None);
        dec.push(&[1], now);
        assert_eq!(
            dec.next_frame(),
            Some(Ok(Message::Relay { channel: 3, on: true }))
        );
        assert_eq!(dec.next_frame(), None);
        assert!(!dec.has_partial());
    }

    #[test]
    fn frame_decoder_skips_one_unknown_byte() {
        let now = Instant::now();
        let mut dec = FrameDecoder::new();
        dec.push(&[0xEE, 6], now);
        assert_eq!(dec.next_frame(), Some(Err(DecodeError::UnknownOrder(0xEE))));
        assert_eq!(dec.next_frame(), Some(Ok(Message::Stop)));
    }

    #[test]
    fn frame_decoder_drops_whole_bad_frame() {
        let now = Instant::now();
        let mut dec = FrameDecoder::new();
        dec.push(&[2, 1, 9, 5], now);
        assert!(matches!(
            dec.next_frame(),
            Some(Err(DecodeError::BadFlag { .. }))
        ));
        assert_eq!(dec.next_frame(), Some(Ok(Message::Received)));
    }

    #[test]
    fn frame_decoder_expires_partial_frame() {
        let t0 = Instant::now();
        let timeout = Duration::from_millis(50);
        let mut dec = FrameDecoder::new();
        dec.push(&[1, 1], t0);
        assert_eq!(dec.next_frame(), None);
        assert_eq!(dec.expire(t0 + Duration::from_millis(10), timeout), None);
        assert!(matches!(
            dec.expire(t0 + timeout, timeout),
            Some(DecodeError::Truncated {
                order: Order::Motor,
                ..
            })
        ));
        assert!(!dec.has_partial());
        // next frame starts clean
        dec.push(&[0], t0 + timeout);
        assert_eq!(dec.next_frame(), Some(Ok(Message::Hello)));
    }
}
