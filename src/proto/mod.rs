pub mod codec;
pub mod message;
pub mod order;

pub use codec::{DecodeError, FrameDecoder, decode, encode};
pub use message::{Message, MotorDirection, Snapshot};
pub use order::Order;
