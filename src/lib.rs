//! Serial order protocol between a test-rig host and the board driving its
//! stepper motor, eight relay channels and HV enable line.

pub mod board;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod host;
pub mod port;
pub mod proto;
pub mod slave;
pub mod stats;

pub use config::BoardConfig;
pub use dispatch::{Dispatcher, Outbound};
pub use error::ErrorKind;
