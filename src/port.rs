use anyhow::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::time::Duration;

use crate::cli::SerialOpts;

/// Short read timeout so the loops get a chance to run timers between bytes.
pub const READ_TIMEOUT: Duration = Duration::from_millis(20);

pub fn open_port(opts: &SerialOpts, default_baud: u32) -> Result<Box<dyn SerialPort>> {
    let baud = opts.baud.unwrap_or(default_baud);
    let builder = serialport::new(&opts.dev, baud)
        .timeout(READ_TIMEOUT)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(if opts.rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        });

    builder
        .open()
        .map_err(|e| anyhow::anyhow!("open {} @ {}: {}", opts.dev, baud, e))
}

/// Timeouts are how an idle serial port reads; they are not failures.
pub fn is_idle(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
    )
}
