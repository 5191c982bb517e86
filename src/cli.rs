use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{Args, Parser, Subcommand};

use crate::proto::{Message, MotorDirection};

#[derive(Parser, Debug, Clone)]
#[command(name = "relay-rig", about = "Relay/motor/HV test rig serial protocol (board + host)")]
pub struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Run the board side of the protocol on a serial port
    Slave(SlaveOpts),
    /// Handshake with a board and send orders
    Host(HostOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path
    #[arg(long, default_value = "/dev/ttyS0")]
    pub dev: String,
    /// Baud rate (defaults to the board config, 115200)
    #[arg(long)]
    pub baud: Option<u32>,
    /// Enable RTS/CTS
    #[arg(long, default_value_t = false)]
    pub rtscts: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SlaveOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Board config (TOML); built-in defaults otherwise
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Echo every accepted message back after its reply
    #[arg(long, default_value_t = false)]
    pub debug_echo: bool,
    /// DATA_UPDATE period in ms while a test runs (0 = off)
    #[arg(long)]
    pub telemetry_ms: Option<u64>,
    /// Drop the session after this many ms without input (0 = never)
    #[arg(long)]
    pub inactive_timeout_ms: Option<u64>,
    /// Stats log interval in seconds (0 = off)
    #[arg(long, default_value_t = 10.0)]
    pub stats: f64,
}

#[derive(Args, Debug, Clone)]
pub struct HostOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// First HELLO retry interval in ms
    #[arg(long, default_value_t = 200)]
    pub initial_ms: u64,
    /// Upper bound for the HELLO retry interval in ms
    #[arg(long, default_value_t = 2000)]
    pub max_ms: u64,
    /// Give up the handshake after this many HELLOs (0 = keep trying)
    #[arg(long, default_value_t = 10)]
    pub attempts: u32,
    /// How long to wait for each acknowledgement in ms
    #[arg(long, default_value_t = 1000)]
    pub reply_ms: u64,
    /// Orders to send in sequence, e.g. `relay:3:on motor:fwd:50 hv:on start pause stop open`
    pub orders: Vec<String>,
}

/// Parse one `host` order argument.
pub fn parse_order(arg: &str) -> anyhow::Result<Message> {
    let parts: Vec<&str> = arg.split(':').collect();
    let msg = match parts.as_slice() {
        ["hello"] => Message::Hello,
        ["start"] => Message::StartTest,
        ["pause"] => Message::PauseTest,
        ["stop"] => Message::Stop,
        ["open"] => Message::OpenRelays,
        ["hv", state] => Message::HvSet {
            enabled: parse_switch(state)?,
        },
        ["relay", ch, state] => Message::Relay {
            channel: ch
                .parse()
                .map_err(|_| anyhow!("relay channel must be 0..=255, got {ch}"))?,
            on: parse_switch(state)?,
        },
        ["motor", dir, speed] => Message::Motor {
            direction: match dir.to_ascii_lowercase().as_str() {
                "fwd" | "forward" => MotorDirection::Forward,
                "back" | "backward" => MotorDirection::Backward,
                _ => bail!("motor direction must be fwd or back, got {dir}"),
            },
            speed: speed
                .parse()
                .map_err(|_| anyhow!("motor speed must be 0..=255, got {speed}"))?,
        },
        _ => bail!("unrecognised order {arg:?}"),
    };
    Ok(msg)
}

fn parse_switch(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => bail!("expected on/off, got {s:?}"),
    }
}
