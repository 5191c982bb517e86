use std::io::{Read, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::SlaveOpts;
use crate::config::BoardConfig;
use crate::dispatch::{Dispatcher, Outbound};
use crate::driver::{HardwareDriver, LoggingDriver};
use crate::port::{is_idle, open_port};
use crate::proto::codec::encode;
use crate::proto::{FrameDecoder, Message};
use crate::stats::Stats;

pub fn run(opts: SlaveOpts) -> Result<()> {
    let mut config = match &opts.config {
        Some(path) => BoardConfig::load(path)
            .with_context(|| format!("loading board config {}", path.display()))?,
        None => BoardConfig::default(),
    };
    if opts.debug_echo {
        config.debug_echo = true;
    }
    if let Some(ms) = opts.telemetry_ms {
        config.telemetry_interval_ms = ms;
    }
    if let Some(ms) = opts.inactive_timeout_ms {
        config.inactive_timeout_ms = ms;
    }
    if let Some(baud) = opts.ser.baud {
        config.baud = baud;
    }
    config.validate().context("board config")?;
    info!("slave: {:?}", config);

    let mut port = open_port(&opts.ser, config.baud)
        .with_context(|| format!("opening board link on {}", opts.ser.dev))?;
    let driver = LoggingDriver::new(&config);
    let mut dispatcher = Dispatcher::new(config, driver);
    let mut stats = Stats::new();

    info!("awaiting host on {}", opts.ser.dev);
    serve(&mut *port, &mut dispatcher, &mut stats, opts.stats)
}

/// Serve the protocol on one byte stream until it closes or fails.
///
/// Strictly one frame at a time: decode, dispatch, write the whole reply,
/// and only then look at the next frame or a due DATA_UPDATE. This loop is
/// the only writer on the link.
pub fn serve<T, D>(
    link: &mut T,
    dispatcher: &mut Dispatcher<D>,
    stats: &mut Stats,
    stats_interval: f64,
) -> Result<()>
where
    T: Read + Write + ?Sized,
    D: HardwareDriver,
{
    let frame_timeout = dispatcher.config().frame_timeout();
    let inactive_timeout = dispatcher.config().inactive_timeout();
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 256];
    let mut last_rx = Instant::now();

    loop {
        match link.read(&mut buf) {
            Ok(0) => {
                info!("link closed");
                dispatcher.reset_link();
                return Ok(());
            }
            Ok(n) => {
                last_rx = Instant::now();
                decoder.push(&buf[..n], last_rx);
                stats.add_in(n);
            }
            Err(e) if is_idle(&e) => {}
            Err(e) => {
                dispatcher.reset_link();
                return Err(e).context("serial read");
            }
        }

        while let Some(frame) = decoder.next_frame() {
            let out = dispatcher.handle_frame(frame);
            send(link, &out, stats)?;
        }

        let now = Instant::now();
        if let Some(err) = decoder.expire(now, frame_timeout) {
            let out = dispatcher.reject(err);
            send(link, &out, stats)?;
        }

        if let Some(limit) = inactive_timeout
            && dispatcher.session().is_connected()
            && now.saturating_duration_since(last_rx) >= limit
        {
            warn!("no input for {:?}, assuming host gone", limit);
            dispatcher.reset_link();
            decoder.clear();
        }

        if let Some(msg) = dispatcher.poll_telemetry(now) {
            send_telemetry(link, &msg, stats)?;
        }

        stats.maybe_log(stats_interval);
    }
}

fn send<T: Write + ?Sized>(link: &mut T, out: &Outbound, stats: &mut Stats) -> Result<()> {
    debug!("tx {:?}", out);
    let bytes = out.to_bytes();
    link.write_all(&bytes).context("serial write")?;
    link.flush().context("serial flush")?;
    stats.record(out);
    stats.add_out(bytes.len());
    Ok(())
}

fn send_telemetry<T: Write + ?Sized>(link: &mut T, msg: &Message, stats: &mut Stats) -> Result<()> {
    debug!("tx {:?}", msg);
    let bytes = encode(msg);
    link.write_all(&bytes).context("serial write")?;
    link.flush().context("serial flush")?;
    stats.inc_telemetry();
    stats.add_out(bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;
    use crate::driver::testing::RecordingDriver;
    use crate::error::ErrorKind;
    use crate::proto::decode;
    use crate::proto::codec::decode_frame;

    enum Step {
        Data(Vec<u8>),
        Idle,
    }

    /// Scripted link: each read returns the next step, then EOF.
    struct ScriptLink {
        steps: VecDeque<Step>,
        written: Vec<u8>,
    }

    impl ScriptLink {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                written: Vec::new(),
            }
        }

        fn replies(&self) -> Vec<Message> {
            let mut out = Vec::new();
            let mut rest = &self.written[..];
            while !rest.is_empty() {
                let (m, used) = decode_frame(rest).unwrap();
                out.push(m);
                rest = &rest[used..];
            }
            out
        }
    }

    impl Read for ScriptLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Step::Idle) => Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
                Some(Step::Data(d)) => {
                    buf[..d.len()].copy_from_slice(&d);
                    Ok(d.len())
                }
            }
        }
    }

    impl Write for ScriptLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_script(cfg: BoardConfig, steps: Vec<Step>) -> (ScriptLink, Dispatcher<RecordingDriver>) {
        let mut link = ScriptLink::new(steps);
        let mut d = Dispatcher::new(cfg, RecordingDriver::default());
        let mut stats = Stats::new();
        serve(&mut link, &mut d, &mut stats, 0.0).unwrap();
        (link, d)
    }

    fn quiet() -> BoardConfig {
        BoardConfig {
            telemetry_interval_ms: 0,
            ..BoardConfig::default()
        }
    }

    #[test]
    fn one_reply_per_frame_in_order() {
        let (link, _) = run_script(
            quiet(),
            vec![Step::Data(vec![0, 0, 2, 4, 1, 9, 10, 6])],
        );
        assert_eq!(
            link.replies(),
            vec![
                Message::Received,
                Message::AlreadyConnected,
                Message::Received,
                Message::ReadyRelay { channel: 4 },
                Message::Received,
                Message::Received,
                Message::Received,
            ]
        );
    }

    #[test]
    fn frames_split_across_reads() {
        let (link, d) = run_script(
            quiet(),
            vec![Step::Data(vec![0, 1]), Step::Data(vec![0]), Step::Data(vec![77])],
        );
        assert_eq!(
            link.replies(),
            vec![Message::Received, Message::Received]
        );
        assert_eq!(d.board().motor.speed, 77);
        assert!(!d.board().motor.direction.is_forward());
    }

    #[test]
    fn garbage_is_reported_and_skipped() {
        let (link, _) = run_script(quiet(), vec![Step::Data(vec![0, 0xFF, 9])]);
        assert_eq!(
            link.replies(),
            vec![
                Message::Received,
                Message::Error(ErrorKind::UnknownOrder),
                Message::Received,
            ]
        );
    }

    #[test]
    fn stalled_frame_is_truncated() {
        let cfg = BoardConfig {
            frame_timeout_ms: 0,
            ..quiet()
        };
        let (link, _) = run_script(
            cfg,
            vec![Step::Data(vec![0]), Step::Data(vec![2, 3]), Step::Idle, Step::Data(vec![9])],
        );
        assert_eq!(
            link.replies(),
            vec![
                Message::Received,
                Message::Error(ErrorKind::Truncated),
                Message::Received,
            ]
        );
    }

    #[test]
    fn data_update_between_commands() {
        let cfg = BoardConfig {
            telemetry_interval_ms: 60_000,
            ..BoardConfig::default()
        };
        let (link, _) = run_script(cfg, vec![Step::Data(vec![0, 9]), Step::Idle]);
        let replies = link.replies();
        assert_eq!(&replies[..2], &[Message::Received, Message::Received]);
        assert!(matches!(replies[2], Message::DataUpdate(_)));
        // one DATA_UPDATE per interval
        assert_eq!(replies.len(), 3);
    }

    #[test]
    fn eof_resets_session() {
        let (link, d) = run_script(quiet(), vec![Step::Data(vec![0])]);
        assert_eq!(decode(&link.written).unwrap(), Message::Received);
        assert!(!d.session().is_connected());
    }
}
