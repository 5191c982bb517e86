use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::{HostOpts, parse_order};
use crate::config::BoardConfig;
use crate::port::{is_idle, open_port};
use crate::proto::{FrameDecoder, Message, encode};

pub fn run(opts: HostOpts) -> Result<()> {
    let orders = opts
        .orders
        .iter()
        .map(|s| parse_order(s))
        .collect::<Result<Vec<_>>>()?;

    let port = open_port(&opts.ser, BoardConfig::default().baud)
        .with_context(|| format!("opening host link on {}", opts.ser.dev))?;
    let mut client = Client::new(port, Duration::from_millis(opts.reply_ms));

    let attempts = (opts.attempts > 0).then_some(opts.attempts);
    let reply = client.handshake(opts.initial_ms, opts.max_ms, attempts)?;
    info!("[host] connected ({:?})", reply);

    let mut failed = 0;
    for msg in orders {
        let reply = client.request(msg)?;
        match reply {
            Message::Error(kind) => {
                warn!("[host] {:?} -> ERROR {}", msg, kind);
                failed += 1;
            }
            other => info!("[host] {:?} -> {:?}", msg, other),
        }
    }
    if failed > 0 {
        bail!("{} order(s) rejected by the board", failed);
    }
    Ok(())
}

/// Host end of the link.
///
/// Strict alternation: one order in flight, and the next is only sent once
/// its acknowledgement arrived. Telemetry seen while waiting is logged and
/// kept in `notifications`.
pub struct Client<T: Read + Write> {
    link: T,
    decoder: FrameDecoder,
    reply_timeout: Duration,
    /// HELLO retries whose ALREADY_CONNECTED may still be on the way.
    stray_hellos: u32,
    pub notifications: Vec<Message>,
}

impl<T: Read + Write> Client<T> {
    pub fn new(link: T, reply_timeout: Duration) -> Self {
        Self {
            link,
            decoder: FrameDecoder::new(),
            reply_timeout,
            stray_hellos: 0,
            notifications: Vec::new(),
        }
    }

    /// Repeat HELLO with doubling back-off until the board acknowledges.
    ///
    /// RECEIVED and ALREADY_CONNECTED both count: the latter means an earlier
    /// HELLO got through but its reply was lost. A late reply can end the
    /// handshake while later HELLOs are still unanswered; their
    /// ALREADY_CONNECTED replies are skipped by [`Client::request`].
    pub fn handshake(
        &mut self,
        initial_ms: u64,
        max_ms: u64,
        attempts: Option<u32>,
    ) -> Result<Message> {
        let mut backoff = initial_ms.max(50);
        let mut sent = 0u32;
        loop {
            if let Some(limit) = attempts
                && sent >= limit
            {
                bail!("no handshake reply after {} HELLO(s)", sent);
            }
            self.send(&Message::Hello)?;
            sent += 1;

            if let Some(reply) = self.wait_reply(Duration::from_millis(backoff))?
                && matches!(reply, Message::Received | Message::AlreadyConnected)
            {
                self.stray_hellos = sent - 1;
                return Ok(reply);
            }
            debug!("[host] no HELLO ack within {}ms", backoff);
            backoff = (backoff.saturating_mul(2)).min(max_ms.max(initial_ms));
        }
    }

    /// Send one order and return its acknowledgement.
    pub fn request(&mut self, msg: Message) -> Result<Message> {
        self.send(&msg)?;
        loop {
            match self.wait_reply(self.reply_timeout)? {
                Some(Message::AlreadyConnected) if self.stray_hellos > 0 => {
                    debug!("[host] late reply to an earlier HELLO");
                    self.stray_hellos -= 1;
                }
                Some(reply) => {
                    // the board answers in order, so anything older is gone by now
                    self.stray_hellos = 0;
                    return Ok(reply);
                }
                None => bail!("no reply to {:?} within {:?}", msg, self.reply_timeout),
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.link
    }

    fn send(&mut self, msg: &Message) -> Result<()> {
        self.link.write_all(&encode(msg)).context("serial write")?;
        self.link.flush().context("serial flush")?;
        Ok(())
    }

    /// Next non-notification frame, or `None` on timeout.
    fn wait_reply(&mut self, timeout: Duration) -> Result<Option<Message>> {
        let start = Instant::now();
        let mut buf = [0u8; 64];
        loop {
            while let Some(frame) = self.decoder.next_frame() {
                match frame {
                    Ok(m) if m.is_notification() => {
                        debug!("[host] notification {:?}", m);
                        self.notifications.push(m);
                    }
                    Ok(m) => return Ok(Some(m)),
                    Err(e) => warn!("[host] undecodable reply: {}", e),
                }
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            match self.link.read(&mut buf) {
                Ok(0) => bail!("link closed"),
                Ok(n) => self.decoder.push(&buf[..n], Instant::now()),
                Err(e) if is_idle(&e) => {}
                Err(e) => return Err(e).context("serial read"),
            }
        }
    }
}
