use std::time::Instant;

use tracing::{debug, info, warn};

use crate::board::handshake::{HelloOutcome, Session};
use crate::board::sequencer::{TestSequencer, TestState};
use crate::board::{BoardState, MotorState, RELAY_CHANNELS, actuators};
use crate::config::BoardConfig;
use crate::driver::HardwareDriver;
use crate::error::ErrorKind;
use crate::proto::codec::encode_into;
use crate::proto::{DecodeError, Message, Order};

/// Everything the board sends in answer to one inbound frame.
///
/// `reply` is the single acknowledgement the host waits for. `follow_ups`
/// are notifications (READY_RELAY, HV_UPDATED, debug echo) that go out
/// right behind it in the same write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub reply: Message,
    pub follow_ups: Vec<Message>,
}

impl Outbound {
    fn reply(reply: Message) -> Self {
        Self {
            reply,
            follow_ups: Vec::new(),
        }
    }

    fn error(kind: ErrorKind) -> Self {
        Self::reply(Message::Error(kind))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.reply, Message::Error(_))
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        std::iter::once(&self.reply).chain(self.follow_ups.iter())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for m in self.messages() {
            encode_into(m, &mut out);
        }
        out
    }
}

/// Routes decoded messages to the session, sequencer and actuators.
///
/// Sole owner of the board state: nothing else mutates it.
pub struct Dispatcher<D: HardwareDriver> {
    config: BoardConfig,
    session: Session,
    sequencer: TestSequencer,
    board: BoardState,
    driver: D,
}

impl<D: HardwareDriver> Dispatcher<D> {
    pub fn new(config: BoardConfig, driver: D) -> Self {
        let sequencer = TestSequencer::new(config.telemetry_interval());
        Self {
            config,
            session: Session::default(),
            sequencer,
            board: BoardState::default(),
            driver,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn test_state(&self) -> TestState {
        self.sequencer.state()
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Answer one frame straight from the decoder, good or bad.
    pub fn handle_frame(&mut self, frame: Result<Message, DecodeError>) -> Outbound {
        match frame {
            Ok(msg) => self.handle(msg),
            Err(e) => self.reject(e),
        }
    }

    pub fn reject(&mut self, err: DecodeError) -> Outbound {
        warn!("bad frame: {}", err);
        // a bad payload value ranks below the session and direction checks
        let kind = err
            .payload_order()
            .and_then(|order| self.gate(order))
            .unwrap_or_else(|| err.kind());
        Outbound::error(kind)
    }

    pub fn handle(&mut self, msg: Message) -> Outbound {
        debug!("rx {:?}", msg);
        let order = msg.order();

        let mut out = match self.gate(order) {
            Some(kind) => Outbound::error(kind),
            None => self.route(msg),
        };

        if let Message::Error(kind) = out.reply {
            warn!("{:?} rejected: {}", order, kind);
        } else if self.config.debug_echo {
            out.follow_ups.push(msg);
        }
        out
    }

    /// DATA_UPDATE to send between commands, if one is due.
    pub fn poll_telemetry(&mut self, now: Instant) -> Option<Message> {
        self.sequencer
            .take_data_slot(now)
            .then(|| Message::DataUpdate(self.board.snapshot()))
    }

    /// The link layer lost the host. Actuators and test state are left as they are.
    pub fn reset_link(&mut self) {
        self.session.reset();
    }

    /// Session first, then direction. Payload checks only run once both pass.
    fn gate(&self, order: Order) -> Option<ErrorKind> {
        if !self.session.is_connected() && order != Order::Hello {
            Some(ErrorKind::NotConnected)
        } else if order.is_outbound_only() {
            Some(ErrorKind::InvalidDirection)
        } else {
            None
        }
    }

    fn route(&mut self, msg: Message) -> Outbound {
        match msg {
            Message::Hello => {
                self.sequencer.rearm();
                match self.session.hello() {
                    HelloOutcome::Established => Outbound::reply(Message::Received),
                    HelloOutcome::AlreadyConnected => Outbound::reply(Message::AlreadyConnected),
                }
            }

            Message::Motor { direction, speed } => {
                let motor = match actuators::set_motion(direction, speed, self.config.speed_max) {
                    Ok(m) => m,
                    Err(kind) => return Outbound::error(kind),
                };
                self.gated(|this| {
                    this.driver.set_motion(motor);
                    this.board.motor = motor;
                    Outbound::reply(Message::Received)
                })
            }

            Message::Relay { channel, on } => {
                let relays = match actuators::set_channel(self.board.relays, channel, on) {
                    Ok(r) => r,
                    Err(kind) => return Outbound::error(kind),
                };
                self.gated(|this| {
                    let settled = this.driver.set_relay(channel as usize, on);
                    this.board.relays = relays;
                    let mut out = Outbound::reply(Message::Received);
                    if settled {
                        out.follow_ups.push(Message::ReadyRelay { channel });
                    } else {
                        warn!("relay {} did not confirm", channel);
                    }
                    out
                })
            }

            Message::HvSet { enabled } => {
                if !self.sequencer.permits_actuators() {
                    // refused, but the host still learns the real HV level
                    let mut out = Outbound::error(ErrorKind::TestStopped);
                    out.follow_ups.push(Message::HvUpdated {
                        enabled: self.board.hv.enabled,
                    });
                    return out;
                }
                let mut out = Outbound::reply(Message::Received);
                self.apply_hv(enabled, &mut out);
                out
            }

            Message::OpenRelays => self.gated(|this| {
                this.open_relays();
                Outbound::reply(Message::Received)
            }),

            Message::StartTest => match self.sequencer.start() {
                Ok(_) => Outbound::reply(Message::Received),
                Err(kind) => Outbound::error(kind),
            },

            Message::PauseTest => match self.sequencer.pause() {
                Ok(_) => Outbound::reply(Message::Received),
                Err(kind) => Outbound::error(kind),
            },

            Message::Stop => {
                self.sequencer.stop();
                let mut out = Outbound::reply(Message::Received);
                if self.config.safe_stop {
                    self.make_safe(&mut out);
                }
                out
            }

            // outbound-only orders are filtered before routing
            Message::AlreadyConnected
            | Message::Error(_)
            | Message::Received
            | Message::ReadyRelay { .. }
            | Message::DataUpdate(_)
            | Message::HvUpdated { .. } => Outbound::error(ErrorKind::InvalidDirection),
        }
    }

    /// Run an actuator change unless the test has been stopped.
    fn gated(&mut self, apply: impl FnOnce(&mut Self) -> Outbound) -> Outbound {
        if !self.sequencer.permits_actuators() {
            return Outbound::error(ErrorKind::TestStopped);
        }
        apply(self)
    }

    /// HV changes are always reported, whatever the test state.
    fn apply_hv(&mut self, enabled: bool, out: &mut Outbound) {
        let hv = actuators::set_enabled(enabled);
        self.driver.set_hv(hv.enabled);
        self.board.hv = hv;
        info!("hv enabled={}", hv.enabled);
        out.follow_ups.push(Message::HvUpdated {
            enabled: hv.enabled,
        });
    }

    fn open_relays(&mut self) {
        for ch in 0..RELAY_CHANNELS {
            if self.board.relays.get(ch) == Some(true) {
                self.driver.set_relay(ch, false);
            }
        }
        self.board.relays = actuators::open_all();
    }

    fn make_safe(&mut self, out: &mut Outbound) {
        if self.board.hv.enabled {
            self.apply_hv(false, out);
        }
        if self.board.relays.any_closed() {
            self.open_relays();
        }
        if self.board.motor.speed != 0 {
            let halted = MotorState {
                speed: 0,
                ..self.board.motor
            };
            self.driver.set_motion(halted);
            self.board.motor = halted;
        }
    }
}
