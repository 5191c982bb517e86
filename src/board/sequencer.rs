use std::time::{Duration, Instant};

use tracing::info;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestState {
    #[default]
    Idle,
    Running,
    Paused,
    /// Terminal until the host handshakes again.
    Stopped,
}

/// Test lifecycle plus the DATA_UPDATE cadence that runs while a test is live.
#[derive(Debug, Clone)]
pub struct TestSequencer {
    state: TestState,
    data_interval: Option<Duration>,
    last_data: Option<Instant>,
}

impl TestSequencer {
    /// `data_interval` of `None` disables periodic DATA_UPDATE.
    pub fn new(data_interval: Option<Duration>) -> Self {
        Self {
            state: TestState::Idle,
            data_interval,
            last_data: None,
        }
    }

    pub fn state(&self) -> TestState {
        self.state
    }

    pub fn permits_actuators(&self) -> bool {
        self.state != TestState::Stopped
    }

    pub fn start(&mut self) -> Result<TestState, ErrorKind> {
        match self.state {
            TestState::Idle | TestState::Paused => {
                self.last_data = None;
                self.transition(TestState::Running)
            }
            TestState::Running | TestState::Stopped => Err(ErrorKind::InvalidTransition),
        }
    }

    pub fn pause(&mut self) -> Result<TestState, ErrorKind> {
        match self.state {
            TestState::Running => self.transition(TestState::Paused),
            _ => Err(ErrorKind::InvalidTransition),
        }
    }

    /// Accepted from every state, including Stopped.
    pub fn stop(&mut self) -> TestState {
        self.state = TestState::Stopped;
        info!("test stopped");
        self.state
    }

    /// Leave Stopped after a fresh handshake. Other states are untouched.
    pub fn rearm(&mut self) {
        if self.state == TestState::Stopped {
            info!("test re-armed by handshake");
            self.state = TestState::Idle;
            self.last_data = None;
        }
    }

    /// Whether a DATA_UPDATE should go out now. Records the emission when it returns true.
    pub fn take_data_slot(&mut self, now: Instant) -> bool {
        if self.state != TestState::Running {
            return false;
        }
        let Some(interval) = self.data_interval else {
            return false;
        };
        let due = match self.last_data {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= interval,
        };
        if due {
            self.last_data = Some(now);
        }
        due
    }

    fn transition(&mut self, to: TestState) -> Result<TestState, ErrorKind> {
        info!("test {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(to)
    }
}
