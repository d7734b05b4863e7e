use std::time::Duration;

use tracing::{error, info};

use crate::{
    config::{Config, ReconnectPolicy},
    error::ConnectError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Fixed policy ran out of attempts. Terminal.
    GaveUp,
    /// `dispose()` was called. Terminal.
    Disposed,
}

/// Reconnect timing, built from the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed { delay: Duration, max_attempts: u32 },
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    pub fn from_config(config: &Config) -> Self {
        let base = Duration::from_millis(config.base_delay_ms);
        match config.reconnect_policy {
            ReconnectPolicy::Fixed => Backoff::Fixed {
                delay: base,
                max_attempts: config.max_attempts,
            },
            ReconnectPolicy::Exponential => Backoff::Exponential {
                base,
                max: Duration::from_millis(config.max_delay_ms),
            },
        }
    }

    /// Delay before retry number `attempts` (zero based), or `None` once the
    /// policy has given up.
    pub fn delay(&self, attempts: u32) -> Option<Duration> {
        match *self {
            Backoff::Fixed {
                delay,
                max_attempts,
            } => (attempts < max_attempts).then_some(delay),
            Backoff::Exponential { base, max } => {
                let delay = 2u32
                    .checked_pow(attempts)
                    .and_then(|factor| base.checked_mul(factor))
                    .map_or(max, |delay| delay.min(max));
                Some(delay)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    After(Duration),
    GiveUp,
    /// Disposed, nothing to schedule.
    Stopped,
}

/// Connection lifecycle bookkeeping. Holds no socket; the manager loop asks it
/// what to do and reports back what happened.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    attempts: u32,
    backoff: Backoff,
}

impl Connection {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            backoff,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Only one socket may be in flight: refuses while one is connecting or
    /// open, and after the connection reached a terminal state.
    pub fn begin_connect(&mut self) -> Result<(), ConnectError> {
        match self.state {
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                Ok(())
            }
            ConnectionState::Connecting => Err(ConnectError::AlreadyActive("connecting")),
            ConnectionState::Connected => Err(ConnectError::AlreadyActive("connected")),
            ConnectionState::GaveUp => Err(ConnectError::GaveUp),
            ConnectionState::Disposed => Err(ConnectError::Disposed),
        }
    }

    pub fn on_open(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.attempts = 0;
        }
    }

    /// Records a drop (or a failed connect) and decides when to retry.
    pub fn on_close(&mut self) -> Reconnect {
        match self.state {
            ConnectionState::Disposed => return Reconnect::Stopped,
            ConnectionState::GaveUp => return Reconnect::GiveUp,
            _ => self.state = ConnectionState::Disconnected,
        }
        self.schedule_reconnect()
    }

    fn schedule_reconnect(&mut self) -> Reconnect {
        match self.backoff.delay(self.attempts) {
            Some(delay) => {
                self.attempts = self.attempts.saturating_add(1);
                match self.backoff {
                    Backoff::Fixed { max_attempts, .. } => info!(
                        "Reconnecting in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        self.attempts,
                        max_attempts
                    ),
                    Backoff::Exponential { .. } => info!(
                        "Reconnecting in {}ms (attempt {})",
                        delay.as_millis(),
                        self.attempts
                    ),
                }
                Reconnect::After(delay)
            }
            None => {
                error!("Max reconnect attempts reached, giving up");
                self.state = ConnectionState::GaveUp;
                Reconnect::GiveUp
            }
        }
    }

    /// Returns true the first time only.
    pub fn dispose(&mut self) -> bool {
        if self.state == ConnectionState::Disposed {
            return false;
        }
        self.state = ConnectionState::Disposed;
        true
    }
}
