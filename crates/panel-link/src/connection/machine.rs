//! Reconnect state machine
//!
//! `ReconnectMachine::handle` maps one event to a new state plus the side
//! effects the owning task must perform. It does no I/O and reads no clock.

use super::ConnectionState;
use crate::error::LinkError;
use crate::protocol::RpcCloseCode;
use panel_common::ReconnectConfig;
use std::time::Duration;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Scheduled retries before giving up
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&ReconnectConfig> for RetryPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_delay(),
        }
    }
}

impl RetryPolicy {
    /// `initial_delay * 2^attempt`, saturating
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Whether the server acknowledges the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Usable as soon as the handshake is sent
    FireAndForget,
    /// Usable only after the server acknowledges it
    AwaitAck,
}

/// Which milestone resets the attempt counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptReset {
    OnOpen,
    OnHandshakeAck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub handshake: HandshakeMode,
    pub reset: AttemptReset,
}

impl ChannelPolicy {
    /// Panel backend channels: no acknowledgment, open counts as progress
    pub const FIRE_AND_FORGET: Self = Self {
        handshake: HandshakeMode::FireAndForget,
        reset: AttemptReset::OnOpen,
    };

    /// RPC channel: only an accepted identify counts as progress
    pub const AWAIT_ACK: Self = Self {
        handshake: HandshakeMode::AwaitAck,
        reset: AttemptReset::OnHandshakeAck,
    };
}

/// Inputs to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Explicit start by the caller
    Start,
    RetryElapsed,
    TransportOpened,
    HandshakeAcknowledged,
    TransportClosed { code: Option<u16>, reason: String },
    TransportFailed(String),
    /// Caller tears the channel down
    Shutdown,
}

/// Side effects requested by a transition, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenTransport,
    SendHandshake,
    ScheduleRetry(Duration),
    CancelRetry,
    CloseTransport,
}

#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    state: ConnectionState,
    attempts: u32,
    last_error: Option<LinkError>,
    pending_retry: Option<Duration>,
    retry: RetryPolicy,
    policy: ChannelPolicy,
}

impl ReconnectMachine {
    #[must_use]
    pub fn new(retry: RetryPolicy, policy: ChannelPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            last_error: None,
            pending_retry: None,
            retry,
            policy,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&LinkError> {
        self.last_error.as_ref()
    }

    /// Delay of the scheduled retry, if any
    #[must_use]
    pub fn pending_retry(&self) -> Option<Duration> {
        self.pending_retry
    }

    pub fn handle(&mut self, event: SupervisorEvent) -> Vec<Effect> {
        match event {
            SupervisorEvent::Start => self.on_start(),
            SupervisorEvent::RetryElapsed => self.on_retry_elapsed(),
            SupervisorEvent::TransportOpened => self.on_opened(),
            SupervisorEvent::HandshakeAcknowledged => self.on_handshake_ack(),
            SupervisorEvent::TransportClosed { code, reason } => {
                if !self.state.is_live() {
                    return Vec::new();
                }
                let error = self.classify_close(code, reason);
                self.fail(error)
            }
            SupervisorEvent::TransportFailed(reason) => {
                if !self.state.is_live() {
                    return Vec::new();
                }
                let error = if self.state == ConnectionState::Connecting {
                    LinkError::TransportOpen(reason)
                } else {
                    LinkError::ConnectionClosed { code: None, reason }
                };
                self.fail(error)
            }
            SupervisorEvent::Shutdown => self.on_shutdown(),
        }
    }

    fn on_start(&mut self) -> Vec<Effect> {
        if self.state.is_live() {
            return Vec::new();
        }

        let mut effects = Vec::with_capacity(2);
        if self.pending_retry.take().is_some() {
            effects.push(Effect::CancelRetry);
        }
        self.attempts = 0;
        self.state = ConnectionState::Connecting;
        effects.push(Effect::OpenTransport);
        effects
    }

    fn on_retry_elapsed(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Disconnected || self.pending_retry.take().is_none() {
            return Vec::new();
        }
        self.state = ConnectionState::Connecting;
        vec![Effect::OpenTransport]
    }

    fn on_opened(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        match self.policy.handshake {
            HandshakeMode::FireAndForget => {
                self.state = ConnectionState::Connected;
                self.last_error = None;
            }
            HandshakeMode::AwaitAck => self.state = ConnectionState::Identifying,
        }
        if self.policy.reset == AttemptReset::OnOpen {
            self.attempts = 0;
        }
        vec![Effect::SendHandshake]
    }

    fn on_handshake_ack(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Identifying {
            return Vec::new();
        }
        self.state = ConnectionState::Identified;
        self.last_error = None;
        if self.policy.reset == AttemptReset::OnHandshakeAck {
            self.attempts = 0;
        }
        Vec::new()
    }

    fn on_shutdown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(2);
        if self.pending_retry.take().is_some() {
            effects.push(Effect::CancelRetry);
        }
        if self.state.is_live() {
            effects.push(Effect::CloseTransport);
        }
        self.state = ConnectionState::Disconnected;
        effects
    }

    fn classify_close(&self, code: Option<u16>, reason: String) -> LinkError {
        let rejected = self.state == ConnectionState::Identifying
            && code
                .and_then(RpcCloseCode::from_u16)
                .is_some_and(RpcCloseCode::is_handshake_rejection);

        match code {
            Some(code) if rejected => LinkError::HandshakeRejected { code, reason },
            _ => LinkError::ConnectionClosed { code, reason },
        }
    }

    fn fail(&mut self, error: LinkError) -> Vec<Effect> {
        if self.attempts < self.retry.max_attempts {
            let delay = self.retry.delay_for(self.attempts);
            self.attempts += 1;
            self.state = ConnectionState::Disconnected;
            self.pending_retry = Some(delay);
            self.last_error = Some(error);
            vec![Effect::CloseTransport, Effect::ScheduleRetry(delay)]
        } else {
            self.state = ConnectionState::GivingUp;
            self.pending_retry = None;
            self.last_error = Some(LinkError::RetryExhausted {
                attempts: self.attempts,
            });
            vec![Effect::CloseTransport]
        }
    }
}
