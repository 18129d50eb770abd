//! Reconnect supervisor task
//!
//! One task per channel owns the socket, the [`ReconnectMachine`] and the
//! router. Commands, transport events and the retry timer are handled one at
//! a time, so a channel's state is only ever touched from its own task.

use super::machine::{Effect, ReconnectMachine, RetryPolicy, SupervisorEvent};
use super::{ConnectionState, ConnectionStatus};
use crate::error::LinkError;
use crate::protocol::ChannelKind;
use crate::router::{ChannelRouter, Dispatch};
use crate::store::{Slot, Subscription};
use crate::transport::{EventStream, Transport, TransportEvent, TransportLink};
use chrono::Utc;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Sleep;

#[derive(Debug)]
enum Command {
    Start,
    Shutdown,
    Send(String),
}

/// Caller-side handle to a channel's supervisor task
///
/// Dropping the last handle shuts the channel down and ends the task.
#[derive(Clone)]
pub struct SupervisorHandle {
    channel: ChannelKind,
    commands: mpsc::UnboundedSender<Command>,
    status: Slot<ConnectionStatus>,
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("channel", &self.channel)
            .field("state", &self.state())
            .finish()
    }
}

impl SupervisorHandle {
    #[must_use]
    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Connect, or reconnect after giving up. No-op while a connection is live.
    pub fn start(&self) {
        self.command(Command::Start);
    }

    /// Cancel any pending retry and close the socket
    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }

    /// Send a text frame. Dropped with a warning unless connected.
    pub fn send(&self, frame: impl Into<String>) {
        self.command(Command::Send(frame.into()));
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(frame) => self.send(frame),
            Err(e) => {
                tracing::error!(channel = %self.channel, error = %e, "Failed to encode command");
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.with(|s| s.state)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_sendable()
    }

    #[must_use]
    pub fn status_slot(&self) -> &Slot<ConnectionStatus> {
        &self.status
    }

    pub fn subscribe_status(
        &self,
        callback: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        self.status.subscribe(callback)
    }

    /// Whether the supervisor task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!(channel = %self.channel, "Supervisor has stopped, command ignored");
        }
    }
}

/// Spawn the supervisor task for one channel
///
/// The channel stays disconnected until [`SupervisorHandle::start`] is called.
/// Must be called from within a tokio runtime.
pub fn spawn_supervisor<R: ChannelRouter>(
    url: impl Into<String>,
    transport: Arc<dyn Transport>,
    router: R,
    retry: RetryPolicy,
) -> SupervisorHandle {
    let url = url.into();
    let channel = router.channel();
    let status = Slot::new(ConnectionStatus::new(channel, url.clone()));
    let (commands, command_rx) = mpsc::unbounded_channel();

    let supervisor = Supervisor {
        channel,
        url,
        transport,
        machine: ReconnectMachine::new(retry, router.policy()),
        router,
        link: None,
        events: None,
        retry_timer: None,
        status: status.clone(),
        max_attempts: retry.max_attempts,
    };
    tokio::spawn(supervisor.run(command_rx));

    SupervisorHandle {
        channel,
        commands,
        status,
    }
}

struct Supervisor<R> {
    channel: ChannelKind,
    url: String,
    transport: Arc<dyn Transport>,
    router: R,
    machine: ReconnectMachine,
    link: Option<Box<dyn TransportLink>>,
    events: Option<EventStream>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    status: Slot<ConnectionStatus>,
    max_attempts: u32,
}

impl<R: ChannelRouter> Supervisor<R> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!(channel = %self.channel, url = %self.url, "Supervisor started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start) => self.handle(SupervisorEvent::Start),
                    Some(Command::Shutdown) => self.handle(SupervisorEvent::Shutdown),
                    Some(Command::Send(frame)) => self.send(frame),
                    None => break,
                },
                event = next_event(&mut self.events) => self.on_transport_event(event),
                () = retry_elapsed(&mut self.retry_timer) => {
                    self.retry_timer = None;
                    self.handle(SupervisorEvent::RetryElapsed);
                }
            }
        }

        self.handle(SupervisorEvent::Shutdown);
        tracing::debug!(channel = %self.channel, "Supervisor stopped");
    }

    fn handle(&mut self, event: SupervisorEvent) {
        for effect in self.machine.handle(event) {
            self.execute(effect);
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport => {
                self.close_link();
                tracing::info!(
                    channel = %self.channel,
                    url = %self.url,
                    attempt = self.machine.attempts(),
                    "Opening connection"
                );
                let (link, events) = self.transport.open(&self.url);
                self.link = Some(link);
                self.events = Some(events);
            }
            Effect::SendHandshake => self.send_handshake(),
            Effect::ScheduleRetry(delay) => {
                tracing::warn!(
                    channel = %self.channel,
                    attempt = self.machine.attempts(),
                    max_attempts = self.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Reconnecting after delay"
                );
                self.retry_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Effect::CancelRetry => self.retry_timer = None,
            Effect::CloseTransport => self.close_link(),
        }
    }

    fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Opened) => {
                tracing::info!(channel = %self.channel, url = %self.url, "Connection established");
                self.handle(SupervisorEvent::TransportOpened);
            }
            Some(TransportEvent::Message(frame)) => self.route(&frame),
            Some(TransportEvent::Closed { code, reason }) => {
                tracing::warn!(
                    channel = %self.channel,
                    code = ?code,
                    reason = %reason,
                    "Connection closed"
                );
                self.handle(SupervisorEvent::TransportClosed { code, reason });
                self.close_link();
            }
            Some(TransportEvent::Error(error)) => {
                tracing::warn!(channel = %self.channel, error = %error, "Transport error");
                self.handle(SupervisorEvent::TransportFailed(error));
                self.close_link();
            }
            None => {
                self.events = None;
                self.handle(SupervisorEvent::TransportFailed(
                    "transport event stream ended".to_string(),
                ));
            }
        }
    }

    fn route(&mut self, frame: &str) {
        if self.router.dispatch(frame) == Dispatch::HandshakeAck {
            tracing::info!(channel = %self.channel, "Handshake acknowledged");
            self.handle(SupervisorEvent::HandshakeAcknowledged);
        }
    }

    fn send(&mut self, frame: String) {
        let state = self.machine.state();
        if !state.is_sendable() {
            tracing::warn!(
                channel = %self.channel,
                state = %state,
                error = %LinkError::SendWhileDisconnected,
                "Dropping command"
            );
            return;
        }

        if let Some(link) = &self.link {
            if let Err(e) = link.send(frame) {
                tracing::warn!(channel = %self.channel, error = %e, "Failed to send command");
            }
        }
    }

    fn send_handshake(&mut self) {
        let handshake = self.router.handshake();
        let frame = match handshake.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(channel = %self.channel, error = %e, "Failed to encode handshake");
                return;
            }
        };

        let Some(link) = &self.link else {
            return;
        };
        if let Err(e) = link.send(frame) {
            tracing::warn!(channel = %self.channel, error = %e, "Failed to send handshake");
            return;
        }

        for request in self.router.initial_requests() {
            if let Err(e) = link.send(request) {
                tracing::warn!(channel = %self.channel, error = %e, "Failed to send initial request");
            }
        }
    }

    fn close_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.events = None;
    }

    fn publish(&self) {
        let current = self.status.get();
        let next = ConnectionStatus {
            channel: self.channel,
            url: self.url.clone(),
            state: self.machine.state(),
            attempts: self.machine.attempts(),
            last_error: self.machine.last_error().cloned(),
            retry_in: self.machine.pending_retry(),
            since: if current.state == self.machine.state() {
                current.since
            } else {
                Utc::now()
            },
        };

        if current.same_as(&next) {
            return;
        }

        if current.state != next.state {
            if next.state == ConnectionState::GivingUp {
                tracing::error!(
                    channel = %self.channel,
                    url = %self.url,
                    attempts = next.attempts,
                    "Max reconnection attempts reached, giving up"
                );
            } else {
                tracing::debug!(
                    channel = %self.channel,
                    from = %current.state,
                    to = %next.state,
                    "Connection state changed"
                );
            }
        }

        self.status.set(next);
    }
}

async fn next_event(events: &mut Option<EventStream>) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn retry_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
