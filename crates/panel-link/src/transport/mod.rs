//! Transport layer
//!
//! A transport owns one full-duplex socket per `open` call and reports its
//! lifecycle as a stream of [`TransportEvent`]s. It never retries.

mod websocket;

#[cfg(test)]
pub(crate) mod fake;

pub use websocket::WsTransport;

use tokio::sync::mpsc;

/// Lifecycle of a single connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed { code: Option<u16>, reason: String },
    Error(String),
}

impl TransportEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Socket is not open")]
    NotOpen,

    #[error("Send failed: {0}")]
    Send(String),
}

/// Events of one connection attempt, in delivery order
pub type EventStream = mpsc::UnboundedReceiver<TransportEvent>;

/// Write half of an open attempt
pub trait TransportLink: Send {
    /// Queue a text frame; fails unless the socket is open
    fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Close the socket. Idempotent.
    fn close(&self);
}

/// Opens sockets
///
/// Must be called from within a tokio runtime.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> (Box<dyn TransportLink>, EventStream);
}

/// Normalizes raw socket callbacks into one well-formed event sequence:
/// at most one `Opened`, messages only while open, exactly one terminal event.
#[derive(Debug)]
pub(crate) struct LifecycleEmitter {
    tx: mpsc::UnboundedSender<TransportEvent>,
    opened: bool,
    finished: bool,
}

impl LifecycleEmitter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            tx,
            opened: false,
            finished: false,
        }
    }

    pub(crate) fn opened(&mut self) {
        if self.opened || self.finished {
            return;
        }
        self.opened = true;
        let _ = self.tx.send(TransportEvent::Opened);
    }

    pub(crate) fn message(&mut self, frame: String) {
        if self.opened && !self.finished {
            let _ = self.tx.send(TransportEvent::Message(frame));
        }
    }

    pub(crate) fn closed(&mut self, code: Option<u16>, reason: impl Into<String>) {
        self.finish(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    pub(crate) fn error(&mut self, err: impl Into<String>) {
        self.finish(TransportEvent::Error(err.into()));
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self, event: TransportEvent) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.tx.send(event);
    }
}
