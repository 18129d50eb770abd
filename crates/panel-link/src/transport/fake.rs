//! In-memory transport for unit tests

use super::{EventStream, LifecycleEmitter, Transport, TransportError, TransportLink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Records every `open` and hands out a controllable socket per attempt
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    sockets: Arc<Mutex<Vec<FakeSocket>>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Socket of the `index`-th open call
    pub(crate) fn socket(&self, index: usize) -> FakeSocket {
        self.sockets.lock()[index].clone()
    }

    pub(crate) fn last_socket(&self) -> FakeSocket {
        let sockets = self.sockets.lock();
        sockets[sockets.len() - 1].clone()
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &str) -> (Box<dyn TransportLink>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = FakeSocket {
            url: url.to_string(),
            emitter: Arc::new(Mutex::new(LifecycleEmitter::new(tx))),
            sent: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(AtomicBool::new(false)),
            closed_by_client: Arc::new(AtomicBool::new(false)),
        };
        self.sockets.lock().push(socket.clone());
        (Box::new(FakeLink { socket }), rx)
    }
}

/// Server side of one fake connection attempt
#[derive(Clone)]
pub(crate) struct FakeSocket {
    pub(crate) url: String,
    emitter: Arc<Mutex<LifecycleEmitter>>,
    sent: Arc<Mutex<Vec<String>>>,
    open: Arc<AtomicBool>,
    closed_by_client: Arc<AtomicBool>,
}

impl FakeSocket {
    pub(crate) fn accept(&self) {
        self.open.store(true, Ordering::Release);
        self.emitter.lock().opened();
    }

    pub(crate) fn push(&self, frame: impl Into<String>) {
        self.emitter.lock().message(frame.into());
    }

    pub(crate) fn close(&self, code: Option<u16>, reason: &str) {
        self.open.store(false, Ordering::Release);
        self.emitter.lock().closed(code, reason);
    }

    pub(crate) fn fail(&self, err: &str) {
        self.open.store(false, Ordering::Release);
        self.emitter.lock().error(err);
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub(crate) fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    pub(crate) fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::Acquire)
    }
}

struct FakeLink {
    socket: FakeSocket,
}

impl TransportLink for FakeLink {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.socket.open.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        self.socket.sent.lock().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.socket.closed_by_client.store(true, Ordering::Release);
        self.socket.close(Some(1000), "closed by client");
    }
}
