//! WebSocket transport over `tokio-tungstenite`

use super::{EventStream, LifecycleEmitter, Transport, TransportError, TransportLink};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

/// Close code reported when the stream ends without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;
const NORMAL_CLOSURE: u16 = 1000;

/// Production transport: one tokio task per socket
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

enum Outbound {
    Frame(String),
    Close,
}

struct WsLink {
    out_tx: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl TransportLink for WsLink {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        self.out_tx
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.out_tx.send(Outbound::Close);
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> (Box<dyn TransportLink>, EventStream) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_socket(
            url.to_string(),
            out_rx,
            LifecycleEmitter::new(event_tx),
            open.clone(),
        ));

        (Box::new(WsLink { out_tx, open }), event_rx)
    }
}

async fn run_socket(
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
    mut emitter: LifecycleEmitter,
    open: Arc<AtomicBool>,
) {
    // Nothing but a close can arrive before the socket is marked open
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = out_rx.recv() => {
            emitter.closed(Some(NORMAL_CLOSURE), "closed before open");
            return;
        }
    };

    let ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            debug!(url = %url, error = %e, "WebSocket connect failed");
            emitter.error(e.to_string());
            return;
        }
    };

    let (mut sink, mut stream) = ws.split();
    open.store(true, Ordering::Release);
    emitter.opened();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        open.store(false, Ordering::Release);
                        emitter.error(e.to_string());
                        break;
                    }
                }
                // Close requested or the link was dropped
                Some(Outbound::Close) | None => {
                    open.store(false, Ordering::Release);
                    let _ = sink.send(Message::Close(None)).await;
                    emitter.closed(Some(NORMAL_CLOSURE), "closed by client");
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => emitter.message(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    open.store(false, Ordering::Release);
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    emitter.closed(code, reason);
                    break;
                }
                Some(Ok(other)) => {
                    trace!(url = %url, kind = ?other, "Ignoring non-text frame");
                }
                Some(Err(e)) => {
                    open.store(false, Ordering::Release);
                    emitter.error(e.to_string());
                    break;
                }
                None => {
                    open.store(false, Ordering::Release);
                    emitter.closed(Some(ABNORMAL_CLOSURE), "connection dropped");
                    break;
                }
            }
        }
    }
}
