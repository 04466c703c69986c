//! Socket plumbing behind the live channel.
//!
//! A [`Connector`] opens one connection and reports what happens to it
//! through a [`ConnectionEvents`] sink. The sink is tagged with the
//! connection's generation and can be detached, after which nothing the old
//! socket does reaches the channel.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// What a connection reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Frame(String),
    Closed { reason: Option<String> },
}

/// Everything the channel's event loop consumes
#[derive(Debug)]
pub(crate) enum ChannelEvent {
    Connection {
        generation: u64,
        event: ConnectionEvent,
    },
    ReconnectDue,
}

/// Callback sink handed to a connection
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    generation: u64,
    detached: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ConnectionEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self {
            generation,
            detached: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) -> bool {
        self.emit(ConnectionEvent::Opened)
    }

    pub fn frame(&self, text: String) -> bool {
        self.emit(ConnectionEvent::Frame(text))
    }

    pub fn closed(&self, reason: Option<String>) -> bool {
        self.emit(ConnectionEvent::Closed { reason })
    }

    /// Stops delivery for this connection and every clone of this sink
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ConnectionEvent) -> bool {
        if self.is_detached() {
            return false;
        }
        self.tx
            .send(ChannelEvent::Connection {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Opens push connections
pub trait Connector: Send + Sync {
    /// Starts connecting to `url`. Progress is reported through `events`;
    /// the returned handle closes the connection.
    fn connect(&self, url: &str, events: ConnectionEvents) -> Box<dyn Connection>;
}

/// Handle to one open (or opening) connection
pub trait Connection: Send {
    fn close(&mut self);
}

/// Default limit for the WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket connector built on tokio-tungstenite
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str, events: ConnectionEvents) -> Box<dyn Connection> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_socket(
            url.to_string(),
            self.connect_timeout,
            events,
            shutdown_rx,
        ));
        Box::new(WsConnection {
            shutdown: Some(shutdown_tx),
            _task: task,
        })
    }
}

struct WsConnection {
    shutdown: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

impl Connection for WsConnection {
    fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            // Receiver gone means the socket task already ended
            let _ = tx.send(());
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Strips the token path segment so credentials never reach the log
fn redact(url: &str) -> &str {
    match url.rfind('/') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

async fn run_socket(
    url: String,
    connect_timeout: Duration,
    events: ConnectionEvents,
    mut shutdown: oneshot::Receiver<()>,
) {
    log::info!(
        "Connecting live channel #{}: {}/…",
        events.generation(),
        redact(&url)
    );

    let connect = tokio::time::timeout(
        connect_timeout,
        tokio_tungstenite::connect_async(url.as_str()),
    );
    let stream = tokio::select! {
        _ = &mut shutdown => {
            log::debug!("Live channel closed while connecting");
            return;
        }
        result = connect => {
            match result {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => {
                    log::warn!("Live channel connection failed: {}", e);
                    events.closed(Some(e.to_string()));
                    return;
                }
                Err(_) => {
                    log::warn!("Live channel connect timed out after {:?}", connect_timeout);
                    events.closed(Some("connect timed out".to_string()));
                    return;
                }
            }
        }
    };

    events.opened();
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    log::debug!("Close frame not sent: {}", e);
                }
                break;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        events.frame(text);
                    }
                    Some(Ok(Message::Close(close))) => {
                        let reason = close.map(|c| format!("{} {}", c.code, c.reason));
                        events.closed(reason);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("Live channel error: {}", e);
                        events.closed(Some(e.to_string()));
                        break;
                    }
                    None => {
                        events.closed(None);
                        break;
                    }
                }
            }
        }
    }
}
