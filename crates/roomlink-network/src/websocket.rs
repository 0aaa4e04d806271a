//! WebSocket transport
//!
//! Splits the socket into a reader task that turns inbound traffic into
//! [`TransportEvent`]s and a writer task fed by [`Transport::send`]. The
//! reader always finishes with a single `Close` event, whether the server
//! hung up, the socket failed, or we asked to close.

use crate::transport::{ReadyState, Transport, TransportConfig, TransportEvent};
use crate::NetworkError;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Frame(Bytes),
    Close,
}

/// Client side of a room WebSocket
pub struct WebSocketTransport {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicU8>,
}

impl WebSocketTransport {
    /// Connect to `url`.
    ///
    /// Returns the transport and the receiver of its events, with
    /// [`TransportEvent::Open`] already queued.
    pub async fn connect(
        url: &str,
        config: TransportConfig,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), NetworkError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);

        let (ws, _response) = tokio::time::timeout(
            config.connect_timeout,
            connect_async_with_config(url, Some(ws_config), false),
        )
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(|e| NetworkError::ConnectionFailed(format!("{url}: {e}")))?;

        info!("WebSocket connected to {}", url);

        let state = Arc::new(AtomicU8::new(ReadyState::Open.as_u8()));
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        event_tx
            .send(TransportEvent::Open)
            .await
            .map_err(|_| NetworkError::TransportError("Event receiver dropped".to_string()))?;

        let (sink, stream) = ws.split();
        tokio::spawn(write_loop(sink, command_rx, state.clone()));
        tokio::spawn(read_loop(stream, event_tx, state.clone()));

        Ok((
            Self {
                commands: command_tx,
                state,
            },
            event_rx,
        ))
    }
}

impl Transport for WebSocketTransport {
    fn send(&mut self, frame: Bytes) -> Result<(), NetworkError> {
        self.commands
            .send(Command::Frame(frame))
            .map_err(|_| NetworkError::TransportError("Connection writer has stopped".to_string()))
    }

    fn close(&mut self) {
        // The writer may already be gone; the reader still reports Close
        let _ = self.commands.send(Command::Close);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: Arc<AtomicU8>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Frame(frame) => {
                if let Err(e) = sink.send(WsMessage::Binary(frame)).await {
                    warn!("WebSocket write failed: {}", e);
                    break;
                }
            }
            Command::Close => break,
        }
    }

    // Either asked to close or the transport was dropped
    let _ = state.compare_exchange(
        ReadyState::Open.as_u8(),
        ReadyState::Closing.as_u8(),
        Ordering::AcqRel,
        Ordering::Acquire,
    );
    if let Err(e) = sink.send(WsMessage::Close(None)).await {
        debug!("Close frame not sent: {}", e);
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<TransportEvent>,
    state: Arc<AtomicU8>,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Binary(frame)) => {
                if events.send(TransportEvent::Message(frame)).await.is_err() {
                    debug!("Event receiver dropped, stopping reader");
                    break;
                }
            }
            Ok(WsMessage::Close(frame)) => {
                debug!("WebSocket closed by peer: {:?}", frame);
                break;
            }
            Ok(WsMessage::Text(_)) => debug!("Ignoring text frame"),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket read failed: {}", e);
                break;
            }
        }
    }

    state.store(ReadyState::Closed.as_u8(), Ordering::Release);
    let _ = events.send(TransportEvent::Close).await;
}
