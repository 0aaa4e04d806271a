use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use roomlink_network::{ReadyState, Transport, TransportConfig, TransportEvent, WebSocketTransport};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Accepts one client, sends `greeting`, then echoes binary frames until
/// the close handshake completes.
async fn spawn_echo_server(greeting: &'static [u8]) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Binary(Bytes::from_static(greeting)))
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Binary(frame) = msg {
                if ws.send(Message::Binary(frame)).await.is_err() {
                    break;
                }
            }
        }
    });

    (format!("ws://{addr}"), handle)
}

async fn next_event(events: &mut tokio::sync::mpsc::Receiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

#[tokio::test]
async fn open_message_send_and_close() {
    let (url, server) = spawn_echo_server(b"\x91\x0c").await;

    let (mut transport, mut events) = WebSocketTransport::connect(&url, TransportConfig::default())
        .await
        .expect("connect");

    assert_eq!(next_event(&mut events).await, TransportEvent::Open);
    assert_eq!(transport.ready_state(), ReadyState::Open);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Message(Bytes::from_static(b"\x91\x0c"))
    );

    transport.send(Bytes::from_static(b"echo me")).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Message(Bytes::from_static(b"echo me"))
    );

    transport.close();
    assert_eq!(next_event(&mut events).await, TransportEvent::Close);
    assert_eq!(transport.ready_state(), ReadyState::Closed);

    timeout(Duration::from_secs(5), server)
        .await
        .expect("server finished")
        .unwrap();
}

#[tokio::test]
async fn server_hangup_reports_single_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let (transport, mut events) =
        WebSocketTransport::connect(&format!("ws://{addr}"), TransportConfig::default())
            .await
            .expect("connect");

    assert_eq!(next_event(&mut events).await, TransportEvent::Open);
    assert_eq!(next_event(&mut events).await, TransportEvent::Close);
    assert_eq!(transport.ready_state(), ReadyState::Closed);

    // The reader is done; nothing follows the Close
    let rest = timeout(Duration::from_secs(1), events.recv()).await;
    assert!(matches!(rest, Ok(None)));
}
