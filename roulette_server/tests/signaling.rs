use futures::{SinkExt, StreamExt};
use roulette_protocol::{ClientId, ServerEvent};
use roulette_server::{Dispatcher, SignalingCore, serve};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

async fn start_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (dispatcher, _core) = Dispatcher::spawn(SignalingCore::default());
    let (shutdown, stop) = oneshot::channel::<()>();
    tokio::spawn(async move {
        serve(listener, dispatcher, async move {
            let _ = stop.await;
        })
        .await
        .unwrap();
    });
    TestServer {
        addr,
        _shutdown: shutdown,
    }
}

async fn connect(server: &TestServer) -> Client {
    let (client, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();
    client
}

async fn recv(client: &mut Client) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, client.next())
            .await
            .expect("timed out waiting for an event")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return text.as_str().parse().unwrap();
        }
    }
}

async fn send(client: &mut Client, value: serde_json::Value) {
    client.send(Message::text(value.to_string())).await.unwrap();
}

async fn paired(server: &TestServer) -> (Client, Client) {
    let mut first = connect(server).await;
    assert_eq!(recv(&mut first).await, ServerEvent::Waiting);
    let mut second = connect(server).await;
    assert!(matches!(recv(&mut first).await, ServerEvent::StartCall { .. }));
    assert!(matches!(recv(&mut second).await, ServerEvent::StartCall { .. }));
    (first, second)
}

#[tokio::test]
async fn end_to_end_scenario() {
    let server = start_server().await;

    let mut one = connect(&server).await;
    assert_eq!(recv(&mut one).await, ServerEvent::Waiting);

    let mut two = connect(&server).await;
    assert_eq!(
        recv(&mut one).await,
        ServerEvent::StartCall {
            own_id: ClientId(1),
            peer_id: ClientId(2)
        }
    );
    assert_eq!(
        recv(&mut two).await,
        ServerEvent::StartCall {
            own_id: ClientId(2),
            peer_id: ClientId(1)
        }
    );

    send(&mut one, json!({"type": "offer", "sdp": "v=0"})).await;
    match recv(&mut two).await {
        ServerEvent::Relay { sender, payload } => {
            assert_eq!(sender, ClientId(1));
            assert_eq!(payload["type"], "offer");
            assert_eq!(payload["sdp"], "v=0");
        }
        other => panic!("expected a relayed offer, got {other:?}"),
    }

    two.close(None).await.unwrap();
    assert_eq!(recv(&mut one).await, ServerEvent::CallEnded);

    send(&mut one, json!({"type": "request_new_peer"})).await;
    assert_eq!(recv(&mut one).await, ServerEvent::Waiting);
}

#[tokio::test]
async fn malformed_messages_keep_the_connection_open() {
    let server = start_server().await;
    let (mut one, mut two) = paired(&server).await;

    one.send(Message::text("{not json".to_string())).await.unwrap();
    one.send(Message::binary(vec![0u8, 1, 2])).await.unwrap();
    send(&mut one, json!({"type": "candidate", "candidate": "a=1"})).await;

    match recv(&mut two).await {
        ServerEvent::Relay { payload, .. } => assert_eq!(payload["type"], "candidate"),
        other => panic!("expected a relayed candidate, got {other:?}"),
    }
}

#[tokio::test]
async fn reseek_notifies_the_old_peer_and_rematches() {
    let server = start_server().await;
    let (mut one, mut two) = paired(&server).await;

    let mut three = connect(&server).await;
    assert_eq!(recv(&mut three).await, ServerEvent::Waiting);

    send(&mut two, json!({"type": "request_new_peer"})).await;
    assert_eq!(recv(&mut one).await, ServerEvent::CallEnded);
    assert_eq!(
        recv(&mut three).await,
        ServerEvent::StartCall {
            own_id: ClientId(3),
            peer_id: ClientId(2)
        }
    );
    assert_eq!(
        recv(&mut two).await,
        ServerEvent::StartCall {
            own_id: ClientId(2),
            peer_id: ClientId(3)
        }
    );
}

#[tokio::test]
async fn report_is_acknowledged_to_the_reported_peer() {
    let server = start_server().await;
    let (mut one, mut two) = paired(&server).await;

    send(
        &mut two,
        json!({"type": "report_user", "reportedPeerId": 1, "reason": "spam"}),
    )
    .await;
    assert_eq!(recv(&mut one).await, ServerEvent::ReportReceived);

    // the session survives the report
    send(&mut one, json!({"type": "answer"})).await;
    assert!(matches!(recv(&mut two).await, ServerEvent::Relay { .. }));
}

#[tokio::test]
async fn dropped_socket_ends_the_call() {
    let server = start_server().await;
    let (one, mut two) = paired(&server).await;

    drop(one);
    assert_eq!(recv(&mut two).await, ServerEvent::CallEnded);
}

#[tokio::test]
async fn plain_http_health_check() {
    let server = start_server().await;

    let resp = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn plain_get_serves_the_info_page() {
    let server = start_server().await;

    let resp = reqwest::get(format!("http://{}/anything", server.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.text()
            .await
            .unwrap()
            .starts_with("WebSocket server is running")
    );

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

async fn read_until(stream: &mut TcpStream, buf: &mut Vec<u8>, needle: &[u8]) {
    tokio::time::timeout(TIMEOUT, async {
        while !buf.windows(needle.len()).any(|w| w == needle) {
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed early");
            buf.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .expect("timed out reading response");
}

#[tokio::test]
async fn slow_upgrade_request_still_becomes_a_session() {
    let server = start_server().await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .unwrap();
    // the rest of the head arrives well after the first bytes
    tokio::time::sleep(Duration::from_millis(700)).await;
    stream
        .write_all(
            b"Connection: Upgrade\r\n\
              Upgrade: websocket\r\n\
              Sec-WebSocket-Version: 13\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .await
        .unwrap();

    let mut response = Vec::new();
    read_until(&mut stream, &mut response, b"\r\n\r\n").await;
    assert!(response.starts_with(b"HTTP/1.1 101"));

    // the first frame is the waiting notice
    read_until(&mut stream, &mut response, br#"{"type":"waiting"}"#).await;
}
