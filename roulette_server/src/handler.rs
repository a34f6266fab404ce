//! HTTP surface: WebSocket sessions plus plain-text health and info replies
//!
//! Any request carrying a WebSocket upgrade becomes a session that feeds the
//! dispatcher. `GET /health` answers `OK` for load balancers; every other
//! `GET` gets a short page describing the protocol.

use crate::dispatcher::DispatcherHandle;
use crate::error::{ClientRequestError, SignalingError};
use crate::registry::ConnectionHandle;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use roulette_protocol::{ClientId, ClientRequest};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

const INFO_PAGE: &str = "WebSocket server is running\n\
    \n\
    Connect with a WebSocket client to be paired with another visitor.\n\
    Send {\"type\":\"request_new_peer\"} to skip to someone else,\n\
    {\"type\":\"report_user\",\"reportedPeerId\":<id>,\"reason\":\"...\"} to report your partner.\n\
    Any other JSON object is relayed to your partner with a senderId field.\n";

/// Routes served on the signaling port
pub fn build_router(dispatcher: DispatcherHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(entry_handler)
        .with_state(dispatcher)
        .layer(CorsLayer::permissive())
}

async fn health_handler() -> &'static str {
    "OK"
}

/// WebSocket upgrades on any path, the info page for other `GET`s
async fn entry_handler(
    method: Method,
    State(dispatcher): State<DispatcherHandle>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, dispatcher))
            .into_response(),
        Err(_) if method == Method::GET => INFO_PAGE.into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

/// Turn one WebSocket frame into a request, if it carries one
fn parse_request(
    frame: Result<Message, axum::Error>,
) -> Result<Option<ClientRequest>, ClientRequestError> {
    match frame? {
        Message::Text(text) => Ok(Some(text.as_str().parse()?)),
        Message::Close(_) => Err(ClientRequestError::Close),
        Message::Ping(_) | Message::Pong(_) => Ok(None),
        Message::Binary(_) => Err(ClientRequestError::UnsupportedType),
    }
}

async fn handle_socket(socket: WebSocket, dispatcher: DispatcherHandle) {
    if let Err(e) = run_session(socket, dispatcher).await {
        debug!(error = %e, "connection ended with error");
    }
}

async fn run_session(socket: WebSocket, dispatcher: DispatcherHandle) -> Result<(), SignalingError> {
    let (mut sink, mut source) = socket.split();

    let (handle, mut outbound) = ConnectionHandle::channel();
    let client_id = dispatcher.connect(handle).await?;

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Text(event.to_string().into())).await {
                debug!(%client_id, error = %e, "failed to write to client");
                break;
            }
        }
        // once the core drops the handle there is nothing more to send
        let _ = sink.close().await;
    });

    let result = read_requests(client_id, &mut source, &dispatcher).await;
    if result.is_err() {
        writer.abort();
    }
    result
}

async fn read_requests<S>(
    client_id: ClientId,
    source: &mut S,
    dispatcher: &DispatcherHandle,
) -> Result<(), SignalingError>
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        match parse_request(frame) {
            Ok(Some(request)) => {
                debug!(%client_id, kind = request.kind(), "request received");
                dispatcher.message(client_id, request).await?;
            }
            Ok(None) => {}
            Err(ClientRequestError::Close) => break,
            Err(ClientRequestError::Protocol(e)) => {
                warn!(%client_id, error = %e, "dropping malformed message");
            }
            Err(ClientRequestError::UnsupportedType) => {
                debug!(%client_id, "ignoring non-text frame");
            }
            Err(e @ ClientRequestError::WebSocket(_)) => {
                return dispatcher.error(client_id, e.to_string()).await;
            }
        }
    }
    dispatcher.close(client_id).await
}

/// Serve until `shutdown` completes
pub async fn serve(
    listener: TcpListener,
    dispatcher: DispatcherHandle,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SignalingError> {
    info!(addr = %listener.local_addr()?, "signaling server listening");
    axum::serve(listener, build_router(dispatcher))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
