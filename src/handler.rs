//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake with
//! identity extraction, frame decoding, and the read/write pumps that
//! connect a session to the Hub.

use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::hub::{HubEvent, Route};
use crate::message::{decode_client_message, ClientMessage, ServerMessage};
use crate::types::{ConnectionId, UserId};

/// Header carrying the identity established by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Query parameter fallback for the identity
pub const USER_ID_QUERY: &str = "user_id";

/// Capacity of the reader → writer queue for protocol errors
const LOCAL_QUEUE_CAPACITY: usize = 8;

/// Accept connections forever, spawning a handler task for each
pub async fn serve(
    listener: TcpListener,
    events: mpsc::Sender<HubEvent>,
    outbound_capacity: usize,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let events = events.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, events, outbound_capacity).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, resolves the user identity, and runs
/// the session until either side ends it.
pub async fn handle_connection(
    stream: TcpStream,
    events: mpsc::Sender<HubEvent>,
    outbound_capacity: usize,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let mut identity = None;
    let handshake = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| match user_id_from_request(request) {
            Some(user_id) => {
                identity = Some(user_id);
                Ok(response)
            }
            None => Err(unauthorized()),
        },
    )
    .await;

    let ws_stream = match handshake {
        Ok(ws_stream) => ws_stream,
        Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
            warn!("Rejected unauthenticated upgrade from {}", peer_addr);
            return Err(AppError::Unauthorized);
        }
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer_addr, e);
            return Err(e.into());
        }
    };
    // the callback only accepts once it has captured an identity
    let Some(user_id) = identity else {
        return Err(AppError::Unauthorized);
    };

    info!(%user_id, "Session established from {}", peer_addr);

    let (ws_sender, ws_receiver) = ws_stream.split();
    run_session(user_id, ws_receiver, ws_sender, events, outbound_capacity).await
}

/// Read the user id from the identity header, falling back to the query string
pub fn user_id_from_request(request: &Request) -> Option<UserId> {
    if let Some(value) = request.headers().get(USER_ID_HEADER) {
        return value.to_str().ok().and_then(UserId::parse);
    }

    request.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == USER_ID_QUERY)
            .and_then(|(_, value)| UserId::parse(value))
    })
}

/// 401 response for a handshake without identity
fn unauthorized() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("missing or invalid user identity".to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

/// Run one client session
///
/// Registers with the Hub, runs the read and write pumps, and reports
/// `Disconnected` exactly once when the first of them ends.
pub async fn run_session<St, Si>(
    user_id: UserId,
    stream: St,
    sink: Si,
    events: mpsc::Sender<HubEvent>,
    outbound_capacity: usize,
) -> Result<(), AppError>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin + Send + 'static,
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
{
    let connection_id = ConnectionId::new();

    // Hub -> client messages; the Hub holds the only sender
    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerMessage>(outbound_capacity);
    // Reader -> writer protocol errors
    let (local_tx, local_rx) = mpsc::channel::<ServerMessage>(LOCAL_QUEUE_CAPACITY);

    if events
        .send(HubEvent::Connected {
            user_id,
            connection_id,
            sender: outbound_tx,
        })
        .await
        .is_err()
    {
        error!(%user_id, "Failed to register client - hub closed");
        return Err(AppError::ChannelSend);
    }

    let mut read_task = tokio::spawn(read_pump(
        user_id,
        connection_id,
        stream,
        events.clone(),
        local_tx,
    ));
    let mut write_task = tokio::spawn(write_pump(connection_id, sink, outbound_rx, local_rx));

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!(%user_id, %connection_id, "Read task completed");
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!(%user_id, %connection_id, "Write task completed");
            read_task.abort();
        }
    }

    let _ = events
        .send(HubEvent::Disconnected {
            user_id,
            connection_id,
        })
        .await;

    info!(%user_id, %connection_id, "Session closed");

    Ok(())
}

/// Read pump: frames in, hub events out
///
/// Protocol errors are answered through the local queue and never reach the Hub.
pub async fn read_pump<St>(
    user_id: UserId,
    connection_id: ConnectionId,
    mut stream: St,
    events: mpsc::Sender<HubEvent>,
    local: mpsc::Sender<ServerMessage>,
) where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode_client_message(&text)
                .and_then(|msg| client_message_to_event(user_id, connection_id, msg))
            {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        debug!(%user_id, "Hub closed, ending read task");
                        break;
                    }
                }
                Err(e) => {
                    warn!(%user_id, "Invalid frame: {}", e);
                    if local.try_send(e.into()).is_err() {
                        debug!(%user_id, "Protocol error reply dropped");
                    }
                }
            },
            Ok(Message::Close(_)) => {
                debug!(%user_id, "Client sent close frame");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Pong is handled automatically by tungstenite
                debug!(%user_id, "Ping/pong");
            }
            Ok(_) => {
                // Binary or raw frames - ignore
            }
            Err(e) => {
                error!(%user_id, "WebSocket error: {}", e);
                break;
            }
        }
    }
    debug!(%user_id, %connection_id, "Read task ended");
}

/// Write pump: the only place that sends on the session
///
/// Ends with a close frame once the Hub drops the outbound queue, or as
/// soon as a send fails.
pub async fn write_pump<Si>(
    connection_id: ConnectionId,
    mut sink: Si,
    mut outbound: mpsc::Receiver<ServerMessage>,
    mut local: mpsc::Receiver<ServerMessage>,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    loop {
        let msg = tokio::select! {
            biased;
            Some(msg) = local.recv() => msg,
            msg = outbound.recv() => match msg {
                Some(msg) => msg,
                None => {
                    debug!(%connection_id, "Outbound queue closed, closing socket");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        };

        match serde_json::to_string(&msg) {
            Ok(json) => {
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    debug!(%connection_id, "WebSocket send failed, ending write task: {}", e);
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                // Continue - don't break on serialization errors
            }
        }
    }

    let _ = sink.close().await;
    debug!(%connection_id, "Write task ended");
}

/// Convert a ClientMessage to a HubEvent
///
/// Unknown message types are rejected here, before they reach the Hub.
fn client_message_to_event(
    user_id: UserId,
    connection_id: ConnectionId,
    msg: ClientMessage,
) -> Result<HubEvent, AppError> {
    let route = match msg {
        ClientMessage::JoinRandom => {
            return Ok(HubEvent::JoinRandom {
                user_id,
                connection_id,
            })
        }
        ClientMessage::LeaveRandom => {
            return Ok(HubEvent::LeaveRandom {
                user_id,
                connection_id,
            })
        }
        ClientMessage::MessageRandom { content } => Route::Random { content },
        ClientMessage::DirectMessage { to, content } => Route::Direct { to, content },
        ClientMessage::FriendRequest => Route::FriendRequest,
        ClientMessage::Unknown => return Err(AppError::InvalidMessageType),
    };

    Ok(HubEvent::RouteMessage {
        user_id,
        connection_id,
        route,
    })
}
