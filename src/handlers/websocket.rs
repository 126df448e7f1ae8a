use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use warp::hyper::HeaderMap;
use warp::ws::{Message, WebSocket, Ws};
use warp::Reply;

use crate::auth::token::TokenVerifier;
use crate::core::connection::Connection;
use crate::core::registry::RoomRegistry;
use crate::handlers::auth::{connection_from_token, extract_token, token_subprotocol};
use crate::security_logger::SecurityLogger;

/// First message sent on a socket: who is already here
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "connected")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub room_id: String,
    pub room_slug: String,
    pub users: Vec<String>,
}

// Handle one authenticated socket for the lifetime of its room membership
pub async fn handle_presence_socket(
    ws: WebSocket,
    room_id: String,
    connection: Connection,
    registry: Arc<RoomRegistry>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let room = registry.get_or_create(&room_id, &room_id).await;
    let (mut events, welcome) = {
        let mut room = room.lock().await;
        let events = room.subscribe();
        room.add_connection(connection.clone());

        let mut users: Vec<String> = room.get_usernames().into_iter().collect();
        users.sort();
        let welcome = ConnectedMessage {
            connection_id: connection.id().to_string(),
            room_id: room.room_id().to_string(),
            room_slug: room.room_slug().to_string(),
            users,
        };
        (events, welcome)
    };
    drop(room);

    info!(
        "Connection {} ({}) opened in room {}",
        connection.id(),
        connection.user_id(),
        room_id
    );

    match serde_json::to_string(&welcome) {
        Ok(text) => {
            if let Err(e) = ws_tx.send(Message::text(text)).await {
                error!("Failed to send welcome message: {}", e);
            }
        }
        Err(e) => error!("Failed to serialize welcome message: {}", e),
    }

    // Forward room presence events to this socket
    let forwarder = tokio::task::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize presence event: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::text(text)).await {
                debug!("Failed to forward presence event: {}", e);
                break;
            }
        }
    });

    // Inbound traffic is not part of presence; read until the socket closes
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error on {}: {}", connection.id(), e);
                break;
            }
        }
    }

    forwarder.abort();
    registry.remove_connection(&room_id, &connection).await;
    info!("Connection {} closed in room {}", connection.id(), room_id);
}

/// Authenticate the upgrade request by bearer token, then hand the socket to the room
pub async fn upgrade_presence_socket(
    room_id: String,
    ws: Ws,
    headers: HeaderMap,
    verifier: Arc<dyn TokenVerifier>,
    registry: Arc<RoomRegistry>,
    security_logger: Arc<SecurityLogger>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let Some(token) = extract_token(&headers) else {
        debug!("Rejected socket for room {}: no token", room_id);
        return Ok(warp::reply::with_status("Unauthorized", StatusCode::UNAUTHORIZED).into_response());
    };

    match connection_from_token(&token, verifier.as_ref(), Some(&security_logger)).await {
        Ok(connection) => {
            let reply = ws.on_upgrade(move |socket| {
                handle_presence_socket(socket, room_id, connection, registry)
            });
            Ok(with_token_subprotocol(reply, &headers))
        }
        Err(e) => {
            debug!("Rejected socket for room {}: {}", room_id, e);
            Ok(warp::reply::with_status("Unauthorized", StatusCode::UNAUTHORIZED).into_response())
        }
    }
}

/// Echo the token-carrying subprotocol, if the client offered one
pub fn with_token_subprotocol(reply: impl Reply, headers: &HeaderMap) -> warp::reply::Response {
    let mut response = reply.into_response();
    if let Some(value) = token_subprotocol(headers).and_then(|p| HeaderValue::from_str(&p).ok()) {
        response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }
    response
}
