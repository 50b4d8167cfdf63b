//! Viewer WebSocket: handshake and connection adapter.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use esplot_core::connection::{Connection, Inbound, InboundHalf, OutboundHalf};
use esplot_core::{session, Payload, TransportError};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket upgrade handler.
///
/// A request that cannot be upgraded is answered with the upgrade rejection
/// and never reaches the hub.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected viewer handshake");
            return rejection.into_response();
        }
    };

    ws.on_failed_upgrade(|e| warn!(error = %e, "Viewer connection upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register an upgraded socket as a viewer session.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = WsConnection::new(socket);
    match session::attach(connection, &state.hub, state.config.queue_capacity).await {
        Ok((session_id, _task)) => {
            info!(session_id = %session_id, "Viewer connected");
        }
        Err(e) => {
            warn!(error = %e, "Could not register viewer, dropping connection");
        }
    }
}

/// [`Connection`] over an axum WebSocket.
pub struct WsConnection {
    socket: WebSocket,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

pub struct WsOutbound {
    sink: SplitSink<WebSocket, Message>,
}

pub struct WsInbound {
    stream: SplitStream<WebSocket>,
}

impl Connection for WsConnection {
    type Outbound = WsOutbound;
    type Inbound = WsInbound;

    fn split(self) -> (WsOutbound, WsInbound) {
        let (sink, stream) = self.socket.split();
        (WsOutbound { sink }, WsInbound { stream })
    }
}

#[async_trait]
impl OutboundHalf for WsOutbound {
    async fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        let message = match payload.as_text() {
            Some(text) => Message::Text(text.to_owned().into()),
            None => Message::Binary(payload.bytes().clone()),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::send(e.to_string()))
    }

    async fn close(&mut self) {
        // Either call fails if the viewer is already gone.
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!(error = %e, "Close frame not sent");
        }
        let _ = self.sink.close().await;
    }
}

#[async_trait]
impl InboundHalf for WsInbound {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        let message = self.stream.next().await?;
        Some(match message {
            Ok(Message::Close(_)) => Ok(Inbound::Close),
            Ok(Message::Text(text)) => Ok(Inbound::Message(Bytes::copy_from_slice(
                text.as_str().as_bytes(),
            ))),
            Ok(Message::Binary(data)) | Ok(Message::Ping(data)) | Ok(Message::Pong(data)) => {
                Ok(Inbound::Message(data))
            }
            Err(e) => Err(TransportError::receive(e.to_string())),
        })
    }
}
