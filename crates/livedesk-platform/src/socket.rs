// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Websocket implementation of [`EventSocket`].

use async_trait::async_trait;
use futures::StreamExt;
use livedesk_core::{EventSocket, LivedeskError};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A notification socket over `ws://` or `wss://`.
///
/// Pings are answered by tungstenite on the next read; binary frames are
/// ignored.
pub struct WsSocket {
    ws: Option<Ws>,
}

impl WsSocket {
    pub async fn connect(uri: &str) -> Result<Self, LivedeskError> {
        let (ws, _response) = tokio_tungstenite::connect_async(uri).await.map_err(|e| {
            LivedeskError::Transport {
                message: format!("websocket connect failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        debug!(uri, "websocket connected");
        Ok(Self { ws: Some(ws) })
    }
}

#[async_trait]
impl EventSocket for WsSocket {
    async fn next_frame(&mut self) -> Option<Result<String, LivedeskError>> {
        loop {
            let ws = self.ws.as_mut()?;
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "websocket closed by server");
                    self.ws = None;
                    return None;
                }
                Some(Ok(other)) => {
                    trace!(kind = ?std::mem::discriminant(&other), "ignoring non-text frame");
                }
                Some(Err(e)) => {
                    self.ws = None;
                    return Some(Err(LivedeskError::Transport {
                        message: format!("websocket read failed: {e}"),
                        source: Some(Box::new(e)),
                    }));
                }
                None => {
                    self.ws = None;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None).await;
        }
    }
}
