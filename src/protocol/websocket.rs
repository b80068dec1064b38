// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket connection to the hub API.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ProtocolError;

use super::{HubConnection, HubMessage, HubRequest};

/// Hub connection over a WebSocket.
///
/// # Examples
///
/// ```no_run
/// use larnitech_bridge::protocol::{HubConnection, HubRequest, WsConnection};
///
/// # async fn example() -> larnitech_bridge::Result<()> {
/// let mut conn = WsConnection::connect("ws://192.168.1.10:8080/api").await?;
/// conn.send(&HubRequest::authorize("secret")).await?;
/// let reply = conn.recv().await?;
/// println!("{}", reply.describe());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl WsConnection {
    /// Opens a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ConnectionFailed`] if the handshake fails.
    pub async fn connect(url: &str) -> Result<Self, ProtocolError> {
        tracing::info!(url = %url, "Connecting to hub");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ProtocolError::ConnectionFailed(format!("{url}: {e}")))?;

        tracing::info!(url = %url, "Connected to hub");

        Ok(Self {
            stream,
            url: url.to_string(),
        })
    }

    /// Returns the URL the connection was opened with.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HubConnection for WsConnection {
    async fn send(&mut self, request: &HubRequest) -> Result<(), ProtocolError> {
        let frame = request.to_json()?;
        self.stream
            .send(Message::text(frame))
            .await
            .map_err(|e| ProtocolError::WebSocket(Box::new(e)))
    }

    async fn recv(&mut self) -> Result<HubMessage, ProtocolError> {
        loop {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(ProtocolError::WebSocket(Box::new(e))),
                None => return Err(ProtocolError::ConnectionClosed),
            };

            match frame {
                Message::Text(text) => return HubMessage::parse(text.as_str()),
                // The hub sometimes sends text as binary frames.
                Message::Binary(bytes) => {
                    return HubMessage::parse(&String::from_utf8_lossy(&bytes));
                }
                Message::Close(frame) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "Hub closed the connection");
                    }
                    return Err(ProtocolError::ConnectionClosed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    tracing::trace!("WebSocket control frame");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        tracing::info!(url = %self.url, "Closing hub connection");
        match self.stream.close(None).await {
            Ok(()) | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(ProtocolError::WebSocket(Box::new(e))),
        }
    }
}
