//! WebSocket transport to the Archipelago server.
//!
//! The client loop talks to a [`Transport`] so sessions can run against an
//! in-memory transport in tests. [`Connector`] opens transports for the
//! reconnect loop.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::packets::{decode_frame, encode_frame, ClientPacket, ServerPacket};
use crate::common::error::{ConnectionError, ConnectionResult, Result};

/// Time allowed for the TCP, TLS and WebSocket handshakes of one URL.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Transport: Send {
    /// Send packets as one frame.
    async fn send(&mut self, packets: &[ClientPacket]) -> Result<()>;

    /// Wait for the next frame. `None` once the connection is closed.
    /// A frame that is not valid JSON is an error and ends the session.
    async fn next_packets(&mut self) -> Result<Option<Vec<ServerPacket>>>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, server: &str) -> ConnectionResult<Self::Transport>;
}

/// URLs to try for a configured server address.
///
/// An explicit scheme is used as given; otherwise secure WebSocket is tried
/// before plain.
pub fn candidate_urls(server: &str) -> Vec<String> {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("ws://") || server.starts_with("wss://") {
        vec![server.to_string()]
    } else {
        vec![format!("wss://{}", server), format!("ws://{}", server)]
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    async fn open(url: &str) -> ConnectionResult<Self> {
        let connect = tokio_tungstenite::connect_async(url);
        match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok((stream, _response))) => Ok(Self { stream }),
            Ok(Err(e)) => Err(ConnectionError::ConnectFailed {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ConnectionError::Timeout),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, packets: &[ClientPacket]) -> Result<()> {
        let frame = encode_frame(packets)?;
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(ConnectionError::from)?;
        Ok(())
    }

    async fn next_packets(&mut self) -> Result<Option<Vec<ServerPacket>>> {
        while let Some(message) = self.stream.next().await {
            match message.map_err(ConnectionError::from)? {
                Message::Text(text) => match decode_frame(text.as_str()) {
                    Ok(packets) => return Ok(Some(packets)),
                    Err(e) => {
                        warn!("Undecodable frame, dropping connection: {}", e);
                        return Err(e.into());
                    }
                },
                Message::Close(frame) => {
                    debug!("Server closed the connection: {:?}", frame);
                    return Ok(None);
                }
                // Pongs are sent by tungstenite on the next write or flush
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(ConnectionError::from)?;
        Ok(())
    }
}

/// Opens [`WsTransport`]s, falling back from `wss://` to `ws://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, server: &str) -> ConnectionResult<WsTransport> {
        let mut last_error = None;
        for url in candidate_urls(server) {
            match WsTransport::open(&url).await {
                Ok(transport) => {
                    info!("Connected to {}", url);
                    return Ok(transport);
                }
                Err(e) => {
                    debug!("Could not connect to {}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(ConnectionError::ConnectFailed {
            url: server.to_string(),
            message: "no usable address".to_string(),
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_urls_without_scheme() {
        assert_eq!(
            candidate_urls("archipelago.gg:38281"),
            vec!["wss://archipelago.gg:38281", "ws://archipelago.gg:38281"]
        );
    }

    #[test]
    fn test_candidate_urls_with_scheme() {
        assert_eq!(
            candidate_urls(" ws://localhost:38281/ "),
            vec!["ws://localhost:38281"]
        );
        assert_eq!(
            candidate_urls("wss://example.org:1234"),
            vec!["wss://example.org:1234"]
        );
    }

    #[tokio::test]
    async fn test_memory_transport_round_trip() {
        let (mut transport, handle) = testing::memory_transport();
        handle.push(r#"[{"cmd":"Print","text":"hi"}]"#);
        transport.send(&[ClientPacket::say("hello")]).await.unwrap();

        let packets = transport.next_packets().await.unwrap().unwrap();
        assert_eq!(packets[0].cmd(), "Print");
        assert_eq!(handle.sent(), vec![ClientPacket::say("hello")]);

        drop(handle);
        assert!(transport.next_packets().await.unwrap().is_none());
    }
}
