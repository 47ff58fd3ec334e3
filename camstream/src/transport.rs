//! The duplex connection behind a session.
//!
//! A [`Connector`] opens one [`Transport`] per camera. The WebSocket
//! implementation resolves each camera to `<base>/api/cameras/ws/<camera id>`,
//! where binary messages carry compressed frames and text messages carry JSON
//! telemetry.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use camstream_codecs::{CameraId, CameraRef, Payload};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    WebSocketStream,
};
use url::Url;

#[async_trait]
pub trait Transport: Send {
    /// Next inbound unit in arrival order. `None` once the peer closed the stream.
    async fn next_payload(&mut self) -> Option<Result<Payload, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolves once the transport is ready to deliver payloads.
    async fn connect(&self, camera: &CameraRef) -> Result<Box<dyn Transport>, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    base: Url,
}

impl StreamEndpoint {
    pub const DEFAULT_BASE: &'static str = "ws://localhost:8000";

    /// Accepts `ws`, `wss`, `http` and `https` base urls. The http schemes are
    /// mapped onto their websocket counterparts.
    pub fn new(base: &str) -> Result<Self, TransportError> {
        let mut base =
            Url::parse(base).map_err(|e| TransportError::Address(format!("{base}: {e}")))?;
        let scheme = match base.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(TransportError::Address(format!(
                    "unsupported scheme {other}"
                )))
            }
        };
        base.set_scheme(scheme)
            .map_err(|()| TransportError::Address(format!("cannot use scheme {scheme}")))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::Address(base.to_string()));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url_for(&self, camera: &CameraId) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Address(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "cameras", "ws", camera.as_str()]);
        Ok(url)
    }
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    endpoint: StreamEndpoint,
}

impl WsConnector {
    pub fn new(endpoint: StreamEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, camera: &CameraRef) -> Result<Box<dyn Transport>, TransportError> {
        let url = self.endpoint.url_for(&camera.id)?;
        tracing::info!(camera = %camera.id, "Connecting to {url}");
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(format!("{url}: {e}")))?;
        Ok(Box::new(WsTransport::new(stream)))
    }
}

#[derive(Debug)]
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WsTransport<S> {
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_payload(&mut self) -> Option<Result<Payload, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Binary(data)) => return Some(Ok(Payload::Binary(Bytes::from(data)))),
                Ok(Message::Text(text)) => return Some(Ok(Payload::Text(text))),
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Peer sent close frame {frame:?}");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(tungstenite::Error::ConnectionClosed) => return None,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Shutdown(e.to_string())),
        }
    }
}
