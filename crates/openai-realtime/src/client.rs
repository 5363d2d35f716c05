use crate::{Connector, RealtimeTransport, endpoint::Endpoint};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use openai_realtime_types::{ClientEvent, ServerEvent};
use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, trace, warn};

/// A realtime connection over tokio-tungstenite.
pub struct RealtimeClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl RealtimeClient {
    /// Connects and authenticates against `endpoint`.
    pub async fn connect(endpoint: &Endpoint, api_key: &SecretString) -> Result<Self> {
        let request = endpoint.request(api_key)?;
        let (stream, _) = connect_async(request)
            .await
            .context("Failed to connect to realtime WebSocket")?;
        info!(azure = endpoint.is_azure(), "Connected to realtime API.");
        Ok(Self {
            stream,
            closed: false,
        })
    }
}

#[async_trait]
impl RealtimeTransport for RealtimeClient {
    async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        let text = serde_json::to_string(event)?;
        match event {
            ClientEvent::InputAudioBufferAppend { .. } => trace!(kind = event.kind(), "send"),
            _ => debug!(kind = event.kind(), "send"),
        }
        self.stream
            .send(WsMessage::Text(text.into()))
            .await
            .with_context(|| format!("Failed to send '{}'", event.kind()))?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<ServerEvent>> {
        while let Some(msg_result) = self.stream.next().await {
            match msg_result {
                Ok(WsMessage::Text(text)) => {
                    return Some(
                        serde_json::from_str::<ServerEvent>(&text)
                            .context("Malformed realtime server event"),
                    );
                }
                Ok(WsMessage::Close(frame)) => {
                    info!(?frame, "Realtime server closed the connection.");
                    self.closed = true;
                    return None;
                }
                Ok(WsMessage::Binary(data)) => {
                    warn!(len = data.len(), "Ignoring unexpected binary frame.");
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .context("Failed to close realtime WebSocket")
    }
}

/// Opens [`RealtimeClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        api_key: &SecretString,
    ) -> Result<Box<dyn RealtimeTransport>> {
        Ok(Box::new(RealtimeClient::connect(endpoint, api_key).await?))
    }
}
