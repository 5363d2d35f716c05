//! Client for the OpenAI / Azure OpenAI realtime WebSocket API.
//!
//! - `endpoint`: builds the authenticated upgrade request for either service.
//! - `client`: the tokio-tungstenite backed connection.
//!
//! Callers program against [`RealtimeTransport`] and [`Connector`] so the
//! session loop can run against a scripted transport in tests.

pub mod client;
pub mod endpoint;

pub use client::{RealtimeClient, WebSocketConnector};
pub use endpoint::Endpoint;
pub use openai_realtime_types as types;

use anyhow::Result;
use async_trait::async_trait;
use openai_realtime_types::{ClientEvent, ServerEvent};
use secrecy::SecretString;

/// One open realtime connection.
#[async_trait]
pub trait RealtimeTransport: Send {
    /// Serializes and sends one client event.
    async fn send(&mut self, event: &ClientEvent) -> Result<()>;

    /// Waits for the next server event.
    ///
    /// Returns `None` once the stream has ended. A malformed payload or a
    /// socket failure is returned as `Some(Err(_))`.
    async fn next_event(&mut self) -> Option<Result<ServerEvent>>;

    /// Closes the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;
}

/// Opens realtime connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        api_key: &SecretString,
    ) -> Result<Box<dyn RealtimeTransport>>;
}
