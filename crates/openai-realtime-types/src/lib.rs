//! Wire types for the OpenAI realtime protocol.
//!
//! Every message on the realtime WebSocket is a JSON object with a `type`
//! discriminator. Outbound messages are modeled by [`ClientEvent`], inbound
//! ones by [`ServerEvent`]; both are internally tagged serde enums so a match
//! over them is exhaustive at compile time.

pub mod client_event;
pub mod item;
pub mod server_event;
pub mod session;

pub use client_event::{ClientEvent, ResponseConfig};
pub use item::{ContentPart, Item, ItemStatus, ItemType, Response, ResponseStatus, Role};
pub use server_event::{ApiError, RateLimit, ServerEvent};
pub use session::{
    AudioFormat, InputAudioTranscription, Modality, SessionConfig, ToolDefinition, TurnDetection,
    Voice,
};
