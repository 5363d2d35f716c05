//! Terminal console for realtime voice and chat sessions.
//!
//! - `app`: the runtime loop that owns the view and the session.
//! - `session`: one open connection with its recorder and player.
//! - `audio`: microphone capture and speaker playback.
//! - `ui`: line commands and the transcript renderer.
//! - `config`: environment configuration.

pub mod app;
pub mod audio;
pub mod config;
pub mod session;
pub mod ui;
