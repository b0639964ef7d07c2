//! Streaming chat client for the AI Chef recipe assistant.
//! Session token, transcript store, stream ingestion engine and a terminal view.

pub mod client;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod logging;
pub mod messages;
pub mod render;
pub mod session;
pub mod transcript;
pub mod view;

pub use client::{ChatClient, ExchangeError};
pub use config::{default_config_path, Config, ConfigError, Settings};
pub use engine::{ChatEngine, ChatTexts, IgnoreReason, SubmitOutcome};
pub use session::SessionToken;
pub use transcript::{Message, Sender, Transcript, TranscriptChange, TranscriptObserver};
pub use view::{DisplayMode, TerminalView};
