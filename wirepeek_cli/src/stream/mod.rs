//! Live connection to the inspector's push channel

pub mod connection;
pub mod decoder;

pub use connection::{ConnectionStatus, ReconnectPolicy, StreamClient, StreamError, StreamEvent};
pub use decoder::SseDecoder;
