use thiserror::Error;

/// Top-level error type for relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Error from the messaging transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Session lifecycle error.
    #[error("session error: {0}")]
    Session(String),

    /// Error from the reply engine or another content provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
