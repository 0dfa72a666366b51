use crate::{
    error::RelayError,
    event::TransportEvent,
    message::{OutboundPayload, Turn},
    session::Credentials,
};
use async_trait::async_trait;

/// Transport boundary: the external protocol client.
///
/// The actual messaging protocol lives outside this crate; relay only
/// consumes the event stream and issues send operations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name.
    fn name(&self) -> &str;

    /// Open the connection and return the sequential inbound event stream.
    /// A fresh receiver is returned on every call; any previous stream is
    /// considered dead.
    async fn connect(&self) -> Result<tokio::sync::mpsc::Receiver<TransportEvent>, RelayError>;

    /// Send a payload to a conversation.
    async fn send(
        &self,
        conversation_id: &str,
        payload: &OutboundPayload,
    ) -> Result<(), RelayError>;

    /// Attach an emoji reaction to a message. Best-effort surface.
    async fn react(
        &self,
        conversation_id: &str,
        message_ref: &str,
        emoji: &str,
    ) -> Result<(), RelayError>;

    /// Request a phone-pair code for a never-registered session.
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, RelayError>;

    /// Tear down the connection promptly.
    async fn disconnect(&self) -> Result<(), RelayError>;
}

/// Reply engine boundary.
///
/// One completion attempt over the bounded history, bounded by the
/// implementation's own timeout. The caller supplies the fallback text.
#[async_trait]
pub trait ReplyEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, history: &[Turn]) -> Result<String, RelayError>;

    /// Check whether the engine is reachable and ready.
    async fn is_available(&self) -> bool;
}

/// Credential persistence boundary.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted credentials, `None` when never saved.
    async fn load(&self) -> Result<Option<Credentials>, RelayError>;

    /// Persist the latest credentials. Must be idempotent.
    async fn save(&self, credentials: &Credentials) -> Result<(), RelayError>;
}

/// Image generation boundary.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Generate an image for the prompt and return its URL.
    async fn image_url(&self, prompt: &str) -> Result<String, RelayError>;
}

/// Quote lookup boundary.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn random_quote(&self) -> Result<String, RelayError>;
}
