use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the single logical messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session. Initial state, and the state after an explicit stop.
    Idle,
    /// A connection attempt is in progress.
    Connecting,
    /// Waiting for the operator to scan a QR code.
    AwaitingQr,
    /// Waiting for the operator to enter a phone-pair code.
    AwaitingPairCode,
    /// Connected and processing messages.
    Open,
    /// Bounded reconnection exhausted; operator intervention required.
    Degraded,
    /// Logged out by the network. Terminal until re-registration.
    Closed,
}

impl SessionStatus {
    /// Whether a session task is (or should be) live in this state.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingQr | Self::AwaitingPairCode | Self::Open
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingQr => "awaiting_qr",
            Self::AwaitingPairCode => "awaiting_pair_code",
            Self::Open => "open",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The artifact an operator needs to authenticate a fresh session.
/// At most one exists at a time; cleared the moment the session opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PairingArtifact {
    /// Scannable QR payload.
    Qr(String),
    /// Short numeric phone-pair code.
    PairCode(String),
}

/// Session credentials. The key material is opaque to relay; the transport
/// owns its shape. `registered` gates whether pairing is needed at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub material: serde_json::Value,
}
