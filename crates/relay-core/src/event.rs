//! Transport event model: the single sequential inbound stream.

use crate::message::InboundMessage;
use crate::session::Credentials;
use serde::{Deserialize, Serialize};

/// Why a transport connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The account was unlinked. Terminal; no automatic reconnect.
    LoggedOut,
    ConnectionLost,
    RestartRequired,
    Other(String),
}

impl CloseReason {
    /// Only a logged-out close is terminal; everything else is transient.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// Connection lifecycle events emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionEvent {
    Open,
    /// A scannable pairing code; rotated periodically by the network.
    Qr { data: String },
    /// A phone-pair code surfaced by the network itself.
    PairCode { code: String },
    Closed { reason: CloseReason },
}

/// A single event on the inbound stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    Connection(ConnectionEvent),
    Message(InboundMessage),
    /// Updated credential material to persist immediately, in any state.
    Credentials(Credentials),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_close_reasons() {
        assert!(CloseReason::LoggedOut.is_terminal());
        assert!(!CloseReason::ConnectionLost.is_terminal());
        assert!(!CloseReason::RestartRequired.is_terminal());
        assert!(!CloseReason::Other("server flap".into()).is_terminal());
    }

    #[test]
    fn test_wire_decode_connection_open() {
        let ev: TransportEvent =
            serde_json::from_str(r#"{"type":"connection","state":"open"}"#).unwrap();
        assert!(matches!(
            ev,
            TransportEvent::Connection(ConnectionEvent::Open)
        ));
    }

    #[test]
    fn test_wire_decode_close_logged_out() {
        let ev: TransportEvent = serde_json::from_str(
            r#"{"type":"connection","state":"closed","reason":"logged_out"}"#,
        )
        .unwrap();
        match ev {
            TransportEvent::Connection(ConnectionEvent::Closed { reason }) => {
                assert!(reason.is_terminal())
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_wire_decode_message() {
        let ev: TransportEvent = serde_json::from_str(
            r#"{"type":"message","conversation_id":"123@chat","text":"hello","is_group":false}"#,
        )
        .unwrap();
        match ev {
            TransportEvent::Message(msg) => {
                assert_eq!(msg.conversation_id, "123@chat");
                assert_eq!(msg.text, "hello");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_wire_decode_credentials() {
        let ev: TransportEvent = serde_json::from_str(
            r#"{"type":"credentials","registered":true,"material":{"noise_key":"abc"}}"#,
        )
        .unwrap();
        match ev {
            TransportEvent::Credentials(creds) => assert!(creds.registered),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
