use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn new_id() -> Uuid {
    Uuid::new_v4()
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// An inbound message from the transport. Produced once per network event
/// and consumed once by the conversation router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Stable conversation key (remote participant or group identifier).
    pub conversation_id: String,
    /// Human-readable sender name, when the transport knows it.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Message text content.
    #[serde(default)]
    pub text: String,
    /// Whether this message comes from a group chat.
    #[serde(default)]
    pub is_group: bool,
    /// Identities tagged in a group message.
    #[serde(default)]
    pub mentioned_ids: Vec<String>,
    /// Transport-specific handle for attaching reactions to this message.
    #[serde(default)]
    pub message_ref: Option<String>,
    /// True for our own echoes; the router drops these.
    #[serde(default)]
    pub from_me: bool,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Build a plain direct message. Group and reaction fields default to empty.
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            conversation_id: conversation_id.into(),
            sender_name: None,
            text: text.into(),
            is_group: false,
            mentioned_ids: Vec::new(),
            message_ref: None,
            from_me: false,
            timestamp: now(),
        }
    }
}

/// An outbound payload to send through the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundPayload {
    Text { text: String },
    Image { url: String, caption: String },
}

impl OutboundPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The textual face of the payload, used for activity logging.
    pub fn preview(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Image { caption, .. } => caption,
        }
    }
}

/// Who produced a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a conversation's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_payload_preview() {
        let text = OutboundPayload::text("hello");
        assert_eq!(text.preview(), "hello");

        let image = OutboundPayload::Image {
            url: "https://example.com/a.png".into(),
            caption: "a cat".into(),
        };
        assert_eq!(image.preview(), "a cat");
    }

    #[test]
    fn test_inbound_message_defaults() {
        let msg = InboundMessage::new("123@chat", "hi");
        assert_eq!(msg.conversation_id, "123@chat");
        assert!(!msg.is_group);
        assert!(!msg.from_me);
        assert!(msg.mentioned_ids.is_empty());
    }

    #[test]
    fn test_inbound_message_lenient_decode() {
        // Wire messages only need a conversation id; everything else defaults.
        let msg: InboundMessage =
            serde_json::from_str(r#"{"conversation_id":"42@chat","text":"hey"}"#).unwrap();
        assert_eq!(msg.text, "hey");
        assert!(msg.message_ref.is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
