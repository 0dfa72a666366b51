//! The message routing pipeline.

use super::Gateway;
use crate::commands::Command;
use relay_core::error::RelayError;
use relay_core::message::{InboundMessage, OutboundPayload, Turn};
use relay_memory::LogEntry;
use tracing::{debug, warn};

/// Sent when the reply engine fails; the conversation must never go silent.
const FALLBACK_REPLY: &str = "Sorry, I can't reply right now. Please try again in a moment.";

const REACT_WORKING: &str = "⏳";
const REACT_DONE: &str = "✅";

impl Gateway {
    /// Route one inbound message end to end.
    pub(crate) async fn handle_message(&self, msg: InboundMessage) -> Result<(), RelayError> {
        // Our own echoes and empty payloads carry nothing to act on.
        if msg.from_me {
            return Ok(());
        }
        let text = msg.text.trim();
        if text.is_empty() {
            return Ok(());
        }

        // Group messages must mention us explicitly.
        if msg.is_group
            && (self.bot_id.is_empty() || !msg.mentioned_ids.iter().any(|id| id == &self.bot_id))
        {
            debug!(
                "Ignoring group message without mention in {}",
                msg.conversation_id
            );
            return Ok(());
        }
        let text = self.strip_mention(text);

        // Log appends are best-effort; a storage hiccup must not silence
        // the reply path.
        if let Err(e) = self
            .log
            .append(&LogEntry::inbound(&msg.conversation_id, &text))
            .await
        {
            warn!("Failed to log inbound message: {e}");
        }
        self.react(&msg, REACT_WORKING).await;

        let payload = match Command::parse(&text, &self.command_prefix) {
            Some(command) => self.commands.handle(command, &msg.conversation_id).await,
            None => self.reply(&msg.conversation_id, &text).await,
        };

        self.deliver(&msg.conversation_id, &payload).await?;
        self.react(&msg, REACT_DONE).await;
        Ok(())
    }

    /// Generate a conversational reply over the bounded history.
    async fn reply(&self, conversation_id: &str, text: &str) -> OutboundPayload {
        self.memory.append(conversation_id, Turn::user(text));
        let history = self.memory.history(conversation_id);

        match self.engine.complete(&history).await {
            Ok(reply) => {
                self.memory
                    .append(conversation_id, Turn::assistant(reply.clone()));
                OutboundPayload::text(self.sign(&reply))
            }
            Err(e) => {
                // The fallback still counts as the assistant's turn.
                warn!("Reply engine failed for {conversation_id}: {e}");
                self.memory
                    .append(conversation_id, Turn::assistant(FALLBACK_REPLY));
                OutboundPayload::text(FALLBACK_REPLY)
            }
        }
    }

    /// Log the outbound entry, then send. A send failure after logging is
    /// visible in the activity log as an unanswered delivery.
    pub(crate) async fn deliver(
        &self,
        conversation_id: &str,
        payload: &OutboundPayload,
    ) -> Result<(), RelayError> {
        if let Err(e) = self
            .log
            .append(&LogEntry::outbound(conversation_id, payload.preview()))
            .await
        {
            warn!("Failed to log outbound message: {e}");
        }
        self.transport.send(conversation_id, payload).await
    }

    /// Best-effort reaction; failures are logged and swallowed.
    async fn react(&self, msg: &InboundMessage, emoji: &str) {
        if !self.reactions {
            return;
        }
        let Some(message_ref) = &msg.message_ref else {
            return;
        };
        if let Err(e) = self
            .transport
            .react(&msg.conversation_id, message_ref, emoji)
            .await
        {
            debug!("Reaction failed: {e}");
        }
    }

    fn sign(&self, reply: &str) -> String {
        if self.signature.is_empty() {
            reply.to_string()
        } else {
            format!("{reply}\n\n{}", self.signature)
        }
    }

    /// Drop our own mention token so the engine never sees it.
    fn strip_mention(&self, text: &str) -> String {
        if self.bot_id.is_empty() {
            return text.to_string();
        }
        let tag = format!("@{}", self.bot_id);
        text.replace(&tag, "").trim().to_string()
    }
}
