//! Chat command parsing and handling.
//!
//! A message whose text starts with the configured prefix is a command and
//! bypasses the reply engine entirely. Unknown command names get a pointer
//! to `help` rather than silence.

use relay_core::message::OutboundPayload;
use relay_core::traits::{MediaSource, QuoteSource};
use relay_memory::MemoryStore;
use std::sync::Arc;
use tracing::warn;

/// Shown when the quote provider is unreachable.
const QUOTE_FALLBACK: &str = "No quote available right now, try again later.";
/// Substitute image when generation fails; the caption still carries the prompt.
const IMAGE_FALLBACK_URL: &str = "https://via.placeholder.com/512?text=Image+Error";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quote,
    Reset,
    Image(String),
    Unknown(String),
}

impl Command {
    /// Parse `text` against the command prefix. `None` means the message is
    /// ordinary conversation, not a command.
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix(prefix)?;
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        match name.to_ascii_lowercase().as_str() {
            "help" => Some(Self::Help),
            "quote" => Some(Self::Quote),
            "reset" => Some(Self::Reset),
            "img" | "image" => Some(Self::Image(args.to_string())),
            other => Some(Self::Unknown(other.to_string())),
        }
    }
}

/// Everything a command handler can touch.
pub struct CommandContext {
    pub memory: MemoryStore,
    pub quotes: Arc<dyn QuoteSource>,
    pub media: Arc<dyn MediaSource>,
    pub prefix: String,
}

impl CommandContext {
    /// Execute a command for a conversation. Always produces a reply;
    /// provider failures degrade to fallback content instead of errors.
    pub async fn handle(&self, command: Command, conversation_id: &str) -> OutboundPayload {
        match command {
            Command::Help => OutboundPayload::text(self.help_text()),
            Command::Quote => match self.quotes.random_quote().await {
                Ok(quote) => OutboundPayload::text(quote),
                Err(e) => {
                    warn!("Quote lookup failed: {e}");
                    OutboundPayload::text(QUOTE_FALLBACK)
                }
            },
            Command::Reset => {
                self.memory.clear(conversation_id);
                OutboundPayload::text("Conversation memory cleared.")
            }
            Command::Image(prompt) => {
                if prompt.is_empty() {
                    return OutboundPayload::text(format!(
                        "Usage: {}img <description of the image>",
                        self.prefix
                    ));
                }
                match self.media.image_url(&prompt).await {
                    Ok(url) => OutboundPayload::Image {
                        url,
                        caption: prompt,
                    },
                    Err(e) => {
                        warn!("Image generation failed: {e}");
                        OutboundPayload::Image {
                            url: IMAGE_FALLBACK_URL.to_string(),
                            caption: prompt,
                        }
                    }
                }
            }
            Command::Unknown(name) => OutboundPayload::text(format!(
                "Unknown command: {prefix}{name}. Send {prefix}help for the list.",
                prefix = self.prefix
            )),
        }
    }

    fn help_text(&self) -> String {
        let p = &self.prefix;
        format!(
            "Available commands:\n\
             {p}help - show this message\n\
             {p}quote - a random quote\n\
             {p}img <prompt> - generate an image\n\
             {p}reset - clear this conversation's memory\n\
             Anything else gets an AI reply."
        )
    }
}
