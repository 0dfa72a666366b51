//! The conversation gateway.
//!
//! Consumes the inbound message stream produced by the session manager and
//! drives each message through the routing pipeline: filters, activity
//! logging, command dispatch or reply generation, and delivery.

mod router;


use crate::commands::CommandContext;
use relay_core::config::Config;
use relay_core::message::InboundMessage;
use relay_core::traits::{MediaSource, QuoteSource, ReplyEngine, Transport};
use relay_memory::{ActivityLog, MemoryStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct Gateway {
    transport: Arc<dyn Transport>,
    engine: Arc<dyn ReplyEngine>,
    memory: MemoryStore,
    log: ActivityLog,
    commands: CommandContext,
    bot_id: String,
    command_prefix: String,
    reactions: bool,
    signature: String,
}

impl Gateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        engine: Arc<dyn ReplyEngine>,
        quotes: Arc<dyn QuoteSource>,
        media: Arc<dyn MediaSource>,
        memory: MemoryStore,
        log: ActivityLog,
    ) -> Self {
        let commands = CommandContext {
            memory: memory.clone(),
            quotes,
            media,
            prefix: config.transport.command_prefix.clone(),
        };
        Self {
            transport,
            engine,
            memory,
            log,
            commands,
            bot_id: config.transport.bot_id.clone(),
            command_prefix: config.transport.command_prefix.clone(),
            reactions: config.transport.reactions,
            signature: config.relay.signature.clone(),
        }
    }

    /// Process messages until the stream closes. One failing message never
    /// takes the loop down.
    pub async fn run(&self, mut messages: mpsc::Receiver<InboundMessage>) {
        info!("Gateway running (engine: {})", self.engine.name());
        while let Some(msg) = messages.recv().await {
            if let Err(e) = self.handle_message(msg).await {
                error!("Message handling failed: {e}");
            }
        }
        info!("Inbound stream closed; gateway stopping");
    }
}
