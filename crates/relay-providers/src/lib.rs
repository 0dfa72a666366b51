//! # relay-providers
//!
//! Adapters for the external content APIs: the chat-completion reply
//! engine, the image generator, and the quote provider. Each is a single
//! bounded-timeout HTTP call; fallback text lives at the call sites.

mod chat;
mod image;
mod quote;

pub use chat::ChatEngine;
pub use image::ImageClient;
pub use quote::QuoteClient;

use std::time::Duration;

/// Shared helper: an HTTP client with a hard per-request deadline, so a
/// slow provider never stalls the inbound stream beyond the bound.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_default()
}
