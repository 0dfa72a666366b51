//! HTTP client for the protocol sidecar.
//!
//! The sidecar speaks the actual messaging protocol and exposes a small
//! HTTP surface: lifecycle posts, a long-poll event feed, and send/react
//! operations. Every response comes wrapped in the same `{ok, error,
//! result}` envelope.

use async_trait::async_trait;
use relay_core::{
    config::TransportConfig,
    error::RelayError,
    event::{CloseReason, ConnectionEvent, TransportEvent},
    message::OutboundPayload,
    traits::Transport,
};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Long-poll hold time requested from the sidecar, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;
/// Consecutive poll failures before the stream is declared lost.
const MAX_POLL_FAILURES: u32 = 5;

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

pub struct BridgeTransport {
    base_url: String,
    client: reqwest::Client,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeTransport {
    pub fn new(cfg: &TransportConfig) -> Self {
        // The request timeout must outlast the sidecar's long-poll hold.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 5))
            .build()
            .unwrap_or_default();
        Self {
            base_url: cfg.bridge_url.trim_end_matches('/').to_string(),
            client,
            poll_task: Mutex::new(None),
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<BridgeResponse, RelayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RelayError::Transport(format!(
                "POST {path} returned {}",
                response.status()
            )));
        }

        let envelope: BridgeResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Transport(format!("invalid bridge response: {e}")))?;
        if !envelope.ok {
            return Err(RelayError::Transport(
                envelope.error.unwrap_or_else(|| "bridge error".to_string()),
            ));
        }
        Ok(envelope)
    }

    /// Long-poll `/events` and forward decoded events until the receiver
    /// goes away or the sidecar stops answering.
    async fn poll_loop(
        client: reqwest::Client,
        base_url: String,
        tx: mpsc::Sender<TransportEvent>,
    ) {
        let url = format!("{base_url}/events?timeout={POLL_TIMEOUT_SECS}");
        let mut failures: u32 = 0;
        let mut backoff_secs: u64 = 1;

        loop {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<Vec<TransportEvent>>().await {
                        Ok(events) => {
                            failures = 0;
                            backoff_secs = 1;
                            for event in events {
                                debug!("Bridge event: {event:?}");
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                            continue;
                        }
                        Err(e) => warn!("Undecodable bridge event batch: {e}"),
                    }
                }
                Ok(response) => warn!("Bridge poll returned {}", response.status()),
                Err(e) => warn!("Bridge poll failed: {e}"),
            }

            failures += 1;
            if failures >= MAX_POLL_FAILURES {
                let _ = tx
                    .send(TransportEvent::Connection(ConnectionEvent::Closed {
                        reason: CloseReason::ConnectionLost,
                    }))
                    .await;
                return;
            }
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            backoff_secs = (backoff_secs * 2).min(60);
        }
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, RelayError> {
        self.post("/connect", &serde_json::json!({})).await?;

        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(Self::poll_loop(
            self.client.clone(),
            self.base_url.clone(),
            tx,
        ));
        let mut task = self.poll_task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(stale) = task.replace(handle) {
            stale.abort();
        }
        Ok(rx)
    }

    async fn send(
        &self,
        conversation_id: &str,
        payload: &OutboundPayload,
    ) -> Result<(), RelayError> {
        self.post(
            "/send",
            &serde_json::json!({
                "conversation_id": conversation_id,
                "payload": payload,
            }),
        )
        .await?;
        Ok(())
    }

    async fn react(
        &self,
        conversation_id: &str,
        message_ref: &str,
        emoji: &str,
    ) -> Result<(), RelayError> {
        self.post(
            "/react",
            &serde_json::json!({
                "conversation_id": conversation_id,
                "message_ref": message_ref,
                "emoji": emoji,
            }),
        )
        .await?;
        Ok(())
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, RelayError> {
        let envelope = self
            .post("/pair", &serde_json::json!({ "phone_number": phone_number }))
            .await?;
        envelope
            .result
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| RelayError::Transport("bridge returned no pairing code".into()))
    }

    async fn disconnect(&self) -> Result<(), RelayError> {
        let handle = {
            let mut task = self.poll_task.lock().unwrap_or_else(|p| p.into_inner());
            task.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        // The sidecar may already be gone; a failed teardown is fine.
        if let Err(e) = self.post("/disconnect", &serde_json::json!({})).await {
            debug!("Bridge disconnect: {e}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_decode_ok() {
        let env: BridgeResponse =
            serde_json::from_str(r#"{"ok":true,"result":"ABCD-1234"}"#).unwrap();
        assert!(env.ok);
        assert_eq!(env.result.unwrap().as_str().unwrap(), "ABCD-1234");
        assert!(env.error.is_none());
    }

    #[test]
    fn test_envelope_decode_error() {
        let env: BridgeResponse =
            serde_json::from_str(r#"{"ok":false,"error":"not connected"}"#).unwrap();
        assert!(!env.ok);
        assert_eq!(env.error.as_deref(), Some("not connected"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let cfg = TransportConfig {
            bridge_url: "http://127.0.0.1:4100/".into(),
            ..TransportConfig::default()
        };
        let transport = BridgeTransport::new(&cfg);
        assert_eq!(transport.base_url, "http://127.0.0.1:4100");
    }
}
