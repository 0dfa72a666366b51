//! OpenAI-compatible chat completion engine.
//!
//! Works with any endpoint that speaks the `/chat/completions` shape
//! (DeepSeek, Together, OpenAI, local gateways).

use async_trait::async_trait;
use relay_core::{config::ProviderConfig, error::RelayError, message::Turn, traits::ReplyEngine};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Chat completion reply engine.
pub struct ChatEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatEngine {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            client: crate::http_client(config.timeout_secs),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

/// Map role-tagged turns onto the wire message format.
pub(crate) fn build_messages(history: &[Turn]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|t| ChatMessage {
            role: t.role.as_str().to_string(),
            content: t.content.clone(),
        })
        .collect()
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

#[async_trait]
impl ReplyEngine for ChatEngine {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, history: &[Turn]) -> Result<String, RelayError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(history),
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("chat: POST {url} model={} turns={}", self.model, history.len());

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Provider(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Provider(format!(
                "chat endpoint returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Provider(format!("chat: failed to parse response: {e}")))?;

        parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.trim().to_string())
            .ok_or_else(|| RelayError::Provider("chat: empty completion".into()))
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("chat: no API key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("chat engine not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::config::ProviderConfig;

    #[test]
    fn test_engine_name() {
        let engine = ChatEngine::from_config(&ProviderConfig::default());
        assert_eq!(engine.name(), "chat-completions");
    }

    #[test]
    fn test_build_messages_preserves_roles_and_order() {
        let history = vec![
            Turn::user("Hello"),
            Turn::assistant("Hi there"),
            Turn::user("How are you?"),
        ];
        let messages = build_messages(&history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].content, "How are you?");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"  Hello!  "},"finish_reason":"stop"}],"model":"deepseek-chat"}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let text = resp
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.trim().to_string());
        assert_eq!(text, Some("Hello!".into()));
    }

    #[test]
    fn test_response_parsing_empty_choices() {
        let resp: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(resp.choices.unwrap().is_empty());
    }
}
