//! Random quote client.

use async_trait::async_trait;
use relay_core::{config::QuoteConfig, error::RelayError, traits::QuoteSource};
use serde::Deserialize;

pub struct QuoteClient {
    client: reqwest::Client,
    url: String,
}

impl QuoteClient {
    pub fn from_config(config: &QuoteConfig) -> Self {
        Self {
            client: crate::http_client(config.timeout_secs),
            url: config.url.clone(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct QuoteResponse {
    pub content: String,
    pub author: String,
}

pub(crate) fn format_quote(quote: &QuoteResponse) -> String {
    format!("\"{}\" - {}", quote.content, quote.author)
}

#[async_trait]
impl QuoteSource for QuoteClient {
    async fn random_quote(&self) -> Result<String, RelayError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RelayError::Provider(format!("quote request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(RelayError::Provider(format!(
                "quote endpoint returned {status}"
            )));
        }

        let quote: QuoteResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Provider(format!("quote: failed to parse response: {e}")))?;

        Ok(format_quote(&quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_formatting() {
        let quote: QuoteResponse = serde_json::from_str(
            r#"{"content":"Simplicity is the soul of efficiency.","author":"Austin Freeman"}"#,
        )
        .unwrap();
        assert_eq!(
            format_quote(&quote),
            "\"Simplicity is the soul of efficiency.\" - Austin Freeman"
        );
    }
}
