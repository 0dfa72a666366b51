//! Image generation client (`/images/generations` shape).

use async_trait::async_trait;
use relay_core::{config::ImageConfig, error::RelayError, traits::MediaSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct ImageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    size: String,
}

impl ImageClient {
    pub fn from_config(config: &ImageConfig) -> Self {
        Self {
            client: crate::http_client(config.timeout_secs),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            size: config.size.clone(),
        }
    }
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
}

#[derive(Deserialize)]
pub(crate) struct ImageResponse {
    pub data: Option<Vec<ImageDatum>>,
}

#[derive(Deserialize)]
pub(crate) struct ImageDatum {
    pub url: Option<String>,
}

#[async_trait]
impl MediaSource for ImageClient {
    async fn image_url(&self, prompt: &str) -> Result<String, RelayError> {
        let url = format!(
            "{}/images/generations",
            self.base_url.trim_end_matches('/')
        );
        debug!("image: POST {url} model={}", self.model);

        let body = ImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.size.clone(),
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Provider(format!("image request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(RelayError::Provider(format!(
                "image endpoint returned {status}"
            )));
        }

        let parsed: ImageResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Provider(format!("image: failed to parse response: {e}")))?;

        parsed
            .data
            .and_then(|d| d.into_iter().next())
            .and_then(|d| d.url)
            .ok_or_else(|| RelayError::Provider("image: no url in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_response_parsing() {
        let json = r#"{"data":[{"url":"https://cdn.example.com/img/abc.png"}]}"#;
        let resp: ImageResponse = serde_json::from_str(json).unwrap();
        let url = resp.data.and_then(|d| d.into_iter().next()).and_then(|d| d.url);
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/img/abc.png"));
    }

    #[test]
    fn test_image_response_missing_url() {
        let resp: ImageResponse = serde_json::from_str(r#"{"data":[{}]}"#).unwrap();
        let url = resp.data.and_then(|d| d.into_iter().next()).and_then(|d| d.url);
        assert!(url.is_none());
    }
}
