mod defaults;

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::path::Path;

use defaults::*;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub quote: QuoteConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// General gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fixed branding suffix appended to outbound replies.
    #[serde(default = "default_signature")]
    pub signature: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            signature: default_signature(),
        }
    }
}

/// Transport bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the protocol sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// When set and the session is unregistered, a phone-pair code is
    /// requested instead of waiting for a QR code.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Our own identity on the network; group messages must mention it.
    #[serde(default)]
    pub bot_id: String,
    /// Command sentinel (`!` or `/` depending on deployment).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Emit processing/done reactions on handled messages.
    #[serde(default = "default_true")]
    pub reactions: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            phone_number: None,
            bot_id: String::new(),
            command_prefix: default_command_prefix(),
            reactions: true,
        }
    }
}

/// Reply engine (chat completion) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            api_key: String::new(),
            model: default_chat_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

/// Image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub size: String,
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: default_image_base_url(),
            api_key: String::new(),
            model: default_image_model(),
            size: default_image_size(),
            timeout_secs: default_image_timeout(),
        }
    }
}

/// Quote provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    #[serde(default = "default_quote_url")]
    pub url: String,
    #[serde(default = "default_quote_timeout")]
    pub timeout_secs: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            url: default_quote_url(),
            timeout_secs: default_quote_timeout(),
        }
    }
}

/// Conversation memory and activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Per-conversation history cap; oldest turns drop first.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Global conversation cap; least recently active evicts first.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_turns: default_max_turns(),
            max_conversations: default_max_conversations(),
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    /// Consecutive failed connection attempts before the session degrades.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_secs")]
    pub reconnect_base_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_secs: default_reconnect_base_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

/// Control API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// SHA-256 hex digest of the operator PIN. Empty disables auth
    /// (local-only deployments).
    #[serde(default)]
    pub pin_hash: String,
    #[serde(default = "default_rate_max_requests")]
    pub rate_max_requests: u32,
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            pin_hash: String::new(),
            rate_max_requests: default_rate_max_requests(),
            rate_window_secs: default_rate_window_secs(),
        }
    }
}

/// Expand a leading `~/` with `$HOME`.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load config from a TOML file, falling back to defaults when missing.
pub fn load(path: &str) -> Result<Config, RelayError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| RelayError::Config(format!("invalid config: {e}")))
}
