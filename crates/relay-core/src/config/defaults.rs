//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "relay".to_string()
}

pub fn default_data_dir() -> String {
    "~/.relay".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_signature() -> String {
    "_relay - smart replies on your number_".to_string()
}

pub fn default_bridge_url() -> String {
    "http://127.0.0.1:4100".to_string()
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_chat_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

pub fn default_chat_model() -> String {
    "deepseek-chat".to_string()
}

pub fn default_max_tokens() -> u32 {
    512
}

pub fn default_chat_timeout() -> u64 {
    60
}

pub fn default_image_base_url() -> String {
    "https://api.together.xyz/v1".to_string()
}

pub fn default_image_model() -> String {
    "stabilityai/stable-diffusion-xl-base-1.0".to_string()
}

pub fn default_image_size() -> String {
    "512x512".to_string()
}

pub fn default_image_timeout() -> u64 {
    120
}

pub fn default_quote_url() -> String {
    "https://api.quotable.io/random".to_string()
}

pub fn default_quote_timeout() -> u64 {
    10
}

pub fn default_db_path() -> String {
    "~/.relay/data/activity.db".to_string()
}

pub fn default_max_turns() -> usize {
    30
}

pub fn default_max_conversations() -> usize {
    1024
}

pub fn default_credentials_path() -> String {
    "~/.relay/data/credentials.json".to_string()
}

pub fn default_max_reconnect_attempts() -> u32 {
    10
}

pub fn default_reconnect_base_secs() -> u64 {
    1
}

pub fn default_reconnect_max_secs() -> u64 {
    60
}

pub fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_api_port() -> u16 {
    4000
}

pub fn default_rate_max_requests() -> u32 {
    30
}

pub fn default_rate_window_secs() -> u64 {
    60
}
