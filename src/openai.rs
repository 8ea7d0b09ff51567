//! Shared OpenAI client construction.
//!
//! Embedding a large regulation corpus can take minutes per batch, so every
//! client carries an explicit request timeout instead of hanging on a
//! stalled connection. The timeout comes from `general.request_timeout_secs`.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Fallback request timeout when no setting is supplied.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Build an OpenAI client whose requests abort after `timeout`.
pub fn create_client(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}
