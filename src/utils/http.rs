// src/utils/http.rs

//! HTTP client utilities.

use crate::error::Result;
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}
