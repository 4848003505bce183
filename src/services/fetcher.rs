// src/services/fetcher.rs

//! Page fetching.
//!
//! A fetch either yields a status and body, or a [`FetchError`] when the
//! request never produced a response. Interpreting the status is left to
//! the cycle engine. Bodies are kept as raw bytes so that whole-document
//! comparisons are exact.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::HttpConfig;
use crate::utils::http::create_async_client;

/// A response as seen by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Retrieves one URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// `timeout` must match the one the client was built with.
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a fetcher with its own client from HTTP settings.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?, config.timeout()))
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::transport(url, error)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(url, e))?
            .to_vec();

        log::debug!("Fetched {} ({}, {} bytes)", url, status, body.len());
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::from_config(&HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_status_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&mock_server)
            .await;

        let response = fetcher()
            .fetch(&format!("{}/page", mock_server.uri()))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.body, b"<p>hello</p>");
    }

    #[tokio::test]
    async fn test_invalid_utf8_body_is_kept_byte_exact() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, b'x']))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xfe, b'x']))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher();
        let a = fetcher.fetch(&format!("{}/a", mock_server.uri())).await.unwrap();
        let b = fetcher.fetch(&format!("{}/b", mock_server.uri())).await.unwrap();
        assert_eq!(a.body, vec![0xff, b'x']);
        assert_ne!(a.body, b.body);
    }

    #[tokio::test]
    async fn test_non_200_is_a_response_not_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let response = fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_sends_user_agent() {
        let mock_server = MockServer::start().await;
        let config = HttpConfig {
            user_agent: "pagewatch-test".to_string(),
            ..HttpConfig::default()
        };
        Mock::given(method("GET"))
            .and(header("user-agent", "pagewatch-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::from_config(&config).unwrap();
        let response = fetcher.fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_malformed_url_is_invalid_url_error() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = fetcher()
            .fetch(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
