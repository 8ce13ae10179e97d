//! HTTP transport used by providers.
//!
//! Providers only see the [`HttpAdapter`] trait; connection handling, TLS and
//! socket-level retries live behind it.

mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{ReqwestAdapter, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Query parameters whose values are masked in request descriptions.
const SECRET_PARAMS: &[&str] = &[
    "key",
    "api_key",
    "apikey",
    "username",
    "l",
    "token",
    "client",
    "signature",
];

/// Hard transport failure; distinct from an empty response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("request error: {0:#}")]
    Request(#[from] reqwest::Error),
}

/// Fetches a URL and returns the raw body.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// `Ok(None)` means the upstream answered without content.
    async fn fetch(&self, url: &Url) -> Result<Option<Vec<u8>>, TransportError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Describe a request for logs and errors, with credentials masked.
pub fn describe(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    masked.set_query(None);
    if !pairs.is_empty() {
        masked.query_pairs_mut().extend_pairs(pairs);
    }
    format!("GET {}", masked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_masks_secrets() {
        let url = Url::parse("https://api.example.com/geo?q=Paris&key=s3cr3t&username=bob").unwrap();
        let text = describe(&url);
        assert!(text.starts_with("GET https://api.example.com/geo?"));
        assert!(text.contains("q=Paris"));
        assert!(!text.contains("s3cr3t"));
        assert!(!text.contains("bob"));
        assert!(text.contains("key=***"));
    }

    #[test]
    fn test_describe_without_query() {
        let url = Url::parse("https://freegeoip.app/json/8.8.8.8").unwrap();
        assert_eq!(describe(&url), "GET https://freegeoip.app/json/8.8.8.8");
    }
}
