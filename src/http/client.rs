//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};
use url::Url;

use super::{describe, HttpAdapter, TransportError};

pub const DEFAULT_USER_AGENT: &str = concat!("geochain/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP adapter over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestAdapter {
    client: Client,
}

impl ReqwestAdapter {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn fetch(&self, url: &Url) -> Result<Option<Vec<u8>>, TransportError> {
        debug!("{}", describe(url));

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        trace!("received {} bytes", body.len());
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}
