use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::finish;
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{loose_f64, loose_string, parse_json};
use crate::provider::support::{fetch, preflight_geocode, unsupported_reverse};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "free_geo_ip";
pub const DEFAULT_ROOT_URL: &str = "https://freegeoip.app";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default, deserialize_with = "loose_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    longitude: Option<f64>,
    city: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    zip_code: Option<String>,
    region_name: Option<String>,
    region_code: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    time_zone: Option<String>,
}

impl Response {
    fn into_address(self) -> Address {
        Address::builder(NAME)
            .coordinates(self.latitude, self.longitude)
            .locality(self.city)
            .postal_code(self.zip_code)
            .admin_level(1, self.region_name, self.region_code)
            .country_name(self.country_name)
            .country_code(self.country_code)
            .timezone(self.time_zone)
            .build()
    }
}

/// freegeoip-compatible IP lookup; the root URL can point at a self-hosted
/// instance.
pub struct FreeGeoIp {
    http: Arc<dyn HttpAdapter>,
    root_url: String,
}

impl FreeGeoIp {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self {
            http,
            root_url: DEFAULT_ROOT_URL.to_string(),
        }
    }

    pub fn with_root_url(mut self, root_url: &str) -> Self {
        self.root_url = root_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Provider for FreeGeoIp {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IP
    }

    async fn geocode_request(
        &self,
        request: &GeocodeRequest,
    ) -> Result<AddressCollection, GeocodeError> {
        if let Some(local) = preflight_geocode(NAME, self.capabilities(), request)? {
            return Ok(local);
        }

        let raw = format!("{}/json/{}", self.root_url, request.lookup_address());
        let url = url::Url::parse(&raw).map_err(|e| {
            GeocodeError::invalid_argument(NAME, &raw, format!("invalid request URL: {}", e))
        })?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;
        finish(NAME, &description, vec![response.into_address()], 1)
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        Err(unsupported_reverse(NAME, latitude, longitude))
    }
}
