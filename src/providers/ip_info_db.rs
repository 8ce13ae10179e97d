use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{build_url, finish};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{fix_double_utf8, loose_f64, parse_json, without_placeholder};
use crate::provider::support::{fetch, preflight_geocode, unsupported_reverse, Credential};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "ip_info_db";
const ROOT: &str = "https://api.ipinfodb.com/v3";
const PLACEHOLDERS: &[&str] = &["-"];

/// How much detail to ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    City,
    Country,
}

impl Precision {
    fn service(self) -> &'static str {
        match self {
            Precision::City => "ip-city",
            Precision::Country => "ip-country",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    status_code: String,
    #[serde(default)]
    status_message: String,
    country_code: Option<String>,
    country_name: Option<String>,
    region_name: Option<String>,
    city_name: Option<String>,
    zip_code: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    longitude: Option<f64>,
}

fn field(value: Option<String>) -> Option<String> {
    without_placeholder(value, PLACEHOLDERS).map(|v| fix_double_utf8(&v))
}

impl Response {
    fn into_address(self) -> Address {
        // "0" coordinates come with every unknown address
        let known = |v: Option<f64>| v.filter(|v| *v != 0.0);
        let (lat, lon) = match (known(self.latitude), known(self.longitude)) {
            (None, None) => (None, None),
            _ => (self.latitude, self.longitude),
        };
        Address::builder(NAME)
            .coordinates(lat, lon)
            .locality(field(self.city_name))
            .postal_code(field(self.zip_code))
            .admin_level(1, field(self.region_name), None)
            .country_name(field(self.country_name))
            .country_code(field(self.country_code))
            .build()
    }
}

/// IPInfoDB. IPv4 only; requires an API key.
pub struct IpInfoDb {
    http: Arc<dyn HttpAdapter>,
    api_key: Credential,
    precision: Precision,
}

impl IpInfoDb {
    pub fn new(http: Arc<dyn HttpAdapter>, api_key: Credential) -> Self {
        Self {
            http,
            api_key,
            precision: Precision::default(),
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

#[async_trait]
impl Provider for IpInfoDb {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IPV4
    }

    async fn geocode_request(
        &self,
        request: &GeocodeRequest,
    ) -> Result<AddressCollection, GeocodeError> {
        if let Some(local) = preflight_geocode(NAME, self.capabilities(), request)? {
            return Ok(local);
        }
        let key = self.api_key.require(NAME, request.text())?;

        let base = format!("{}/{}/", ROOT, self.precision.service());
        let url = build_url(
            NAME,
            &base,
            &[("key", key), ("ip", request.text()), ("format", "json")],
        )?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;
        if response.status_code != "OK" {
            let message = response.status_message.to_ascii_lowercase();
            if message.contains("api key") {
                return Err(GeocodeError::invalid_credentials(NAME, description));
            }
            if message.contains("limit") {
                return Err(GeocodeError::quota_exceeded(NAME, description));
            }
            warn!("{}: {}", NAME, response.status_message);
            return Err(GeocodeError::no_result(NAME, description));
        }
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
