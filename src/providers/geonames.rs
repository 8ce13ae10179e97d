use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{bounds_from_edges, loose_f64, loose_string, parse_json};
use crate::provider::support::{
    fetch, preflight_geocode, preflight_reverse, reverse_description, Credential,
};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "geonames";
const ROOT: &str = "http://api.geonames.org";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    geonames: Vec<Place>,
    #[serde(default)]
    status: Option<Status>,
}

/// Error payload, e.g. `{"status": {"message": "...", "value": 10}}`.
#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
    value: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    #[serde(default, deserialize_with = "loose_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    lng: Option<f64>,
    name: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    admin_name1: Option<String>,
    admin_name2: Option<String>,
    admin_name3: Option<String>,
    admin_name4: Option<String>,
    admin_name5: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    admin_code1: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    admin_code2: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    admin_code3: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    admin_code4: Option<String>,
    bbox: Option<BoundingBox>,
    timezone: Option<Timezone>,
}

#[derive(Debug, Deserialize)]
struct BoundingBox {
    #[serde(default, deserialize_with = "loose_f64")]
    south: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    west: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    north: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    east: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Timezone {
    time_zone_id: Option<String>,
}

impl Place {
    fn into_address(self) -> Address {
        let bounds = self
            .bbox
            .map(|b| bounds_from_edges(b.south, b.west, b.north, b.east))
            .unwrap_or_default();

        Address::builder(NAME)
            .coordinates(self.lat, self.lng)
            .bounds(bounds)
            .locality(self.name)
            .admin_level(1, self.admin_name1, self.admin_code1)
            .admin_level(2, self.admin_name2, self.admin_code2)
            .admin_level(3, self.admin_name3, self.admin_code3)
            .admin_level(4, self.admin_name4, self.admin_code4)
            .admin_level(5, self.admin_name5, None)
            .country_name(self.country_name)
            .country_code(self.country_code)
            .timezone(self.timezone.and_then(|t| t.time_zone_id))
            .build()
    }
}

/// GeoNames search and nearby-place services. The account name is required.
pub struct GeoNames {
    http: Arc<dyn HttpAdapter>,
    username: Credential,
    options: Options,
}

impl GeoNames {
    pub fn new(http: Arc<dyn HttpAdapter>, username: Credential) -> Self {
        Self {
            http,
            username,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    async fn execute(
        &self,
        service: &str,
        query: &[(&str, &str)],
        username: &str,
    ) -> Result<AddressCollection, GeocodeError> {
        let limit = self.options.limit_param();
        let mut params = vec![("maxRows", limit.as_str()), ("style", "full")];
        params.extend_from_slice(query);
        if let Some(locale) = &self.options.locale {
            params.push(("lang", locale.as_str()));
        }
        params.push(("username", username));
        let url = build_url(NAME, &format!("{}/{}", ROOT, service), &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;

        if let Some(status) = response.status {
            return Err(status_error(status, description));
        }
        let addresses = response
            .geonames
            .into_iter()
            .map(Place::into_address)
            .collect();
        finish(NAME, &description, addresses, self.options.limit)
    }
}

/// Map a GeoNames status code onto the error taxonomy.
fn status_error(status: Status, request: String) -> GeocodeError {
    match status.value {
        10 => GeocodeError::invalid_credentials(NAME, request),
        18..=20 => GeocodeError::quota_exceeded(NAME, request),
        14 => GeocodeError::invalid_argument(NAME, request, status.message),
        _ => {
            warn!("{}: status {}: {}", NAME, status.value, status.message);
            GeocodeError::no_result(NAME, request)
        }
    }
}

#[async_trait]
impl Provider for GeoNames {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADDRESS
    }

    async fn geocode_request(
        &self,
        request: &GeocodeRequest,
    ) -> Result<AddressCollection, GeocodeError> {
        if let Some(local) = preflight_geocode(NAME, self.capabilities(), request)? {
            return Ok(local);
        }
        let username = self.username.require(NAME, request.text())?;
        self.execute("searchJSON", &[("q", request.text())], username)
            .await
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        preflight_reverse(NAME, self.capabilities(), latitude, longitude)?;
        let username = self
            .username
            .require(NAME, &reverse_description(latitude, longitude))?;
        let (lat, lng) = (latitude.to_string(), longitude.to_string());
        self.execute(
            "findNearbyPlaceNameJSON",
            &[("lat", lat.as_str()), ("lng", lng.as_str())],
            username,
        )
        .await
    }
}
