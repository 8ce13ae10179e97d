use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{bounds_from_edges, parse_json};
use crate::provider::support::{
    fetch, preflight_geocode, preflight_reverse, reverse_description, Credential,
};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "bing_maps";
const ENDPOINT: &str = "https://dev.virtualearth.net/REST/v1/Locations";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    #[serde(default)]
    authentication_result_code: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Deserialize)]
struct ResourceSet {
    #[serde(default)]
    resources: Vec<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    /// `[south, west, north, east]`
    #[serde(default)]
    bbox: Vec<f64>,
    #[serde(default)]
    point: Option<Point>,
    #[serde(default)]
    address: LocationAddress,
}

#[derive(Debug, Deserialize)]
struct Point {
    /// `[latitude, longitude]`
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationAddress {
    address_line: Option<String>,
    locality: Option<String>,
    neighborhood: Option<String>,
    postal_code: Option<String>,
    admin_district: Option<String>,
    admin_district2: Option<String>,
    country_region: Option<String>,
    country_region_iso2: Option<String>,
}

impl Location {
    fn into_address(self) -> Address {
        let coordinate = |i: usize| self.point.as_ref().and_then(|p| p.coordinates.get(i).copied());
        let edge = |i: usize| {
            if self.bbox.len() == 4 {
                self.bbox.get(i).copied()
            } else {
                None
            }
        };
        let a = self.address;

        Address::builder(NAME)
            .coordinates(coordinate(0), coordinate(1))
            .bounds(bounds_from_edges(edge(0), edge(1), edge(2), edge(3)))
            .street_name(a.address_line)
            .locality(a.locality)
            .sub_locality(a.neighborhood)
            .postal_code(a.postal_code)
            .admin_level(1, a.admin_district, None)
            .admin_level(2, a.admin_district2, None)
            .country_name(a.country_region)
            .country_code(a.country_region_iso2)
            .build()
    }
}

/// Bing Maps Locations API. Requires an API key.
pub struct BingMaps {
    http: Arc<dyn HttpAdapter>,
    api_key: Credential,
    options: Options,
}

impl BingMaps {
    pub fn new(http: Arc<dyn HttpAdapter>, api_key: Credential) -> Self {
        Self {
            http,
            api_key,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    async fn execute(
        &self,
        base: &str,
        query: Option<&str>,
        key: &str,
    ) -> Result<AddressCollection, GeocodeError> {
        let limit = self.options.limit_param();
        let mut params = vec![("maxResults", limit.as_str()), ("key", key)];
        if let Some(query) = query {
            params.push(("q", query));
        }
        if let Some(locale) = &self.options.locale {
            params.push(("culture", locale.as_str()));
        }
        let url = build_url(NAME, base, &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;

        match response.authentication_result_code.as_deref() {
            Some("InvalidCredentials") | Some("CredentialsNoLongerValid") => {
                return Err(GeocodeError::invalid_credentials(NAME, description));
            }
            _ => {}
        }
        if response.status_code == Some(429) {
            return Err(GeocodeError::quota_exceeded(NAME, description));
        }

        let addresses = response
            .resource_sets
            .into_iter()
            .flat_map(|set| set.resources)
            .map(Location::into_address)
            .collect();
        finish(NAME, &description, addresses, self.options.limit)
    }
}

#[async_trait]
impl Provider for BingMaps {
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
        let key = self.api_key.require(NAME, request.text())?;
        self.execute(ENDPOINT, Some(request.text()), key).await
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        preflight_reverse(NAME, self.capabilities(), latitude, longitude)?;
        let key = self
            .api_key
            .require(NAME, &reverse_description(latitude, longitude))?;
        let base = format!("{}/{},{}", ENDPOINT, latitude, longitude);
        self.execute(&base, None, key).await
    }
}
