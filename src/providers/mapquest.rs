use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::parse_json;
use crate::provider::support::{
    fetch, preflight_geocode, preflight_reverse, reverse_description, Credential,
};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "mapquest";
const ROOT: &str = "https://www.mapquestapi.com/geocoding/v1";

#[derive(Debug, Deserialize)]
struct Response {
    info: Info,
    #[serde(default)]
    results: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct Info {
    statuscode: u16,
    #[serde(default)]
    messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    street: Option<String>,
    admin_area6: Option<String>,
    admin_area5: Option<String>,
    admin_area4: Option<String>,
    admin_area3: Option<String>,
    admin_area1: Option<String>,
    postal_code: Option<String>,
    lat_lng: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl Location {
    fn into_address(self) -> Address {
        let (lat, lng) = match self.lat_lng {
            Some(p) => (Some(p.lat), Some(p.lng)),
            None => (None, None),
        };
        Address::builder(NAME)
            .coordinates(lat, lng)
            .street_name(self.street)
            .sub_locality(self.admin_area6)
            .locality(self.admin_area5)
            .postal_code(self.postal_code)
            .admin_level(1, self.admin_area3, None)
            .admin_level(2, self.admin_area4, None)
            .country_code(self.admin_area1)
            .build()
    }
}

/// MapQuest Geocoding API. Requires an API key.
pub struct MapQuest {
    http: Arc<dyn HttpAdapter>,
    api_key: Credential,
    options: Options,
}

impl MapQuest {
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
        operation: &str,
        location: &str,
        key: &str,
    ) -> Result<AddressCollection, GeocodeError> {
        let limit = self.options.limit_param();
        let params = [
            ("key", key),
            ("location", location),
            ("maxResults", limit.as_str()),
            ("outFormat", "json"),
        ];
        let url = build_url(NAME, &format!("{}/{}", ROOT, operation), &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;

        match response.info.statuscode {
            0 => {}
            401 | 403 => return Err(GeocodeError::invalid_credentials(NAME, description)),
            400 => {
                let reason = response.info.messages.join("; ");
                return Err(GeocodeError::invalid_argument(NAME, description, reason));
            }
            code => {
                warn!("{}: status {}: {:?}", NAME, code, response.info.messages);
                return Err(GeocodeError::no_result(NAME, description));
            }
        }

        let addresses = response
            .results
            .into_iter()
            .flat_map(|set| set.locations)
            .map(Location::into_address)
            .collect();
        finish(NAME, &description, addresses, self.options.limit)
    }
}

#[async_trait]
impl Provider for MapQuest {
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
        self.execute("address", request.text(), key).await
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
        let location = format!("{},{}", latitude, longitude);
        self.execute("reverse", &location, key).await
    }
}
