use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{bounds_from_edges, loose_string, parse_json};
use crate::provider::support::{fetch, preflight_geocode, preflight_reverse, Credential};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "arcgis_online";
const ROOT: &str = "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer";

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    location: Location,
    #[serde(default)]
    extent: Option<Extent>,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct Location {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct Extent {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Attributes {
    #[serde(default, deserialize_with = "loose_string")]
    add_num: Option<String>,
    st_pre_dir: Option<String>,
    st_pre_type: Option<String>,
    st_name: Option<String>,
    st_type: Option<String>,
    st_dir: Option<String>,
    city: Option<String>,
    nbrhd: Option<String>,
    district: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    postal: Option<String>,
    region: Option<String>,
    region_abbr: Option<String>,
    subregion: Option<String>,
    country: Option<String>,
    cntry_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReverseAddress {
    address: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    subregion: Option<String>,
    region: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    postal: Option<String>,
    country_code: Option<String>,
}

/// Street name from its parts, e.g. `"N" "Main" "St"` gives `"N Main St"`.
fn street_name(a: &Attributes) -> Option<String> {
    let parts: Vec<&str> = [&a.st_pre_dir, &a.st_pre_type, &a.st_name, &a.st_type, &a.st_dir]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

impl Candidate {
    fn into_address(self) -> Address {
        let bounds = self
            .extent
            .map(|e| bounds_from_edges(Some(e.ymin), Some(e.xmin), Some(e.ymax), Some(e.xmax)))
            .unwrap_or_default();
        let street = street_name(&self.attributes);
        let a = self.attributes;

        Address::builder(NAME)
            .coordinates(Some(self.location.y), Some(self.location.x))
            .bounds(bounds)
            .street_number(a.add_num)
            .street_name(street)
            .locality(a.city)
            .sub_locality(a.nbrhd)
            .city_district(a.district)
            .postal_code(a.postal)
            .admin_level(1, a.region, a.region_abbr)
            .admin_level(2, a.subregion, None)
            .country_name(a.cntry_name)
            .country_code(a.country)
            .build()
    }
}

fn service_error(error: ServiceError, request: String) -> GeocodeError {
    match error.code {
        498 | 499 => GeocodeError::invalid_credentials(NAME, request),
        400 => GeocodeError::invalid_argument(NAME, request, error.message),
        _ => {
            warn!("{}: error {}: {}", NAME, error.code, error.message);
            GeocodeError::no_result(NAME, request)
        }
    }
}

/// ArcGIS World Geocoding Service. A token is optional.
pub struct ArcGisOnline {
    http: Arc<dyn HttpAdapter>,
    token: Credential,
    source_country: Option<String>,
    options: Options,
}

impl ArcGisOnline {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self {
            http,
            token: Credential::none(),
            source_country: None,
            options: Options::default(),
        }
    }

    pub fn with_token(mut self, token: Credential) -> Self {
        self.token = token;
        self
    }

    /// Restrict forward lookups to one country (ISO 3166 alpha-2 or alpha-3).
    pub fn with_source_country(mut self, country: impl Into<String>) -> Self {
        self.source_country = Some(country.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    fn url(&self, operation: &str, params: &[(&str, &str)]) -> Result<Url, GeocodeError> {
        let mut params: Vec<(&str, &str)> = params.to_vec();
        params.push(("f", "json"));
        if let Some(locale) = &self.options.locale {
            params.push(("langCode", locale.as_str()));
        }
        if let Some(token) = self.token.as_deref() {
            params.push(("token", token));
        }
        build_url(NAME, &format!("{}/{}", ROOT, operation), &params)
    }
}

#[async_trait]
impl Provider for ArcGisOnline {
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

        let limit = self.options.limit_param();
        let mut params = vec![
            ("SingleLine", request.text()),
            ("outFields", "*"),
            ("maxLocations", limit.as_str()),
        ];
        if let Some(country) = &self.source_country {
            params.push(("sourceCountry", country.as_str()));
        }
        let url = self.url("findAddressCandidates", &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: FindResponse = parse_json(NAME, &body, &description)?;
        if let Some(error) = response.error {
            return Err(service_error(error, description));
        }
        let addresses = response
            .candidates
            .into_iter()
            .map(Candidate::into_address)
            .collect();
        finish(NAME, &description, addresses, self.options.limit)
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        preflight_reverse(NAME, self.capabilities(), latitude, longitude)?;

        let location = format!("{},{}", longitude, latitude);
        let url = self.url("reverseGeocode", &[("location", location.as_str())])?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: ReverseResponse = parse_json(NAME, &body, &description)?;
        if let Some(error) = response.error {
            return Err(service_error(error, description));
        }
        let Some(a) = response.address else {
            return Err(GeocodeError::no_result(NAME, description));
        };
        let (lat, lon) = match response.location {
            Some(l) => (Some(l.y), Some(l.x)),
            None => (None, None),
        };
        let address = Address::builder(NAME)
            .coordinates(lat, lon)
            .street_name(a.address)
            .locality(a.city)
            .sub_locality(a.neighborhood)
            .postal_code(a.postal)
            .admin_level(1, a.region, None)
            .admin_level(2, a.subregion, None)
            .country_code(a.country_code)
            .build();
        finish(NAME, &description, vec![address], 1)
    }
}
