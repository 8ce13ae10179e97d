//! OpenStreetMap Nominatim.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{bounds_from_edges, loose_f64, parse_coordinate, parse_json};
use crate::provider::support::{fetch, preflight_geocode, preflight_reverse};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "openstreetmap";
pub const DEFAULT_ROOT_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default, deserialize_with = "loose_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    lon: Option<f64>,
    /// `[south, north, west, east]` as strings
    #[serde(default)]
    boundingbox: Vec<String>,
    #[serde(default)]
    address: Option<PlaceAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceAddress {
    house_number: Option<String>,
    road: Option<String>,
    pedestrian: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    suburb: Option<String>,
    city_district: Option<String>,
    postcode: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Error { error: String },
    Place(Place),
}

impl Place {
    fn into_address(self) -> Address {
        let edge = |i: usize| {
            if self.boundingbox.len() == 4 {
                parse_coordinate(self.boundingbox.get(i).map(String::as_str))
            } else {
                None
            }
        };
        let bounds = bounds_from_edges(edge(0), edge(2), edge(1), edge(3));
        let a = self.address.unwrap_or_default();

        Address::builder(NAME)
            .coordinates(self.lat, self.lon)
            .bounds(bounds)
            .street_number(a.house_number)
            .street_name(a.road.or(a.pedestrian))
            .locality(a.city.or(a.town).or(a.village).or(a.hamlet))
            .sub_locality(a.suburb)
            .city_district(a.city_district)
            .postal_code(a.postcode)
            .admin_level(1, a.state, None)
            .admin_level(2, a.county, None)
            .country_name(a.country)
            .country_code(a.country_code.map(|c| c.to_uppercase()))
            .build()
    }
}

/// Nominatim search and reverse endpoints; the root URL can point at any
/// Nominatim instance.
pub struct Nominatim {
    http: Arc<dyn HttpAdapter>,
    root_url: String,
    options: Options,
}

impl Nominatim {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self {
            http,
            root_url: DEFAULT_ROOT_URL.to_string(),
            options: Options::default(),
        }
    }

    pub fn with_root_url(mut self, root_url: &str) -> Self {
        self.root_url = root_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    fn params<'a>(&'a self, limit: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![("format", "jsonv2"), ("addressdetails", "1"), ("limit", limit)];
        if let Some(locale) = &self.options.locale {
            params.push(("accept-language", locale.as_str()));
        }
        params
    }
}

#[async_trait]
impl Provider for Nominatim {
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
        let mut params = self.params(&limit);
        params.push(("q", request.text()));
        let url = build_url(NAME, &format!("{}/search", self.root_url), &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let places: Vec<Place> = parse_json(NAME, &body, &description)?;
        let addresses = places.into_iter().map(Place::into_address).collect();
        finish(NAME, &description, addresses, self.options.limit)
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        preflight_reverse(NAME, self.capabilities(), latitude, longitude)?;

        let (lat, lon) = (latitude.to_string(), longitude.to_string());
        let limit = self.options.limit_param();
        let mut params = self.params(&limit);
        params.extend([("lat", lat.as_str()), ("lon", lon.as_str())]);
        let url = build_url(NAME, &format!("{}/reverse", self.root_url), &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        match parse_json::<ReverseResponse>(NAME, &body, &description)? {
            ReverseResponse::Place(place) => {
                finish(NAME, &description, vec![place.into_address()], 1)
            }
            ReverseResponse::Error { error } => {
                tracing::debug!("{}: {}", NAME, error);
                Err(GeocodeError::no_result(NAME, description))
            }
        }
    }
}
