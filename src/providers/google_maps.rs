use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection, Bounds};
use crate::provider::normalize::{bounds_from_edges, parse_json};
use crate::provider::support::{fetch, preflight_geocode, preflight_reverse, Credential};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "google_maps";
const ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    #[serde(default)]
    address_components: Vec<Component>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Component {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
    #[serde(default)]
    bounds: Option<Viewport>,
    #[serde(default)]
    viewport: Option<Viewport>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Viewport {
    northeast: LatLng,
    southwest: LatLng,
}

impl Viewport {
    fn to_bounds(&self) -> Bounds {
        bounds_from_edges(
            Some(self.southwest.lat),
            Some(self.southwest.lng),
            Some(self.northeast.lat),
            Some(self.northeast.lng),
        )
    }
}

impl GeoResult {
    fn into_address(self) -> Address {
        let bounds = self
            .geometry
            .bounds
            .as_ref()
            .or(self.geometry.viewport.as_ref())
            .map(Viewport::to_bounds)
            .unwrap_or_default();

        let mut builder = Address::builder(NAME)
            .coordinates(Some(self.geometry.location.lat), Some(self.geometry.location.lng))
            .bounds(bounds);

        let mut sub_locality = None;
        for component in self.address_components {
            for kind in &component.types {
                let long = Some(component.long_name.clone());
                builder = match kind.as_str() {
                    "street_number" => builder.street_number(long),
                    "route" => builder.street_name(long),
                    "locality" | "postal_town" => builder.locality(long),
                    k if k == "sublocality" || k.starts_with("sublocality_level_") => {
                        sub_locality.get_or_insert(component.long_name.clone());
                        builder
                    }
                    "postal_code" => builder.postal_code(long),
                    "country" => builder
                        .country_name(long)
                        .country_code(Some(component.short_name.clone())),
                    other => match other
                        .strip_prefix("administrative_area_level_")
                        .and_then(|n| n.parse::<u8>().ok())
                    {
                        Some(level) => {
                            builder.admin_level(level, long, Some(component.short_name.clone()))
                        }
                        None => builder,
                    },
                };
            }
        }
        builder.sub_locality(sub_locality).build()
    }
}

/// Google Maps Geocoding API. The key is optional; requests without one are
/// subject to the anonymous quota.
pub struct GoogleMaps {
    http: Arc<dyn HttpAdapter>,
    api_key: Credential,
    region: Option<String>,
    options: Options,
}

impl GoogleMaps {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self {
            http,
            api_key: Credential::none(),
            region: None,
            options: Options::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Credential) -> Self {
        self.api_key = api_key;
        self
    }

    /// Region biasing as a ccTLD code, e.g. `"es"`.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    async fn execute(&self, query: (&str, &str)) -> Result<AddressCollection, GeocodeError> {
        let mut params = vec![query];
        if let Some(locale) = &self.options.locale {
            params.push(("language", locale.as_str()));
        }
        if let Some(region) = &self.region {
            params.push(("region", region.as_str()));
        }
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }
        let url = build_url(NAME, ENDPOINT, &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;

        match response.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Err(GeocodeError::no_result(NAME, description)),
            "REQUEST_DENIED" => {
                if let Some(message) = &response.error_message {
                    warn!("{}: {}", NAME, message);
                }
                return Err(GeocodeError::invalid_credentials(NAME, description));
            }
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
                return Err(GeocodeError::quota_exceeded(NAME, description))
            }
            "INVALID_REQUEST" => {
                let reason = response
                    .error_message
                    .unwrap_or_else(|| "invalid request".to_string());
                return Err(GeocodeError::invalid_argument(NAME, description, reason));
            }
            other => {
                warn!("{}: unexpected status {}", NAME, other);
                return Err(GeocodeError::no_result(NAME, description));
            }
        }

        let addresses = response
            .results
            .into_iter()
            .map(GeoResult::into_address)
            .collect();
        finish(NAME, &description, addresses, self.options.limit)
    }
}

#[async_trait]
impl Provider for GoogleMaps {
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
        self.execute(("address", request.text())).await
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        preflight_reverse(NAME, self.capabilities(), latitude, longitude)?;
        let latlng = format!("{},{}", latitude, longitude);
        self.execute(("latlng", &latlng)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::mock::MockHttp;

    const PARIS: &str = r#"{
        "status": "OK",
        "results": [{
            "address_components": [
                {"long_name": "10", "short_name": "10", "types": ["street_number"]},
                {"long_name": "Avenue Gambetta", "short_name": "Av. Gambetta", "types": ["route"]},
                {"long_name": "Paris", "short_name": "Paris", "types": ["locality", "political"]},
                {"long_name": "Paris", "short_name": "75", "types": ["administrative_area_level_2", "political"]},
                {"long_name": "Île-de-France", "short_name": "IDF", "types": ["administrative_area_level_1", "political"]},
                {"long_name": "France", "short_name": "FR", "types": ["country", "political"]},
                {"long_name": "75020", "short_name": "75020", "types": ["postal_code"]}
            ],
            "geometry": {
                "location": {"lat": 48.8630462, "lng": 2.3882487},
                "viewport": {
                    "northeast": {"lat": 48.8643951, "lng": 2.3895976},
                    "southwest": {"lat": 48.8616972, "lng": 2.3868997}
                }
            }
        }]
    }"#;

    #[tokio::test]
    async fn test_geocode_components() {
        let http = Arc::new(MockHttp::with_body(PARIS));
        let provider = GoogleMaps::new(http.clone()).with_options(Options::default().with_locale("fr"));
        let results = provider.geocode("10 avenue Gambetta, Paris, France").await.unwrap();
        let address = results.first().unwrap();

        assert_eq!(address.street_number(), Some("10"));
        assert_eq!(address.street_name(), Some("Avenue Gambetta"));
        assert_eq!(address.locality(), Some("Paris"));
        assert_eq!(address.postal_code(), Some("75020"));
        let level1 = address.admin_levels().get(1).unwrap();
        assert_eq!(level1.name(), Some("Île-de-France"));
        assert_eq!(level1.code(), Some("IDF"));
        assert_eq!(address.admin_levels().get(2).and_then(|l| l.code()), Some("75"));
        assert_eq!(address.country().code(), Some("FR"));
        // no bounds in the payload, so the viewport is used
        assert_eq!(address.bounds().south(), Some(48.8616972));

        let url = http.last_url().unwrap();
        assert!(url.contains("language=fr"));
        assert!(!url.contains("key="));
    }

    #[tokio::test]
    async fn test_sublocality_levels() {
        let body = r#"{
            "status": "OK",
            "results": [{
                "address_components": [
                    {"long_name": "Brooklyn", "short_name": "Brooklyn", "types": ["political", "sublocality", "sublocality_level_1"]},
                    {"long_name": "Williamsburg", "short_name": "Williamsburg", "types": ["political", "sublocality_level_2"]},
                    {"long_name": "New York", "short_name": "NY", "types": ["locality", "political"]}
                ],
                "geometry": {"location": {"lat": 40.7081, "lng": -73.9571}}
            }]
        }"#;
        let provider = GoogleMaps::new(Arc::new(MockHttp::with_body(body)));
        let results = provider.geocode("Williamsburg, Brooklyn").await.unwrap();
        let address = results.first().unwrap();
        assert_eq!(address.sub_locality(), Some("Brooklyn"));
        assert_eq!(address.locality(), Some("New York"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            ("ZERO_RESULTS", ErrorKind::NoResult),
            ("REQUEST_DENIED", ErrorKind::InvalidCredentials),
            ("OVER_QUERY_LIMIT", ErrorKind::QuotaExceeded),
            ("INVALID_REQUEST", ErrorKind::InvalidArgument),
        ];
        for (status, kind) in cases {
            let body = format!(r#"{{"status": "{}", "results": []}}"#, status);
            let provider = GoogleMaps::new(Arc::new(MockHttp::with_body(&body)));
            let err = provider.geocode("somewhere").await.unwrap_err();
            assert_eq!(err.kind(), kind, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_key_is_masked_in_errors() {
        let body = r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#;
        let provider = GoogleMaps::new(Arc::new(MockHttp::with_body(body)))
            .with_api_key(Credential::new("s3cr3t"));
        let err = provider.geocode("Paris").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert!(!err.to_string().contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_reverse_sends_latlng() {
        let http = Arc::new(MockHttp::with_body(PARIS));
        let provider = GoogleMaps::new(http.clone()).with_region("fr");
        let results = provider.reverse(48.8630462, 2.3882487).await.unwrap();
        assert_eq!(results.len(), 1);
        let url = http.last_url().unwrap();
        assert!(url.contains("latlng=48.8630462%2C2.3882487"));
        assert!(url.contains("region=fr"));
    }

    #[tokio::test]
    async fn test_ip_query_is_unsupported() {
        let provider = GoogleMaps::new(Arc::new(MockHttp::forbidden()));
        let err = provider.geocode("::1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }
}
