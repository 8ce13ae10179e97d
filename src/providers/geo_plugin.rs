use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_url, finish};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{decode_html_entities, loose_f64, parse_json};
use crate::provider::support::{fetch, preflight_geocode, unsupported_reverse};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "geo_plugin";
const ENDPOINT: &str = "http://www.geoplugin.net/json.gp";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(rename = "geoplugin_status")]
    status: Option<u16>,
    #[serde(rename = "geoplugin_city")]
    city: Option<String>,
    #[serde(rename = "geoplugin_regionName")]
    region_name: Option<String>,
    #[serde(rename = "geoplugin_regionCode")]
    region_code: Option<String>,
    #[serde(rename = "geoplugin_countryName")]
    country_name: Option<String>,
    #[serde(rename = "geoplugin_countryCode")]
    country_code: Option<String>,
    #[serde(rename = "geoplugin_timezone")]
    timezone: Option<String>,
    #[serde(default, rename = "geoplugin_latitude", deserialize_with = "loose_f64")]
    latitude: Option<f64>,
    #[serde(default, rename = "geoplugin_longitude", deserialize_with = "loose_f64")]
    longitude: Option<f64>,
}

fn decoded(value: Option<String>) -> Option<String> {
    value.map(|v| decode_html_entities(&v))
}

impl Response {
    fn into_address(self) -> Address {
        Address::builder(NAME)
            .coordinates(self.latitude, self.longitude)
            .locality(decoded(self.city))
            .admin_level(1, decoded(self.region_name), self.region_code)
            .country_name(decoded(self.country_name))
            .country_code(self.country_code)
            .timezone(self.timezone)
            .build()
    }
}

/// geoPlugin IP lookup. IPv4 only.
pub struct GeoPlugin {
    http: Arc<dyn HttpAdapter>,
}

impl GeoPlugin {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Provider for GeoPlugin {
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

        let url = build_url(NAME, ENDPOINT, &[("ip", request.text())])?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let response: Response = parse_json(NAME, &body, &description)?;
        // 200 is a full answer, 206 a partial one
        match response.status {
            Some(200 | 206) => finish(NAME, &description, vec![response.into_address()], 1),
            _ => Err(GeocodeError::no_result(NAME, description)),
        }
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        Err(unsupported_reverse(NAME, latitude, longitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::mock::MockHttp;

    #[tokio::test]
    async fn test_entities_are_decoded() {
        let body = r#"{
            "geoplugin_request": "196.200.54.1",
            "geoplugin_status": 200,
            "geoplugin_city": "Abidjan",
            "geoplugin_region": "Lagunes",
            "geoplugin_regionCode": "LG",
            "geoplugin_regionName": "Lagunes",
            "geoplugin_countryCode": "CI",
            "geoplugin_countryName": "C&#244;te d&#039;Ivoire",
            "geoplugin_latitude": "5.3536",
            "geoplugin_longitude": "-4.0012",
            "geoplugin_timezone": "Africa/Abidjan"
        }"#;
        let http = Arc::new(MockHttp::with_body(body));
        let provider = GeoPlugin::new(http.clone());
        let results = provider.geocode("196.200.54.1").await.unwrap();
        let address = results.first().unwrap();

        assert_eq!(address.country().name(), Some("Côte d'Ivoire"));
        assert_eq!(address.country().code(), Some("CI"));
        assert_eq!(address.locality(), Some("Abidjan"));
        assert_eq!(address.admin_levels().get(1).and_then(|l| l.code()), Some("LG"));
        assert_eq!(address.point().longitude(), Some(-4.0012));
        assert_eq!(
            http.last_url().as_deref(),
            Some("http://www.geoplugin.net/json.gp?ip=196.200.54.1")
        );
    }

    #[tokio::test]
    async fn test_status_404_is_no_result() {
        let body = r#"{"geoplugin_request": "10.0.0.1", "geoplugin_status": 404, "geoplugin_city": ""}"#;
        let provider = GeoPlugin::new(Arc::new(MockHttp::with_body(body)));
        let err = provider.geocode("10.0.0.1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoResult);
    }

    #[tokio::test]
    async fn test_ipv6_is_unsupported() {
        let provider = GeoPlugin::new(Arc::new(MockHttp::forbidden()));
        let err = provider.geocode("2001:db8::1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }

    #[tokio::test]
    async fn test_loopback_is_local() {
        let http = Arc::new(MockHttp::new());
        let provider = GeoPlugin::new(http.clone());
        let results = provider.geocode("127.0.0.1").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.first().unwrap().locality(), Some("localhost"));
        assert_eq!(http.calls(), 0);
    }
}
