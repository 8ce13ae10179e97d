use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_url, finish};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{loose_f64, parse_json, without_placeholder};
use crate::provider::support::{fetch, preflight_geocode, unsupported_reverse};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "host_ip";
const ENDPOINT: &str = "http://api.hostip.info/get_json.php";

const UNKNOWN: &[&str] = &[
    "(Unknown City?)",
    "(Unknown Country?)",
    "(Private Address)",
    "XX",
];

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default, deserialize_with = "loose_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    lng: Option<f64>,
    city: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
}

impl Response {
    fn into_address(self) -> Address {
        Address::builder(NAME)
            .coordinates(self.lat, self.lng)
            .locality(without_placeholder(self.city, UNKNOWN))
            .country_name(without_placeholder(self.country_name, UNKNOWN))
            .country_code(without_placeholder(self.country_code, UNKNOWN))
            .build()
    }
}

/// hostip.info community database. IPv4 only.
pub struct HostIp {
    http: Arc<dyn HttpAdapter>,
}

impl HostIp {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Provider for HostIp {
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

        let url = build_url(
            NAME,
            ENDPOINT,
            &[("ip", request.text()), ("position", "true")],
        )?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::mock::MockHttp;

    #[tokio::test]
    async fn test_known_ip() {
        let body = r#"{"country_name":"UNITED STATES","country_code":"US","city":"Aurora, TX","ip":"33.33.33.22","lat":"33.0582","lng":"-97.5159"}"#;
        let http = Arc::new(MockHttp::with_body(body));
        let provider = HostIp::new(http.clone());
        let results = provider.geocode("33.33.33.22").await.unwrap();
        let address = results.first().unwrap();

        assert_eq!(address.point().latitude(), Some(33.0582));
        assert_eq!(address.point().longitude(), Some(-97.5159));
        assert_eq!(address.locality(), Some("Aurora, TX"));
        assert_eq!(address.country().name(), Some("UNITED STATES"));
        assert_eq!(address.country().code(), Some("US"));
        assert!(http.last_url().unwrap().contains("ip=33.33.33.22"));
    }

    #[tokio::test]
    async fn test_unknown_city_keeps_country() {
        let body = r#"{"country_name":"FRANCE","country_code":"FR","city":"(Unknown City?)","ip":"88.188.221.14","lat":"","lng":""}"#;
        let provider = HostIp::new(Arc::new(MockHttp::with_body(body)));
        let results = provider.geocode("88.188.221.14").await.unwrap();
        let address = results.first().unwrap();
        assert_eq!(address.locality(), None);
        assert!(!address.point().is_defined());
        assert_eq!(address.country().code(), Some("FR"));
    }

    #[tokio::test]
    async fn test_private_address_is_no_result() {
        let body = r#"{"country_name":"(Private Address)","country_code":"XX","city":"(Private Address)","ip":"192.168.1.1","lat":null,"lng":null}"#;
        let provider = HostIp::new(Arc::new(MockHttp::with_body(body)));
        let err = provider.geocode("192.168.1.1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoResult);
    }

    #[tokio::test]
    async fn test_ipv6_is_unsupported() {
        let provider = HostIp::new(Arc::new(MockHttp::forbidden()));
        for query in ["2001:db8::1", "::1", "::ffff:88.188.221.14"] {
            let err = provider.geocode(query).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation, "{}", query);
        }
    }

    #[tokio::test]
    async fn test_loopback_ipv4() {
        let provider = HostIp::new(Arc::new(MockHttp::forbidden()));
        let results = provider.geocode("127.0.0.1").await.unwrap();
        assert_eq!(results.first().unwrap().country().name(), Some("localhost"));
    }
}
