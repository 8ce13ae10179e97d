//! MaxMind legacy web services.
//!
//! Answers are a single CSV record in ISO-8859-1; the last column is an error
//! code, empty on success.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{build_url, finish};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection};
use crate::provider::normalize::{latin1_to_string, parse_coordinate};
use crate::provider::support::{fetch, preflight_geocode, unsupported_reverse, Credential};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "maxmind";
const ROOT: &str = "https://geoip.maxmind.com";

/// Which legacy service to query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Country,
    City,
    #[default]
    CityIspOrg,
}

impl Service {
    fn path(self) -> &'static str {
        match self {
            Service::Country => "a",
            Service::City => "b",
            Service::CityIspOrg => "f",
        }
    }

    /// Columns in a successful record, error code included.
    fn width(self) -> usize {
        match self {
            Service::Country => 2,
            Service::City => 6,
            Service::CityIspOrg => 11,
        }
    }
}

/// Fields of one record, by service layout.
#[derive(Debug, Default, PartialEq)]
struct Record {
    country_code: Option<String>,
    region_code: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    error: Option<String>,
}

fn parse_record(service: Service, text: &str) -> Option<Record> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let row = reader.records().next()?.ok()?;
    let col = |i: usize| row.get(i).map(str::to_string).filter(|v| !v.trim().is_empty());

    // errors can arrive in a short record
    let error = row
        .get(row.len().saturating_sub(1))
        .map(str::trim)
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_uppercase() || c == '_'))
        .map(str::to_string);
    if row.len() != service.width() {
        return Some(Record {
            error: error.or_else(|| Some("MALFORMED_RECORD".to_string())),
            ..Record::default()
        });
    }

    Some(match service {
        Service::Country => Record {
            country_code: col(0),
            error,
            ..Record::default()
        },
        Service::City => Record {
            country_code: col(0),
            region_code: col(1),
            city: col(2),
            latitude: parse_coordinate(row.get(3)),
            longitude: parse_coordinate(row.get(4)),
            error,
            ..Record::default()
        },
        Service::CityIspOrg => Record {
            country_code: col(0),
            region_code: col(1),
            city: col(2),
            postal_code: col(3),
            latitude: parse_coordinate(row.get(4)),
            longitude: parse_coordinate(row.get(5)),
            error,
        },
    })
}

fn error_for(code: &str, request: String) -> GeocodeError {
    match code {
        "INVALID_LICENSE_KEY" | "LICENSE_REQUIRED" => {
            GeocodeError::invalid_credentials(NAME, request)
        }
        "MAX_REQUESTS_REACHED" | "OUT_OF_QUERIES" => GeocodeError::quota_exceeded(NAME, request),
        "INVALID_IP" | "IP_REQUIRED" => {
            GeocodeError::invalid_argument(NAME, request, code.to_ascii_lowercase())
        }
        "IP_NOT_FOUND" => GeocodeError::no_result(NAME, request),
        other => {
            warn!("{}: error {}", NAME, other);
            GeocodeError::no_result(NAME, request)
        }
    }
}

/// MaxMind GeoIP legacy web service. IPv4 and IPv6; requires a license key.
pub struct MaxMind {
    http: Arc<dyn HttpAdapter>,
    license_key: Credential,
    service: Service,
}

impl MaxMind {
    pub fn new(http: Arc<dyn HttpAdapter>, license_key: Credential) -> Self {
        Self {
            http,
            license_key,
            service: Service::default(),
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.service = service;
        self
    }
}

#[async_trait]
impl Provider for MaxMind {
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
        let key = self.license_key.require(NAME, request.text())?;

        let base = format!("{}/{}", ROOT, self.service.path());
        let ip = request.lookup_address();
        let url = build_url(NAME, &base, &[("l", key), ("i", ip.as_str())])?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let text = latin1_to_string(&body);
        let Some(record) = parse_record(self.service, &text) else {
            return Err(GeocodeError::no_result(NAME, description));
        };
        if let Some(code) = &record.error {
            return Err(error_for(code, description));
        }

        let address = Address::builder(NAME)
            .coordinates(record.latitude, record.longitude)
            .locality(record.city)
            .postal_code(record.postal_code)
            .admin_level(1, None, record.region_code)
            .country_code(record.country_code)
            .build();
        finish(NAME, &description, vec![address], 1)
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        Err(unsupported_reverse(NAME, latitude, longitude))
    }
}
