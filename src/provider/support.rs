//! Steps every provider runs before and around its network call.

use std::fmt;

use tracing::debug;
use url::Url;

use super::{Capabilities, Operation};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter, TransportError};
use crate::models::{Address, AddressCollection};

/// Value used for every component of the loopback result.
pub const LOCALHOST: &str = "localhost";

/// API key or account name. Blank values count as missing.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(Option<String>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(value))
        }
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The value, or `InvalidCredentials` when it was never configured.
    pub fn require(&self, provider: &str, request: &str) -> Result<&str, GeocodeError> {
        self.0
            .as_deref()
            .ok_or_else(|| GeocodeError::invalid_credentials(provider, request))
    }
}

impl From<Option<String>> for Credential {
    fn from(value: Option<String>) -> Self {
        value.map(Credential::new).unwrap_or_default()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => write!(f, "Credential(***)"),
            None => write!(f, "Credential(None)"),
        }
    }
}

/// Capability check and loopback short-circuit for forward lookups.
///
/// Returns `Ok(Some(..))` with the synthetic result when the query is a
/// loopback address the provider is able to handle.
pub fn preflight_geocode(
    provider: &str,
    capabilities: Capabilities,
    request: &GeocodeRequest,
) -> Result<Option<AddressCollection>, GeocodeError> {
    let operation = Operation::Geocode(request.kind());
    if !capabilities.supports(operation) {
        return Err(GeocodeError::unsupported(
            provider,
            request.text(),
            format!("{} is not supported", operation),
        ));
    }
    if request.is_loopback() {
        debug!("{}: answering loopback query locally", provider);
        return Ok(Some(localhost_collection(provider)));
    }
    Ok(None)
}

/// Capability check and coordinate validation for reverse lookups.
pub fn preflight_reverse(
    provider: &str,
    capabilities: Capabilities,
    latitude: f64,
    longitude: f64,
) -> Result<(), GeocodeError> {
    if !capabilities.supports(Operation::Reverse) {
        return Err(unsupported_reverse(provider, latitude, longitude));
    }
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if !valid {
        return Err(GeocodeError::invalid_argument(
            provider,
            reverse_description(latitude, longitude),
            "coordinates out of range",
        ));
    }
    Ok(())
}

/// Error for providers that only handle forward lookups.
pub fn unsupported_reverse(provider: &str, latitude: f64, longitude: f64) -> GeocodeError {
    GeocodeError::unsupported(
        provider,
        reverse_description(latitude, longitude),
        format!("{} is not supported", Operation::Reverse),
    )
}

pub fn reverse_description(latitude: f64, longitude: f64) -> String {
    format!("reverse({}, {})", latitude, longitude)
}

/// The fixed result for loopback addresses.
pub fn localhost_collection(provider: &str) -> AddressCollection {
    let local = || Some(LOCALHOST.to_string());
    let address = Address::builder(provider)
        .locality(local())
        .admin_level(1, local(), None)
        .admin_level(2, local(), None)
        .country_name(local())
        .build();
    AddressCollection::new(vec![address])
}

/// Fetch `url` and map transport outcomes onto the error taxonomy.
///
/// Empty or whitespace-only bodies become `NoResult`.
pub async fn fetch(
    http: &dyn HttpAdapter,
    provider: &str,
    url: &Url,
) -> Result<Vec<u8>, GeocodeError> {
    let request = describe(url);
    debug!("{}: {} via {}", provider, request, http.name());

    match http.fetch(url).await {
        Ok(Some(body)) if !body.iter().all(u8::is_ascii_whitespace) => Ok(body),
        Ok(_) => Err(GeocodeError::no_result(provider, request)),
        Err(TransportError::Status(401 | 403)) => {
            Err(GeocodeError::invalid_credentials(provider, request))
        }
        Err(TransportError::Status(429)) => Err(GeocodeError::quota_exceeded(provider, request)),
        Err(source) => Err(GeocodeError::Transport {
            provider: provider.to_string(),
            request,
            source,
        }),
    }
}
