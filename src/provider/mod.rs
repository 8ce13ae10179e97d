//! Provider abstraction and the fallback chain built on top of it.

pub mod chain;
pub mod normalize;
pub mod support;

pub use chain::{ChainOutcome, DispatchStrategy, ProviderChain};
pub use support::Credential;

use async_trait::async_trait;
use std::fmt;

use crate::classify::{GeocodeRequest, QueryKind};
use crate::error::GeocodeError;
use crate::models::AddressCollection;

/// Inputs and operations a provider accepts, fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub street_address: bool,
    pub ipv4: bool,
    pub ipv6: bool,
    pub reverse: bool,
}

impl Capabilities {
    /// Address lookups plus reverse geocoding.
    pub const ADDRESS: Self = Self {
        street_address: true,
        ipv4: false,
        ipv6: false,
        reverse: true,
    };

    pub const IPV4: Self = Self {
        street_address: false,
        ipv4: true,
        ipv6: false,
        reverse: false,
    };

    pub const IP: Self = Self {
        street_address: false,
        ipv4: true,
        ipv6: true,
        reverse: false,
    };

    pub fn supports_kind(&self, kind: QueryKind) -> bool {
        match kind {
            QueryKind::StreetAddress => self.street_address,
            QueryKind::Ipv4 => self.ipv4,
            QueryKind::Ipv6 => self.ipv6,
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::Geocode(kind) => self.supports_kind(kind),
            Operation::Reverse => self.reverse,
        }
    }

    pub fn supports_ip(&self) -> bool {
        self.ipv4 || self.ipv6
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            street_address: self.street_address || other.street_address,
            ipv4: self.ipv4 || other.ipv4,
            ipv6: self.ipv6 || other.ipv6,
            reverse: self.reverse || other.reverse,
        }
    }
}

/// The operation a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Geocode(QueryKind),
    Reverse,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Geocode(kind) => write!(f, "geocoding of {}", kind),
            Operation::Reverse => write!(f, "reverse geocoding"),
        }
    }
}

/// A geocoding service normalized to the shared [`Address`](crate::models::Address) model.
///
/// Implementations check the request against [`Provider::capabilities`]
/// before anything else, then credentials, and only then touch the network.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, e.g. `"openstreetmap"`.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Forward lookup of an already classified query.
    async fn geocode_request(
        &self,
        request: &GeocodeRequest,
    ) -> Result<AddressCollection, GeocodeError>;

    /// Coordinates to addresses.
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError>;

    /// Classify `query` and look it up.
    async fn geocode(&self, query: &str) -> Result<AddressCollection, GeocodeError> {
        let request = GeocodeRequest::new(query);
        self.geocode_request(&request).await
    }
}
