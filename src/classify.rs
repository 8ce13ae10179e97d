//! Query classification: IPv4 literal, IPv6 literal, or free-form place.

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// What kind of input a geocode query is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    StreetAddress,
    Ipv4,
    Ipv6,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::StreetAddress => write!(f, "street address"),
            QueryKind::Ipv4 => write!(f, "IPv4 address"),
            QueryKind::Ipv6 => write!(f, "IPv6 address"),
        }
    }
}

/// Classify a query. Never fails; anything that is not an IP literal is a
/// street address.
///
/// IPv4-mapped IPv6 literals (`::ffff:a.b.c.d`) classify as IPv6.
pub fn classify(query: &str) -> QueryKind {
    let query = query.trim();
    if query.parse::<Ipv4Addr>().is_ok() {
        QueryKind::Ipv4
    } else if query.parse::<Ipv6Addr>().is_ok() {
        QueryKind::Ipv6
    } else {
        QueryKind::StreetAddress
    }
}

/// True for loopback literals: `127.0.0.0/8`, `::1` and mapped `::ffff:127.x.x.x`.
pub fn is_loopback(query: &str) -> bool {
    match query.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_loopback(),
        Ok(IpAddr::V6(v6)) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
        Err(_) => false,
    }
}

/// A forward query classified once, shared by every provider it is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeRequest {
    text: String,
    kind: QueryKind,
}

impl GeocodeRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            kind: classify(text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn is_ip(&self) -> bool {
        self.kind != QueryKind::StreetAddress
    }

    pub fn is_loopback(&self) -> bool {
        self.is_ip() && is_loopback(&self.text)
    }

    /// For IPv4-mapped IPv6 input, the embedded IPv4 address.
    pub fn embedded_ipv4(&self) -> Option<Ipv4Addr> {
        match self.kind {
            QueryKind::Ipv4 => self.text.parse().ok(),
            QueryKind::Ipv6 => self
                .text
                .parse::<Ipv6Addr>()
                .ok()
                .and_then(|v6| v6.to_ipv4_mapped()),
            QueryKind::StreetAddress => None,
        }
    }

    /// Text to send upstream. Mapped IPv6 input is looked up by its embedded IPv4.
    pub fn lookup_address(&self) -> String {
        match (self.kind, self.embedded_ipv4()) {
            (QueryKind::Ipv6, Some(v4)) => v4.to_string(),
            _ => self.text.clone(),
        }
    }
}
