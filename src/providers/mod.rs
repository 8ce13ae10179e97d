//! Concrete providers, one per upstream service.
//!
//! Each module keeps its own raw response structures and maps them onto
//! [`Address`]. Shared steps live in [`crate::provider::support`] and
//! [`crate::provider::normalize`].

pub mod arcgis_online;
pub mod bing_maps;
pub mod free_geo_ip;
pub mod geo_plugin;
pub mod geonames;
pub mod google_maps;
pub mod host_ip;
pub mod ip_info_db;
pub mod mapquest;
pub mod maxmind;
pub mod nominatim;
pub mod yandex;

pub use arcgis_online::ArcGisOnline;
pub use bing_maps::BingMaps;
pub use free_geo_ip::FreeGeoIp;
pub use geo_plugin::GeoPlugin;
pub use geonames::GeoNames;
pub use google_maps::GoogleMaps;
pub use host_ip::HostIp;
pub use ip_info_db::IpInfoDb;
pub use mapquest::MapQuest;
pub use maxmind::MaxMind;
pub use nominatim::Nominatim;
pub use yandex::Yandex;

use url::Url;

use crate::error::GeocodeError;
use crate::models::{Address, AddressCollection};

/// Upstream result count asked for when none is configured.
pub const DEFAULT_LIMIT: usize = 5;

/// Settings every provider accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Preferred result language, e.g. `"fr"`.
    pub locale: Option<String>,
    /// Maximum number of results kept.
    pub limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            locale: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Options {
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub(crate) fn limit_param(&self) -> String {
        self.limit.to_string()
    }
}

/// Build a request URL; a malformed base is reported as `InvalidArgument`.
pub(crate) fn build_url(
    provider: &str,
    base: &str,
    params: &[(&str, &str)],
) -> Result<Url, GeocodeError> {
    Url::parse_with_params(base, params).map_err(|e| {
        GeocodeError::invalid_argument(provider, base, format!("invalid request URL: {}", e))
    })
}

/// Drop blank addresses and apply the limit. Nothing left is `NoResult`.
pub(crate) fn finish(
    provider: &str,
    request: &str,
    addresses: Vec<Address>,
    limit: usize,
) -> Result<AddressCollection, GeocodeError> {
    let addresses: Vec<Address> = addresses.into_iter().filter(|a| !a.is_blank()).collect();
    if addresses.is_empty() {
        return Err(GeocodeError::no_result(provider, request));
    }
    Ok(AddressCollection::with_limit(addresses, Some(limit)))
}
