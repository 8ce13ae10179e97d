//! TOML configuration for a provider chain.
//!
//! ```toml
//! [chain]
//! strategy = "sequential"
//! deadline_secs = 20
//!
//! [http]
//! user_agent = "geochain/0.1"
//! timeout_secs = 30
//!
//! [[providers]]
//! provider = "google_maps"
//! api_key = "..."
//! locale = "fr"
//! limit = 5
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::http::{HttpAdapter, ReqwestAdapter, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::provider::{Credential, DispatchStrategy, Provider, ProviderChain};
use crate::providers::{
    ip_info_db, maxmind, ArcGisOnline, BingMaps, FreeGeoIp, GeoNames, GeoPlugin,
    GoogleMaps, HostIp, IpInfoDb, MapQuest, MaxMind, Nominatim, Options, Yandex,
};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChainConfig {
    #[serde(default)]
    pub strategy: DispatchStrategy,
    /// Whole-call deadline; no deadline when absent.
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// One chain member, in priority order.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub kind: ProviderKind,
    pub locale: Option<String>,
    pub limit: Option<usize>,
}

/// Provider selection and its provider-specific settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(alias = "nominatim")]
    Openstreetmap { root_url: Option<String> },
    GoogleMaps {
        api_key: Option<String>,
        region: Option<String>,
    },
    BingMaps { api_key: Option<String> },
    Geonames { username: Option<String> },
    ArcgisOnline {
        token: Option<String>,
        source_country: Option<String>,
    },
    Yandex {
        api_key: Option<String>,
        toponym: Option<String>,
    },
    Mapquest { api_key: Option<String> },
    FreeGeoIp { root_url: Option<String> },
    HostIp,
    GeoPlugin,
    IpInfoDb {
        api_key: Option<String>,
        precision: Option<ip_info_db::Precision>,
    },
    Maxmind {
        license_key: Option<String>,
        service: Option<maxmind::Service>,
    },
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Openstreetmap { .. } => "openstreetmap",
            ProviderKind::GoogleMaps { .. } => "google_maps",
            ProviderKind::BingMaps { .. } => "bing_maps",
            ProviderKind::Geonames { .. } => "geonames",
            ProviderKind::ArcgisOnline { .. } => "arcgis_online",
            ProviderKind::Yandex { .. } => "yandex",
            ProviderKind::Mapquest { .. } => "mapquest",
            ProviderKind::FreeGeoIp { .. } => "free_geo_ip",
            ProviderKind::HostIp => "host_ip",
            ProviderKind::GeoPlugin => "geo_plugin",
            ProviderKind::IpInfoDb { .. } => "ip_info_db",
            ProviderKind::Maxmind { .. } => "maxmind",
        }
    }

    /// The credential a provider cannot work without, if any.
    fn mandatory_credential(&self) -> Option<(&'static str, &Option<String>)> {
        match self {
            ProviderKind::BingMaps { api_key }
            | ProviderKind::Mapquest { api_key }
            | ProviderKind::IpInfoDb { api_key, .. } => Some(("api_key", api_key)),
            ProviderKind::Geonames { username } => Some(("username", username)),
            ProviderKind::Maxmind { license_key, .. } => Some(("license_key", license_key)),
            _ => None,
        }
    }
}

impl ProviderConfig {
    fn options(&self) -> Options {
        let mut options = Options::default();
        if let Some(locale) = &self.locale {
            options = options.with_locale(locale.clone());
        }
        if let Some(limit) = self.limit {
            options = options.with_limit(limit);
        }
        options
    }

    /// Instantiate the provider on top of `http`.
    pub fn build(&self, http: Arc<dyn HttpAdapter>) -> Arc<dyn Provider> {
        let options = self.options();
        let credential = |value: &Option<String>| Credential::from(value.clone());

        match &self.kind {
            ProviderKind::Openstreetmap { root_url } => {
                let mut provider = Nominatim::new(http).with_options(options);
                if let Some(root) = root_url {
                    provider = provider.with_root_url(root);
                }
                Arc::new(provider)
            }
            ProviderKind::GoogleMaps { api_key, region } => {
                let mut provider = GoogleMaps::new(http)
                    .with_api_key(credential(api_key))
                    .with_options(options);
                if let Some(region) = region {
                    provider = provider.with_region(region.clone());
                }
                Arc::new(provider)
            }
            ProviderKind::BingMaps { api_key } => {
                Arc::new(BingMaps::new(http, credential(api_key)).with_options(options))
            }
            ProviderKind::Geonames { username } => {
                Arc::new(GeoNames::new(http, credential(username)).with_options(options))
            }
            ProviderKind::ArcgisOnline {
                token,
                source_country,
            } => {
                let mut provider = ArcGisOnline::new(http)
                    .with_token(credential(token))
                    .with_options(options);
                if let Some(country) = source_country {
                    provider = provider.with_source_country(country.clone());
                }
                Arc::new(provider)
            }
            ProviderKind::Yandex { api_key, toponym } => {
                let mut provider = Yandex::new(http)
                    .with_api_key(credential(api_key))
                    .with_options(options);
                if let Some(kind) = toponym {
                    provider = provider.with_toponym(kind.clone());
                }
                Arc::new(provider)
            }
            ProviderKind::Mapquest { api_key } => {
                Arc::new(MapQuest::new(http, credential(api_key)).with_options(options))
            }
            ProviderKind::FreeGeoIp { root_url } => {
                let mut provider = FreeGeoIp::new(http);
                if let Some(root) = root_url {
                    provider = provider.with_root_url(root);
                }
                Arc::new(provider)
            }
            ProviderKind::HostIp => Arc::new(HostIp::new(http)),
            ProviderKind::GeoPlugin => Arc::new(GeoPlugin::new(http)),
            ProviderKind::IpInfoDb { api_key, precision } => Arc::new(
                IpInfoDb::new(http, credential(api_key))
                    .with_precision(precision.unwrap_or_default()),
            ),
            ProviderKind::Maxmind {
                license_key,
                service,
            } => Arc::new(
                MaxMind::new(http, credential(license_key))
                    .with_service(service.unwrap_or_default()),
            ),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Reject configurations that could never answer a query.
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            bail!("no providers configured");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be greater than zero");
        }
        if self.chain.deadline_secs == Some(0) {
            bail!("chain.deadline_secs must be greater than zero");
        }
        for (index, provider) in self.providers.iter().enumerate() {
            let name = provider.kind.name();
            if provider.limit == Some(0) {
                bail!("providers[{}] ({}): limit must be at least 1", index, name);
            }
            if let Some((field, value)) = provider.kind.mandatory_credential() {
                if !Credential::from(value.clone()).is_set() {
                    bail!("providers[{}] ({}): missing {}", index, name, field);
                }
            }
        }
        Ok(())
    }

    /// The HTTP transport described by `[http]`.
    pub fn http_adapter(&self) -> Result<Arc<dyn HttpAdapter>> {
        let adapter = ReqwestAdapter::new(
            &self.http.user_agent,
            Duration::from_secs(self.http.timeout_secs),
        )
        .context("Failed to build HTTP client")?;
        Ok(Arc::new(adapter))
    }

    /// Validate, then build the chain with every provider sharing `http`.
    pub fn build_chain(&self, http: Arc<dyn HttpAdapter>) -> Result<ProviderChain> {
        self.validate()?;
        let members = self
            .providers
            .iter()
            .map(|p| p.build(http.clone()))
            .collect();
        let mut chain = ProviderChain::new(members).with_strategy(self.chain.strategy);
        if let Some(secs) = self.chain.deadline_secs {
            chain = chain.with_deadline(Duration::from_secs(secs));
        }
        Ok(chain)
    }
}
