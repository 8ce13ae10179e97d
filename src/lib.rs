//! Geochain - provider-agnostic geocoding with fallback chains
//!
//! Forward, reverse and IP geocoding through a set of upstream services, all
//! normalized to one [`Address`] model. A [`ProviderChain`] tries several
//! providers under one deadline and reports every attempt when none answers.

pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod provider;
pub mod providers;

pub use classify::{classify, GeocodeRequest, QueryKind};
pub use config::Config;
pub use error::{Attempt, AttemptOutcome, ErrorKind, GeocodeError};
pub use http::{HttpAdapter, ReqwestAdapter};
pub use models::{Address, AddressCollection, AdminLevel, Bounds, Country, GeoPoint};
pub use provider::{
    Capabilities, ChainOutcome, Credential, DispatchStrategy, Operation, Provider, ProviderChain,
};
