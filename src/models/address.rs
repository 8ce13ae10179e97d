//! Normalized geocoding result.

use serde::Serialize;
use tracing::trace;

use super::{AdminLevel, AdminLevelCollection, Bounds, GeoPoint};

/// Country name and code.
///
/// The code is ISO 3166-1 alpha-2 or alpha-3 depending on the provider; it is
/// not converted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Country {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl Country {
    pub fn new(name: Option<String>, code: Option<String>) -> Self {
        Self {
            name: clean(name),
            code: clean(code),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none()
    }
}

/// A single location returned by a provider.
///
/// Every component is independently optional; `None` means the provider did
/// not supply it for this result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    provided_by: String,
    point: GeoPoint,
    bounds: Bounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    street_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city_district: Option<String>,
    #[serde(skip_serializing_if = "AdminLevelCollection::is_empty")]
    admin_levels: AdminLevelCollection,
    #[serde(skip_serializing_if = "Country::is_empty")]
    country: Country,
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
}

impl Address {
    pub fn builder(provided_by: &str) -> AddressBuilder {
        AddressBuilder::new(provided_by)
    }

    pub fn provided_by(&self) -> &str {
        &self.provided_by
    }

    pub fn point(&self) -> GeoPoint {
        self.point
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn street_number(&self) -> Option<&str> {
        self.street_number.as_deref()
    }

    pub fn street_name(&self) -> Option<&str> {
        self.street_name.as_deref()
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn sub_locality(&self) -> Option<&str> {
        self.sub_locality.as_deref()
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }

    pub fn city_district(&self) -> Option<&str> {
        self.city_district.as_deref()
    }

    pub fn admin_levels(&self) -> &AdminLevelCollection {
        &self.admin_levels
    }

    pub fn country(&self) -> &Country {
        &self.country
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// True when no component at all was filled in.
    pub fn is_blank(&self) -> bool {
        !self.point.is_defined()
            && self.bounds == Bounds::undefined()
            && self.street_number.is_none()
            && self.street_name.is_none()
            && self.locality.is_none()
            && self.sub_locality.is_none()
            && self.postal_code.is_none()
            && self.city_district.is_none()
            && self.admin_levels.is_empty()
            && self.country.is_empty()
            && self.timezone.is_none()
    }
}

/// Builder used by providers to assemble an [`Address`].
///
/// Setters take `Option` so raw fields can be passed straight through; blank
/// strings are stored as `None`.
#[derive(Debug, Clone)]
pub struct AddressBuilder {
    address: Address,
    country_name: Option<String>,
    country_code: Option<String>,
}

impl AddressBuilder {
    pub fn new(provided_by: &str) -> Self {
        Self {
            address: Address {
                provided_by: provided_by.to_string(),
                point: GeoPoint::undefined(),
                bounds: Bounds::undefined(),
                street_number: None,
                street_name: None,
                locality: None,
                sub_locality: None,
                postal_code: None,
                city_district: None,
                admin_levels: AdminLevelCollection::default(),
                country: Country::default(),
                timezone: None,
            },
            country_name: None,
            country_code: None,
        }
    }

    pub fn coordinates(mut self, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        self.address.point = GeoPoint::from_parts(latitude, longitude);
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.address.bounds = bounds;
        self
    }

    pub fn street_number(mut self, value: Option<String>) -> Self {
        self.address.street_number = clean(value);
        self
    }

    pub fn street_name(mut self, value: Option<String>) -> Self {
        self.address.street_name = clean(value);
        self
    }

    pub fn locality(mut self, value: Option<String>) -> Self {
        self.address.locality = clean(value);
        self
    }

    pub fn sub_locality(mut self, value: Option<String>) -> Self {
        self.address.sub_locality = clean(value);
        self
    }

    pub fn postal_code(mut self, value: Option<String>) -> Self {
        self.address.postal_code = clean(value);
        self
    }

    pub fn city_district(mut self, value: Option<String>) -> Self {
        self.address.city_district = clean(value);
        self
    }

    pub fn timezone(mut self, value: Option<String>) -> Self {
        self.address.timezone = clean(value);
        self
    }

    pub fn country_name(mut self, value: Option<String>) -> Self {
        self.country_name = clean(value);
        self
    }

    pub fn country_code(mut self, value: Option<String>) -> Self {
        self.country_code = clean(value);
        self
    }

    /// Add an admin level. Levels with neither name nor code are dropped, as
    /// are out-of-range levels and repeats of a level already set.
    pub fn admin_level(mut self, level: u8, name: Option<String>, code: Option<String>) -> Self {
        let (name, code) = (clean(name), clean(code));
        if name.is_none() && code.is_none() {
            return self;
        }
        match AdminLevel::new(level, name, code)
            .and_then(|entry| self.address.admin_levels.insert(entry))
        {
            Ok(()) => {}
            Err(e) => trace!("{}: dropping admin level: {}", self.address.provided_by, e),
        }
        self
    }

    pub fn build(mut self) -> Address {
        self.address.country = Country::new(self.country_name, self.country_code);
        self.address
    }
}

/// Results of one query, best match first.
///
/// The order is the upstream's; it is never re-sorted. An empty collection is
/// a valid value, distinct from a failed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AddressCollection {
    addresses: Vec<Address>,
}

impl AddressCollection {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    /// Keep at most `limit` leading results.
    pub fn with_limit(mut addresses: Vec<Address>, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            addresses.truncate(limit);
        }
        Self { addresses }
    }

    pub fn first(&self) -> Option<&Address> {
        self.addresses.first()
    }

    pub fn get(&self, index: usize) -> Option<&Address> {
        self.addresses.get(index)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.addresses.iter()
    }
}

impl IntoIterator for AddressCollection {
    type Item = Address;
    type IntoIter = std::vec::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressCollection {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}
