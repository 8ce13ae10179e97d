//! Coordinates and bounding boxes.

use geo_types::{coord, Point, Rect};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Geographic point (lat/lon)
///
/// Either both coordinates are present or neither is. A point built from a
/// partial pair, or from non-finite values, is undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoPoint {
    inner: Option<Point<f64>>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::from_parts(Some(latitude), Some(longitude))
    }

    /// Build from optional parts; a missing half leaves the point undefined.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Self {
                inner: Some(Point::new(lon, lat)),
            },
            _ => Self::undefined(),
        }
    }

    pub const fn undefined() -> Self {
        Self { inner: None }
    }

    pub fn is_defined(&self) -> bool {
        self.inner.is_some()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.inner.map(|p| p.y())
    }

    pub fn longitude(&self) -> Option<f64> {
        self.inner.map(|p| p.x())
    }

    /// The point as `geo_types` (x = longitude, y = latitude).
    pub fn to_point(&self) -> Option<Point<f64>> {
        self.inner
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GeoPoint", 2)?;
        state.serialize_field("latitude", &self.latitude())?;
        state.serialize_field("longitude", &self.longitude())?;
        state.end()
    }
}

/// Bounding box as reported by the upstream service.
///
/// Edges are kept exactly as supplied. Missing edges are never synthesized,
/// so a partial box stays undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    south: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    west: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    north: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    east: Option<f64>,
}

impl Bounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::from_edges(Some(south), Some(west), Some(north), Some(east))
    }

    pub fn from_edges(
        south: Option<f64>,
        west: Option<f64>,
        north: Option<f64>,
        east: Option<f64>,
    ) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            south: finite(south),
            west: finite(west),
            north: finite(north),
            east: finite(east),
        }
    }

    pub const fn undefined() -> Self {
        Self {
            south: None,
            west: None,
            north: None,
            east: None,
        }
    }

    /// True only when all four edges are set and `south <= north`.
    pub fn is_defined(&self) -> bool {
        match (self.south, self.west, self.north, self.east) {
            (Some(s), Some(_), Some(n), Some(_)) => s <= n,
            _ => false,
        }
    }

    pub fn south(&self) -> Option<f64> {
        self.south
    }

    pub fn west(&self) -> Option<f64> {
        self.west
    }

    pub fn north(&self) -> Option<f64> {
        self.north
    }

    pub fn east(&self) -> Option<f64> {
        self.east
    }

    /// Convert a defined box into a `geo_types::Rect`.
    ///
    /// Boxes crossing the antimeridian (west > east) have no `Rect` form.
    pub fn to_rect(&self) -> Option<Rect<f64>> {
        if !self.is_defined() {
            return None;
        }
        let (s, w, n, e) = (self.south?, self.west?, self.north?, self.east?);
        if w > e {
            return None;
        }
        Some(Rect::new(coord! { x: w, y: s }, coord! { x: e, y: n }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_requires_both_halves() {
        let p = GeoPoint::from_parts(Some(48.86), None);
        assert!(!p.is_defined());
        assert_eq!(p.latitude(), None);
        assert_eq!(p.longitude(), None);

        let p = GeoPoint::new(48.86, 2.35);
        assert_eq!(p.latitude(), Some(48.86));
        assert_eq!(p.longitude(), Some(2.35));
    }

    #[test]
    fn test_point_rejects_nan() {
        assert!(!GeoPoint::new(f64::NAN, 2.0).is_defined());
    }

    #[test]
    fn test_geo_types_axis_order() {
        let p = GeoPoint::new(10.0, 20.0).to_point().unwrap();
        assert_eq!(p.x(), 20.0);
        assert_eq!(p.y(), 10.0);
    }

    #[test]
    fn test_full_bounds_defined() {
        let b = Bounds::new(48.8, 2.2, 48.9, 2.4);
        assert!(b.is_defined());
        let rect = b.to_rect().unwrap();
        assert_eq!(rect.min().y, 48.8);
        assert_eq!(rect.max().x, 2.4);
    }

    #[test]
    fn test_partial_bounds_undefined() {
        let b = Bounds::from_edges(Some(48.8), None, Some(48.9), Some(2.4));
        assert!(!b.is_defined());
        assert_eq!(b.west(), None);
        assert_eq!(b.south(), Some(48.8));
        assert!(b.to_rect().is_none());
    }

    #[test]
    fn test_inverted_bounds_undefined() {
        assert!(!Bounds::new(49.0, 2.2, 48.0, 2.4).is_defined());
    }

    #[test]
    fn test_antimeridian_box_has_no_rect() {
        let b = Bounds::new(-20.0, 170.0, -10.0, -170.0);
        assert!(b.is_defined());
        assert!(b.to_rect().is_none());
    }

    #[test]
    fn test_point_serializes_nulls() {
        let json = serde_json::to_value(GeoPoint::undefined()).unwrap();
        assert!(json["latitude"].is_null());
    }
}
