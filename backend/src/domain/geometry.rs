//! Bounding boxes for GeoJSON geometries.
//!
//! Coordinates are read into a [`CoordinateTree`] and walked without looking
//! at the geometry `type`, so every nesting depth (Point, LineString, Polygon,
//! MultiPolygon and anything deeper) takes the same path.
//!
//! Input positions follow GeoJSON `[longitude, latitude]` order. Output
//! bounds follow map display order `[[min_lat, min_lng], [max_lat, max_lng]]`.
//! Geometries crossing the antimeridian are not special-cased: longitudes are
//! compared as plain numbers.
//!
//! [`area_km2`] is the one place a geometry is decoded into `geo` types.

use geo::GeodesicArea;
use serde::Serialize;
use serde_json::{Value, json};

/// A single geographic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Parsed GeoJSON `coordinates` value.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateTree {
    /// A numeric `[lng, lat, ...]` leaf.
    Position(LatLng),
    /// Any deeper level of nesting.
    Sequence(Vec<CoordinateTree>),
}

impl CoordinateTree {
    /// Parse a JSON `coordinates` value.
    ///
    /// Returns `None` when the value is not an array. Malformed members of a
    /// sequence are dropped rather than failing the whole tree.
    pub fn from_json(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if let Some(position) = position_from(items) {
            return Some(Self::Position(position));
        }
        Some(Self::Sequence(
            items.iter().filter_map(Self::from_json).collect(),
        ))
    }

    /// Visit every position in document order.
    pub fn for_each_position(&self, visit: &mut impl FnMut(LatLng)) {
        match self {
            Self::Position(position) => visit(*position),
            Self::Sequence(children) => {
                for child in children {
                    child.for_each_position(visit);
                }
            }
        }
    }

    /// Bounding box of every position in the tree.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut bounds: Option<GeoBounds> = None;
        self.for_each_position(&mut |position| {
            bounds = Some(match bounds {
                Some(current) => current.including(position),
                None => GeoBounds::from_position(position),
            });
        });
        bounds
    }
}

fn position_from(items: &[Value]) -> Option<LatLng> {
    let [lng, lat, ..] = items else {
        return None;
    };
    let lng = lng.as_f64().filter(|value| value.is_finite())?;
    let lat = lat.as_f64().filter(|value| value.is_finite())?;
    Some(LatLng { lat, lng })
}

/// Axis-aligned bounding box.
///
/// Serialises as `[[min_lat, min_lng], [max_lat, max_lng]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[[f64; 2]; 2]")]
pub struct GeoBounds {
    /// South-west corner.
    pub min: LatLng,
    /// North-east corner.
    pub max: LatLng,
}

impl GeoBounds {
    /// Zero-area box around one position.
    pub fn from_position(position: LatLng) -> Self {
        Self {
            min: position,
            max: position,
        }
    }

    /// Grow the box to include `position`.
    #[must_use]
    pub fn including(self, position: LatLng) -> Self {
        Self {
            min: LatLng {
                lat: self.min.lat.min(position.lat),
                lng: self.min.lng.min(position.lng),
            },
            max: LatLng {
                lat: self.max.lat.max(position.lat),
                lng: self.max.lng.max(position.lng),
            },
        }
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.including(other.min).including(other.max)
    }

    /// `true` when the box has no extent along either axis.
    pub fn is_degenerate(&self) -> bool {
        self.min.lat >= self.max.lat || self.min.lng >= self.max.lng
    }

    /// Display-order array `[[min_lat, min_lng], [max_lat, max_lng]]`.
    pub fn to_array(&self) -> [[f64; 2]; 2] {
        [[self.min.lat, self.min.lng], [self.max.lat, self.max.lng]]
    }

    /// The box as a closed GeoJSON Polygon ring in `[lng, lat]` order.
    pub fn to_polygon(&self) -> Value {
        let (south, west) = (self.min.lat, self.min.lng);
        let (north, east) = (self.max.lat, self.max.lng);
        json!({
            "type": "Polygon",
            "coordinates": [[
                [west, south],
                [east, south],
                [east, north],
                [west, north],
                [west, south]
            ]]
        })
    }
}

impl From<GeoBounds> for [[f64; 2]; 2] {
    fn from(value: GeoBounds) -> Self {
        value.to_array()
    }
}

/// Bounding box of a GeoJSON geometry.
///
/// Reads `coordinates` at any nesting depth, unions the members of a
/// `geometries` collection, and unwraps a Feature's `geometry`. Returns `None`
/// when the geometry is absent or holds no numeric position.
///
/// # Examples
/// ```
/// use city_boundaries::domain::geometry::bounds;
/// use serde_json::json;
///
/// let polygon = json!({
///     "type": "Polygon",
///     "coordinates": [[[10, 20], [11, 20], [11, 21], [10, 21], [10, 20]]]
/// });
/// let bounds = bounds(Some(&polygon)).expect("polygon has positions");
/// assert_eq!(bounds.to_array(), [[20.0, 10.0], [21.0, 11.0]]);
/// ```
pub fn bounds(geometry: Option<&Value>) -> Option<GeoBounds> {
    let object = geometry?.as_object()?;

    let own = object
        .get("coordinates")
        .and_then(CoordinateTree::from_json)
        .and_then(|tree| tree.bounds());
    let members = object
        .get("geometries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .chain(object.get("geometry"))
        .filter_map(|member| bounds(Some(member)));

    members.fold(own, |acc, member| match acc {
        Some(current) => Some(current.union(member)),
        None => Some(member),
    })
}

/// Geodesic area of a polygonal GeoJSON geometry in square kilometres.
///
/// Returns `None` when the value is not valid GeoJSON or encloses no area,
/// which covers points and lines.
///
/// # Examples
/// ```
/// use city_boundaries::domain::geometry::area_km2;
/// use serde_json::json;
///
/// let square = json!({
///     "type": "Polygon",
///     "coordinates": [[[0.0, 0.0], [0.1, 0.0], [0.1, 0.1], [0.0, 0.1], [0.0, 0.0]]]
/// });
/// let area = area_km2(&square).expect("polygon has an area");
/// assert!((area - 123.0).abs() < 1.0);
/// ```
pub fn area_km2(geometry: &Value) -> Option<f64> {
    let geometry = geojson::Geometry::from_json_value(geometry.clone()).ok()?;
    let geometry = geo::Geometry::<f64>::try_from(geometry).ok()?;
    let square_metres = geometry.geodesic_area_unsigned();
    (square_metres.is_finite() && square_metres > 0.0).then(|| square_metres / 1_000_000.0)
}
