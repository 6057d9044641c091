//! GeoJSON geometry model used by the proximity and intersection queries.
//!
//! Distances are great-circle distances on a sphere with MongoDB's equatorial radius,
//! so values line up with what `$near` / `$geoNear` report for spherical queries.

use mongodb::bson::{doc, Bson, Document};

use crate::errors::QueryError;

/// Earth radius in meters as used by MongoDB's `2dsphere` calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// A longitude/latitude pair in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    /// Build a point from caller input, rejecting anything outside the valid
    /// longitude/latitude ranges.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, QueryError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(QueryError::invalid(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(QueryError::invalid(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        Ok(GeoPoint { longitude, latitude })
    }

    /// Render as a GeoJSON `Point` document.
    pub fn to_document(&self) -> Document {
        doc! {
            "type": "Point",
            "coordinates": [self.longitude, self.latitude],
        }
    }

    /// Haversine distance in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = (other.latitude - self.latitude).to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_METERS * c
    }

    /// Initial great-circle bearing towards `other`, in radians.
    fn bearing_to(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();
        let y = d_lambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
        y.atan2(x)
    }

    /// Distance in meters from this point to the great-circle segment `a`-`b`.
    pub fn distance_to_segment(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        let to_a = a.distance_to(self);
        let segment = a.distance_to(b) / EARTH_RADIUS_METERS;
        if segment == 0.0 {
            return to_a;
        }

        let delta13 = to_a / EARTH_RADIUS_METERS;
        let theta = a.bearing_to(self) - a.bearing_to(b);
        // Behind `a` along the segment's direction.
        if theta.cos() < 0.0 {
            return to_a;
        }

        let cross_track = (delta13.sin() * theta.sin()).clamp(-1.0, 1.0).asin();
        let along_track = (delta13.cos() / cross_track.cos()).clamp(-1.0, 1.0).acos();
        if along_track > segment {
            return b.distance_to(self);
        }
        cross_track.abs() * EARTH_RADIUS_METERS
    }

    fn from_bson(value: &Bson) -> Option<Self> {
        let pair = value.as_array()?;
        if pair.len() < 2 {
            return None;
        }
        Some(GeoPoint {
            longitude: as_f64(&pair[0])?,
            latitude: as_f64(&pair[1])?,
        })
    }
}

/// Stored geometries, as found in a record's `geometry` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    /// Outer ring first, then holes.
    Polygon(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Vec<GeoPoint>>>),
}

impl Geometry {
    /// Parse a GeoJSON geometry document. Unknown types and malformed
    /// coordinates yield `None`.
    pub fn from_document(geometry: &Document) -> Option<Self> {
        let kind = geometry.get_str("type").ok()?;
        let coords = geometry.get("coordinates")?;

        let parsed = match kind {
            "Point" => Geometry::Point(GeoPoint::from_bson(coords)?),
            "MultiPoint" => Geometry::MultiPoint(points(coords)?),
            "LineString" => Geometry::LineString(points(coords)?),
            "MultiLineString" => Geometry::MultiLineString(rings(coords)?),
            "Polygon" => Geometry::Polygon(rings(coords)?),
            "MultiPolygon" => Geometry::MultiPolygon(
                coords
                    .as_array()?
                    .iter()
                    .map(rings)
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        };
        Some(parsed)
    }

    /// Whether the point lies on or inside this geometry.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match self {
            Geometry::Point(p) => p == point,
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.contains(point),
            Geometry::MultiLineString(lines) => lines.iter().any(|l| l.contains(point)),
            Geometry::Polygon(rings) => polygon_contains(rings, point),
            Geometry::MultiPolygon(polys) => polys.iter().any(|r| polygon_contains(r, point)),
        }
    }

    /// Distance in meters from `point` to this geometry: zero when the point
    /// is contained, otherwise the distance to the closest edge (or vertex,
    /// for point geometries).
    pub fn distance_to(&self, point: &GeoPoint) -> f64 {
        if self.contains(point) {
            return 0.0;
        }
        match self {
            Geometry::Point(p) => p.distance_to(point),
            Geometry::MultiPoint(ps) => ps
                .iter()
                .map(|p| p.distance_to(point))
                .fold(f64::INFINITY, f64::min),
            Geometry::LineString(path) => path_distance(path, point),
            Geometry::MultiLineString(paths) | Geometry::Polygon(paths) => paths
                .iter()
                .map(|p| path_distance(p, point))
                .fold(f64::INFINITY, f64::min),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .map(|p| path_distance(p, point))
                .fold(f64::INFINITY, f64::min),
        }
    }
}

fn path_distance(path: &[GeoPoint], point: &GeoPoint) -> f64 {
    match path {
        [] => f64::INFINITY,
        [only] => only.distance_to(point),
        _ => path
            .windows(2)
            .map(|w| point.distance_to_segment(&w[0], &w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn points(value: &Bson) -> Option<Vec<GeoPoint>> {
    value.as_array()?.iter().map(GeoPoint::from_bson).collect()
}

fn rings(value: &Bson) -> Option<Vec<Vec<GeoPoint>>> {
    value.as_array()?.iter().map(points).collect()
}

fn polygon_contains(rings: &[Vec<GeoPoint>], point: &GeoPoint) -> bool {
    let Some((outer, holes)) = rings.split_first() else {
        return false;
    };
    ring_contains(outer, point) && !holes.iter().any(|h| ring_contains(h, point))
}

// Even-odd ray casting in lon/lat space.
fn ring_contains(ring: &[GeoPoint], point: &GeoPoint) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].longitude, ring[i].latitude);
        let (xj, yj) = (ring[j].longitude, ring[j].latitude);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lon: f64, lat: f64, half: f64) -> Vec<GeoPoint> {
        vec![
            GeoPoint { longitude: lon - half, latitude: lat - half },
            GeoPoint { longitude: lon + half, latitude: lat - half },
            GeoPoint { longitude: lon + half, latitude: lat + half },
            GeoPoint { longitude: lon - half, latitude: lat + half },
            GeoPoint { longitude: lon - half, latitude: lat - half },
        ]
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(-122.5, 45.5).is_ok());
        assert!(GeoPoint::new(180.0, -90.0).is_ok());
        assert!(matches!(GeoPoint::new(-181.0, 0.0), Err(QueryError::InvalidArgument(_))));
        assert!(matches!(GeoPoint::new(0.0, 90.5), Err(QueryError::InvalidArgument(_))));
        assert!(matches!(GeoPoint::new(f64::NAN, 0.0), Err(QueryError::InvalidArgument(_))));
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(0.0, 1.0).unwrap();
        let expected = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;
        assert!((a.distance_to(&b) - expected).abs() < 1e-6);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn parses_point_with_integer_coordinates() {
        let geometry = doc! { "type": "Point", "coordinates": [-122, 45.5] };
        assert_eq!(
            Geometry::from_document(&geometry),
            Some(Geometry::Point(GeoPoint { longitude: -122.0, latitude: 45.5 }))
        );
        assert_eq!(Geometry::from_document(&doc! { "type": "Circle" }), None);
    }

    #[test]
    fn polygon_containment_respects_holes() {
        let polygon = Geometry::Polygon(vec![square(-122.6, 45.5, 0.5), square(-122.6, 45.5, 0.1)]);
        let portland = GeoPoint::new(-122.675983, 45.524764).unwrap();
        let suburb = GeoPoint::new(-122.9, 45.7).unwrap();
        let seattle = GeoPoint::new(-122.33, 47.61).unwrap();

        assert!(!polygon.contains(&portland));
        assert!(polygon.contains(&suburb));
        assert!(!polygon.contains(&seattle));
        assert_eq!(polygon.distance_to(&suburb), 0.0);
        assert!(polygon.distance_to(&seattle) > 100_000.0);
    }

    #[test]
    fn polygon_distance_uses_nearest_edge() {
        // Band whose southern edge runs about 11 km north of the center,
        // with every corner more than 100 km away.
        let band = Geometry::Polygon(vec![vec![
            GeoPoint { longitude: -124.0, latitude: 45.6 },
            GeoPoint { longitude: -121.0, latitude: 45.6 },
            GeoPoint { longitude: -121.0, latitude: 46.0 },
            GeoPoint { longitude: -124.0, latitude: 46.0 },
            GeoPoint { longitude: -124.0, latitude: 45.6 },
        ]]);
        let center = GeoPoint::new(-122.5, 45.5).unwrap();

        assert!(!band.contains(&center));
        let distance = band.distance_to(&center);
        assert!(distance > 10_000.0 && distance < 15_000.0, "{distance}");
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(1.0, 0.0).unwrap();
        let one_degree = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

        let above_middle = GeoPoint::new(0.5, 1.0).unwrap();
        assert!((above_middle.distance_to_segment(&a, &b) - one_degree).abs() < 1.0);

        let behind_a = GeoPoint::new(-1.0, 0.0).unwrap();
        assert!((behind_a.distance_to_segment(&a, &b) - one_degree).abs() < 1e-6);

        let past_b = GeoPoint::new(2.0, 0.0).unwrap();
        assert!((past_b.distance_to_segment(&a, &b) - one_degree).abs() < 1e-6);

        assert_eq!(a.distance_to_segment(&a, &a), 0.0);
    }

    #[test]
    fn parses_multipolygon() {
        let geometry = doc! {
            "type": "MultiPolygon",
            "coordinates": [[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]],
        };
        let parsed = Geometry::from_document(&geometry).unwrap();
        assert!(parsed.contains(&GeoPoint::new(0.5, 0.5).unwrap()));
        assert!(!parsed.contains(&GeoPoint::new(1.5, 0.5).unwrap()));
    }
}
