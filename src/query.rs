//! query.rs
//!
//! Pure query builders. Each query is a plain value that knows how to render itself as the
//! BSON filter, sort or pipeline a MongoDB shell user would type by hand; executing it is
//! the job of a [`DocumentSource`](crate::source::DocumentSource).

use std::fmt;
use std::str::FromStr;

use mongodb::bson::{doc, Document};

use crate::errors::QueryError;
use crate::geo::GeoPoint;

/// Field holding the metro-area label.
pub const METRO_AREA: &str = "metro_area";
/// Field holding the frequency count.
pub const COUNT: &str = "count";
/// Field holding the GeoJSON geometry.
pub const GEOMETRY: &str = "geometry";
/// Field `$geoNear` writes the computed distance (meters) into.
pub const DISTANCE: &str = "distance";

/// The collections produced by the geotweet jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetroCollection {
    /// Word counts per metro area.
    MetroWord,
    /// OSM point-of-interest tag counts per metro area.
    MetroOsm,
    /// Same shape as `metro_osm`, produced by the EMR batch run.
    MetroOsmEmr,
    /// Metro boundaries.
    Metro,
    /// Geotagged tweet counts per metro area.
    Geotweet,
}

impl MetroCollection {
    pub const ALL: [MetroCollection; 5] = [
        MetroCollection::MetroWord,
        MetroCollection::MetroOsm,
        MetroCollection::MetroOsmEmr,
        MetroCollection::Metro,
        MetroCollection::Geotweet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetroCollection::MetroWord => "metro_word",
            MetroCollection::MetroOsm => "metro_osm",
            MetroCollection::MetroOsmEmr => "metro_osm_emr",
            MetroCollection::Metro => "metro",
            MetroCollection::Geotweet => "geotweet",
        }
    }
}

impl fmt::Display for MetroCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetroCollection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetroCollection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| QueryError::invalid(format!("unknown collection {s:?}")))
    }
}

impl AsRef<str> for MetroCollection {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

/// Single-field sort order.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    /// `{count: -1}`
    pub fn count_desc() -> Self {
        SortSpec {
            field: COUNT.to_string(),
            descending: true,
        }
    }

    pub fn to_document(&self) -> Document {
        let direction = if self.descending { -1 } else { 1 };
        doc! { self.field.as_str(): direction }
    }
}

/// Record filter for find queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Exact, case-sensitive match on `metro_area`.
    MetroArea(String),
}

impl Filter {
    pub fn to_document(&self) -> Document {
        match self {
            Filter::All => Document::new(),
            Filter::MetroArea(area) => doc! { METRO_AREA: area.as_str() },
        }
    }

    pub fn matches(&self, record: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::MetroArea(area) => record.get_str(METRO_AREA).ok() == Some(area.as_str()),
        }
    }
}

/// `db.<coll>.find(filter).sort(sort).limit(n)`
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<SortSpec>,
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Records for one metro area, highest count first.
    pub fn top_for_metro(metro_area: &str, limit: Option<u64>) -> Result<Self, QueryError> {
        if let Some(limit) = limit {
            checked_limit(limit)?;
        }
        Ok(FindQuery {
            filter: Filter::MetroArea(metro_area.to_string()),
            sort: Some(SortSpec::count_desc()),
            limit,
        })
    }

    /// Limit as the driver's signed integer.
    pub fn driver_limit(&self) -> Option<i64> {
        self.limit.map(saturating_i64)
    }
}

/// Limits must be positive and representable as a BSON Int64; MongoDB
/// reads negative limits as single-batch requests.
pub fn checked_limit(limit: u64) -> Result<i64, QueryError> {
    if limit == 0 {
        return Err(QueryError::invalid("limit must be a positive integer"));
    }
    i64::try_from(limit)
        .map_err(|_| QueryError::invalid(format!("limit {limit} exceeds {}", i64::MAX)))
}

// Only reached with limits already passed through `checked_limit`.
fn saturating_i64(limit: u64) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// `db.<coll>.aggregate({$sort: ...})`
#[derive(Debug, Clone, PartialEq)]
pub struct SortedScan {
    pub sort: SortSpec,
}

impl SortedScan {
    pub fn count_desc() -> Self {
        SortedScan {
            sort: SortSpec::count_desc(),
        }
    }

    pub fn pipeline(&self) -> Vec<Document> {
        vec![doc! { "$sort": self.sort.to_document() }]
    }
}

/// Proximity query around a point, nearest first. Bounded either by
/// distance, by result count, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct NearQuery {
    pub center: GeoPoint,
    pub max_distance_meters: Option<f64>,
    pub limit: Option<u64>,
}

impl NearQuery {
    pub fn within(center: GeoPoint, max_distance_meters: f64) -> Result<Self, QueryError> {
        if !max_distance_meters.is_finite() || max_distance_meters <= 0.0 {
            return Err(QueryError::invalid(format!(
                "max distance must be a positive number of meters, got {max_distance_meters}"
            )));
        }
        Ok(NearQuery {
            center,
            max_distance_meters: Some(max_distance_meters),
            limit: None,
        })
    }

    pub fn nearest(center: GeoPoint, limit: u64) -> Result<Self, QueryError> {
        checked_limit(limit)?;
        Ok(NearQuery {
            center,
            max_distance_meters: None,
            limit: Some(limit),
        })
    }

    /// Document-level form: `{geometry: {$near: {$geometry: ..., $maxDistance: ...}}}`
    pub fn filter_document(&self) -> Document {
        let mut near = doc! { "$geometry": self.center.to_document() };
        if let Some(max) = self.max_distance_meters {
            near.insert("$maxDistance", max);
        }
        doc! { GEOMETRY: { "$near": near } }
    }

    /// Aggregation form: `$geoNear` stage (spherical, distance written to
    /// [`DISTANCE`]) followed by `$limit` when one is set.
    pub fn pipeline(&self) -> Vec<Document> {
        let mut geo_near = doc! {
            "near": self.center.to_document(),
            "distanceField": DISTANCE,
            "key": GEOMETRY,
            "spherical": true,
        };
        if let Some(max) = self.max_distance_meters {
            geo_near.insert("maxDistance", max);
        }

        let mut stages = vec![doc! { "$geoNear": geo_near }];
        if let Some(limit) = self.limit {
            stages.push(doc! { "$limit": saturating_i64(limit) });
        }
        stages
    }

    /// How the query goes to the server: distance-capped lookups as a
    /// `$near` find, count-bounded ones through the `$geoNear` stage.
    pub fn plan(&self) -> NearPlan {
        if self.limit.is_some() {
            NearPlan::Aggregate(self.pipeline())
        } else {
            NearPlan::Find(self.filter_document())
        }
    }
}

/// Server-side form of a [`NearQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum NearPlan {
    Find(Document),
    Aggregate(Vec<Document>),
}

/// `{geometry: {$geoIntersects: {$geometry: <point>}}}`
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectsQuery {
    pub point: GeoPoint,
}

impl IntersectsQuery {
    pub fn filter_document(&self) -> Document {
        doc! {
            GEOMETRY: { "$geoIntersects": { "$geometry": self.point.to_document() } }
        }
    }
}
