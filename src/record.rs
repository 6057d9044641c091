//! Result rows returned by every query.

use mongodb::bson::{Bson, Document};
use serde::Serialize;

use crate::geo::Geometry;
use crate::query::{COUNT, DISTANCE, GEOMETRY, METRO_AREA};

/// One document returned by a query, with typed accessors for the fields
/// the metro collections share.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Document);

impl Record {
    pub fn metro_area(&self) -> Option<&str> {
        self.0.get_str(METRO_AREA).ok()
    }

    /// Frequency count, whichever numeric BSON type it was stored as.
    pub fn count(&self) -> Option<i64> {
        match self.0.get(COUNT)? {
            Bson::Int32(v) => Some(i64::from(*v)),
            Bson::Int64(v) => Some(*v),
            Bson::Double(v) if v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Distance in meters from the query point, when the source reported one.
    pub fn distance_meters(&self) -> Option<f64> {
        match self.0.get(DISTANCE)? {
            Bson::Double(v) => Some(*v),
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn geometry(&self) -> Option<Geometry> {
        Geometry::from_document(self.0.get_document(GEOMETRY).ok()?)
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.0.get(key)
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<Document> for Record {
    fn from(doc: Document) -> Self {
        Record(doc)
    }
}
