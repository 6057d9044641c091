//! In-process [`DocumentSource`] over fixed collections of BSON documents.
//!
//! Evaluates the same queries the MongoDB backend sends to the server. Proximity is the
//! spherical distance to the nearest edge of a line or polygon, zero inside a polygon.

use std::cmp::Ordering;
use std::collections::HashMap;

use mongodb::bson::{Bson, Document};

use super::DocumentSource;
use crate::errors::QueryError;
use crate::geo::Geometry;
use crate::query::{FindQuery, IntersectsQuery, NearQuery, SortSpec, SortedScan, DISTANCE, GEOMETRY};

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    collections: HashMap<String, Vec<Document>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a collection. Insertion order is the natural order
    /// used to break sort ties.
    pub fn with_collection(
        mut self,
        name: impl Into<String>,
        docs: impl IntoIterator<Item = Document>,
    ) -> Self {
        self.collections.insert(name.into(), docs.into_iter().collect());
        self
    }

    fn docs(&self, collection: &str) -> Result<&[Document], QueryError> {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .ok_or_else(|| QueryError::NotFound(collection.to_string()))
    }

    fn sorted(docs: impl IntoIterator<Item = Document>, sort: &SortSpec) -> Vec<Document> {
        let mut docs: Vec<Document> = docs.into_iter().collect();
        // Vec::sort_by is stable, so ties keep insertion order.
        docs.sort_by(|a, b| {
            let ordering = compare_values(a.get(&sort.field), b.get(&sort.field));
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        docs
    }
}

impl DocumentSource for MemorySource {
    async fn collection_exists(&self, collection: &str) -> Result<bool, QueryError> {
        Ok(self.collections.contains_key(collection))
    }

    async fn distinct(&self, collection: &str, field: &str) -> Result<Vec<Bson>, QueryError> {
        let mut values: Vec<Bson> = Vec::new();
        for value in self.docs(collection)?.iter().filter_map(|d| d.get(field)) {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        Ok(values)
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, QueryError> {
        let matched = self
            .docs(collection)?
            .iter()
            .filter(|d| query.filter.matches(d))
            .cloned();

        let results = match &query.sort {
            Some(sort) => Self::sorted(matched, sort),
            None => matched.collect(),
        };

        Ok(match query.limit {
            Some(n) => results.into_iter().take(as_len(n)).collect(),
            None => results,
        })
    }

    async fn aggregate_sorted(
        &self,
        collection: &str,
        scan: &SortedScan,
    ) -> Result<Vec<Document>, QueryError> {
        Ok(Self::sorted(self.docs(collection)?.iter().cloned(), &scan.sort))
    }

    async fn near(&self, collection: &str, query: &NearQuery) -> Result<Vec<Document>, QueryError> {
        let mut hits: Vec<(f64, &Document)> = self
            .docs(collection)?
            .iter()
            .filter_map(|doc| {
                let geometry = Geometry::from_document(doc.get_document(GEOMETRY).ok()?)?;
                Some((geometry.distance_to(&query.center), doc))
            })
            .filter(|(distance, _)| {
                query
                    .max_distance_meters
                    .map_or(true, |max| *distance <= max)
            })
            .collect();

        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        if let Some(limit) = query.limit {
            hits.truncate(as_len(limit));
        }

        Ok(hits
            .into_iter()
            .map(|(distance, doc)| {
                let mut doc = doc.clone();
                doc.insert(DISTANCE, distance);
                doc
            })
            .collect())
    }

    async fn intersects(
        &self,
        collection: &str,
        query: &IntersectsQuery,
    ) -> Result<Vec<Document>, QueryError> {
        Ok(self
            .docs(collection)?
            .iter()
            .filter(|doc| {
                doc.get_document(GEOMETRY)
                    .ok()
                    .and_then(Geometry::from_document)
                    .is_some_and(|g| g.contains(&query.point))
            })
            .cloned()
            .collect())
    }
}

/// Numbers compare numerically across BSON numeric types; anything else
/// (missing, null, strings) sorts below every number.
fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a.and_then(numeric), b.and_then(numeric)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn as_len(limit: u64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use tokio_test::block_on;

    fn words() -> MemorySource {
        MemorySource::new().with_collection(
            "metro_word",
            vec![
                doc! { "metro_area": "Portland, OR--WA", "word": "rain", "count": 300 },
                doc! { "metro_area": "Seattle, WA", "word": "rain", "count": 800_i64 },
                doc! { "metro_area": "Portland, OR--WA", "word": "coffee", "count": 500.0 },
                doc! { "metro_area": "Portland, OR--WA", "word": "bikes" },
            ],
        )
    }

    #[test]
    fn missing_collection_is_not_found() {
        let err = block_on(words().distinct("metro_osm", "metro_area")).unwrap_err();
        assert!(matches!(err, QueryError::NotFound(name) if name == "metro_osm"));
        assert!(!block_on(words().collection_exists("metro_osm")).unwrap());
    }

    #[test]
    fn distinct_drops_duplicates() {
        let values = block_on(words().distinct("metro_word", "metro_area")).unwrap();
        assert_eq!(
            values,
            vec![Bson::from("Portland, OR--WA"), Bson::from("Seattle, WA")]
        );
    }

    #[test]
    fn sort_mixes_numeric_types_and_puts_missing_last() {
        let docs = block_on(words().aggregate_sorted("metro_word", &SortedScan::count_desc())).unwrap();
        let order: Vec<&str> = docs
            .iter()
            .map(|d| d.get_str("word").unwrap())
            .collect();
        assert_eq!(order, vec!["rain", "coffee", "rain", "bikes"]);
        assert_eq!(docs[0].get_str("metro_area").unwrap(), "Seattle, WA");
    }

    #[test]
    fn find_applies_limit_after_sort() {
        let query = FindQuery::top_for_metro("Portland, OR--WA", Some(1)).unwrap();
        let docs = block_on(words().find("metro_word", &query)).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("word").unwrap(), "coffee");
    }
}
