//! library.rs
//!
//! The query library: validate parameters, confirm the collection exists, run the query
//! against the configured source, and hand back ordered records. Every call is
//! independent and read-only, so a single `QueryLibrary` can serve concurrent callers.

use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;

use mongodb::bson::Bson;
use tracing::{debug, warn};

use crate::errors::QueryError;
use crate::geo::GeoPoint;
use crate::metrics::{QUERY_COUNTER, QUERY_ERRORS, QUERY_HISTOGRAM};
use crate::query::{FindQuery, IntersectsQuery, NearQuery, SortedScan, METRO_AREA};
use crate::record::Record;
use crate::source::DocumentSource;

/// Parameterized read queries over the metro collections.
#[derive(Debug, Clone)]
pub struct QueryLibrary<S> {
    source: S,
}

impl<S: DocumentSource> QueryLibrary<S> {
    pub fn new(source: S) -> Self {
        QueryLibrary { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Distinct `metro_area` values in `collection`, in no particular order.
    ///
    /// # Errors
    ///
    /// * `QueryError::NotFound` if the collection does not exist.
    pub async fn list_distinct_metro_areas(
        &self,
        collection: &str,
    ) -> Result<Vec<String>, QueryError> {
        self.instrument("distinct", collection, async {
            self.ensure_collection(collection).await?;
            let mut seen = HashSet::new();
            let mut areas = Vec::new();
            for value in self.source.distinct(collection, METRO_AREA).await? {
                match value {
                    Bson::String(area) => {
                        if seen.insert(area.clone()) {
                            areas.push(area);
                        }
                    }
                    other => warn!(%collection, value = %other, "Skipping non-string metro_area"),
                }
            }
            Ok(areas)
        })
        .await
    }

    /// Records whose `metro_area` equals `metro_area` exactly, highest
    /// `count` first. `limit` caps the result; `None` returns every match.
    ///
    /// An unknown metro area is not an error: it yields an empty vector.
    ///
    /// # Errors
    ///
    /// * `QueryError::InvalidArgument` if `limit` is zero or above `i64::MAX`.
    /// * `QueryError::NotFound` if the collection does not exist.
    pub async fn top_records_for_metro(
        &self,
        collection: &str,
        metro_area: &str,
        limit: Option<u64>,
    ) -> Result<Vec<Record>, QueryError> {
        self.instrument("top_for_metro", collection, async {
            let query = FindQuery::top_for_metro(metro_area, limit)?;
            self.ensure_collection(collection).await?;
            let docs = self.source.find(collection, &query).await?;
            Ok(docs.into_iter().map(Record::from).collect())
        })
        .await
    }

    /// Every record in `collection`, highest `count` first.
    pub async fn top_records_overall(&self, collection: &str) -> Result<Vec<Record>, QueryError> {
        self.instrument("top_overall", collection, async {
            self.ensure_collection(collection).await?;
            let docs = self
                .source
                .aggregate_sorted(collection, &SortedScan::count_desc())
                .await?;
            Ok(docs.into_iter().map(Record::from).collect())
        })
        .await
    }

    /// Records whose geometry lies within `max_distance_meters` of the point,
    /// nearest first.
    ///
    /// # Errors
    ///
    /// * `QueryError::InvalidArgument` for out-of-range coordinates or a
    ///   distance that is not a positive number.
    /// * `QueryError::NotFound` if the collection does not exist.
    pub async fn find_near(
        &self,
        collection: &str,
        longitude: f64,
        latitude: f64,
        max_distance_meters: f64,
    ) -> Result<Vec<Record>, QueryError> {
        let query = GeoPoint::new(longitude, latitude)
            .and_then(|center| NearQuery::within(center, max_distance_meters));
        self.run_near("near", collection, query).await
    }

    /// The `limit` records nearest to the point, nearest first.
    ///
    /// # Errors
    ///
    /// * `QueryError::InvalidArgument` for out-of-range coordinates, or a
    ///   limit that is zero or above `i64::MAX`.
    /// * `QueryError::NotFound` if the collection does not exist.
    pub async fn find_near_with_limit(
        &self,
        collection: &str,
        longitude: f64,
        latitude: f64,
        limit: u64,
    ) -> Result<Vec<Record>, QueryError> {
        let query = GeoPoint::new(longitude, latitude)
            .and_then(|center| NearQuery::nearest(center, limit));
        self.run_near("near_limit", collection, query).await
    }

    /// Records whose geometry intersects the point, e.g. the metro boundary
    /// that contains it.
    pub async fn find_intersecting(
        &self,
        collection: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<Vec<Record>, QueryError> {
        self.instrument("intersects", collection, async {
            let query = IntersectsQuery {
                point: GeoPoint::new(longitude, latitude)?,
            };
            self.ensure_collection(collection).await?;
            let docs = self.source.intersects(collection, &query).await?;
            Ok(docs.into_iter().map(Record::from).collect())
        })
        .await
    }

    async fn run_near(
        &self,
        operation: &'static str,
        collection: &str,
        query: Result<NearQuery, QueryError>,
    ) -> Result<Vec<Record>, QueryError> {
        self.instrument(operation, collection, async {
            let query = query?;
            self.ensure_collection(collection).await?;
            let docs = self.source.near(collection, &query).await?;
            Ok(docs.into_iter().map(Record::from).collect())
        })
        .await
    }

    async fn ensure_collection(&self, collection: &str) -> Result<(), QueryError> {
        if self.source.collection_exists(collection).await? {
            Ok(())
        } else {
            Err(QueryError::NotFound(collection.to_string()))
        }
    }

    /// Metrics and a debug line around one query, argument errors included.
    async fn instrument<T, F>(
        &self,
        operation: &'static str,
        collection: &str,
        query: F,
    ) -> Result<Vec<T>, QueryError>
    where
        F: Future<Output = Result<Vec<T>, QueryError>>,
    {
        QUERY_COUNTER.with_label_values(&[operation]).inc();
        let start = Instant::now();

        let result = query.await;

        let elapsed = start.elapsed().as_secs_f64();
        QUERY_HISTOGRAM
            .with_label_values(&[operation])
            .observe(elapsed);

        match &result {
            Ok(rows) => debug!(
                operation,
                collection,
                results = rows.len(),
                elapsed_s = elapsed,
                "Query complete"
            ),
            Err(e) => {
                QUERY_ERRORS.with_label_values(&[operation]).inc();
                debug!(operation, collection, error = %e, elapsed_s = elapsed, "Query failed");
            }
        }
        result
    }
}
