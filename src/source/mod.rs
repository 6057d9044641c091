//! The data-source boundary: anything that can answer the queries built in
//! [`crate::query`] against named collections.

use std::future::Future;

use mongodb::bson::{Bson, Document};

use crate::errors::QueryError;
use crate::query::{FindQuery, IntersectsQuery, NearQuery, SortedScan};

pub mod memory;
pub mod mongo;

pub use memory::MemorySource;
pub use mongo::MongoSource;

/// Read-only access to a document store.
///
/// Implementations must not assume the collection exists; callers check
/// with [`DocumentSource::collection_exists`] first.
pub trait DocumentSource: Send + Sync {
    fn collection_exists(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<bool, QueryError>> + Send;

    fn distinct(
        &self,
        collection: &str,
        field: &str,
    ) -> impl Future<Output = Result<Vec<Bson>, QueryError>> + Send;

    fn find(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send;

    fn aggregate_sorted(
        &self,
        collection: &str,
        scan: &SortedScan,
    ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send;

    /// Nearest first.
    fn near(
        &self,
        collection: &str,
        query: &NearQuery,
    ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send;

    fn intersects(
        &self,
        collection: &str,
        query: &IntersectsQuery,
    ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send;
}
