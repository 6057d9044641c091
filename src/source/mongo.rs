//! MongoDB-backed [`DocumentSource`].

use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::info;

use super::DocumentSource;
use crate::config::Settings;
use crate::errors::QueryError;
use crate::query::{FindQuery, IntersectsQuery, NearPlan, NearQuery, SortedScan};

/// Executes queries against a live MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoSource {
    db: Database,
    /// Passed through as the per-operation `maxTimeMS`.
    max_time: Option<Duration>,
}

impl MongoSource {
    /// Wrap a database handle the caller already owns.
    pub fn new(db: Database, max_time: Option<Duration>) -> Self {
        MongoSource { db, max_time }
    }

    /// Build a client from `Settings`, using the configured timeout for
    /// connecting, server selection and each operation.
    pub async fn connect(settings: &Settings) -> Result<Self, QueryError> {
        let mut options = ClientOptions::parse(&settings.mongodb_uri).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.connect_timeout = Some(settings.timeout);
        options.server_selection_timeout = Some(settings.timeout);

        let client = Client::with_options(options)?;
        info!(database = %settings.database, "Created MongoDB client");

        Ok(MongoSource::new(
            client.database(&settings.database),
            Some(settings.timeout),
        ))
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

impl DocumentSource for MongoSource {
    async fn collection_exists(&self, collection: &str) -> Result<bool, QueryError> {
        let names = self
            .db
            .list_collection_names()
            .filter(doc! { "name": collection })
            .await?;
        Ok(names.iter().any(|n| n == collection))
    }

    async fn distinct(&self, collection: &str, field: &str) -> Result<Vec<Bson>, QueryError> {
        let coll = self.collection(collection);
        let mut action = coll.distinct(field, Document::new());
        if let Some(d) = self.max_time {
            action = action.max_time(d);
        }
        Ok(action.await?)
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, QueryError> {
        let coll = self.collection(collection);
        let mut action = coll.find(query.filter.to_document());
        if let Some(sort) = &query.sort {
            action = action.sort(sort.to_document());
        }
        if let Some(limit) = query.driver_limit() {
            action = action.limit(limit);
        }
        if let Some(d) = self.max_time {
            action = action.max_time(d);
        }
        let docs: Vec<Document> = action.await?.try_collect().await?;
        Ok(docs)
    }

    async fn aggregate_sorted(
        &self,
        collection: &str,
        scan: &SortedScan,
    ) -> Result<Vec<Document>, QueryError> {
        self.run_pipeline(collection, scan.pipeline()).await
    }

    async fn near(&self, collection: &str, query: &NearQuery) -> Result<Vec<Document>, QueryError> {
        match query.plan() {
            NearPlan::Find(filter) => self.run_find(collection, filter).await,
            NearPlan::Aggregate(pipeline) => self.run_pipeline(collection, pipeline).await,
        }
    }

    async fn intersects(
        &self,
        collection: &str,
        query: &IntersectsQuery,
    ) -> Result<Vec<Document>, QueryError> {
        self.run_find(collection, query.filter_document()).await
    }
}

impl MongoSource {
    async fn run_find(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Vec<Document>, QueryError> {
        let coll = self.collection(collection);
        let mut action = coll.find(filter);
        if let Some(d) = self.max_time {
            action = action.max_time(d);
        }
        let docs: Vec<Document> = action.await?.try_collect().await?;
        Ok(docs)
    }

    async fn run_pipeline(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, QueryError> {
        let coll = self.collection(collection);
        let mut action = coll.aggregate(pipeline);
        if let Some(d) = self.max_time {
            action = action.max_time(d);
        }
        let docs: Vec<Document> = action.await?.try_collect().await?;
        Ok(docs)
    }
}
