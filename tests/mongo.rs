//! Runs against a live server: `cargo test -- --ignored` with MongoDB on
//! `APP__MONGODB_URI` (default `mongodb://127.0.0.1:27017`).

use metro_query::config::Settings;
use metro_query::source::{DocumentSource, MongoSource};
use metro_query::{QueryError, QueryLibrary};

async fn library() -> QueryLibrary<MongoSource> {
    let settings = Settings::new().unwrap();
    QueryLibrary::new(MongoSource::connect(&settings).await.unwrap())
}

#[tokio::test]
#[ignore = "needs a running MongoDB"]
async fn missing_collection_is_not_found_on_server() {
    let library = library().await;
    let name = "metro_query_absent_collection";

    assert!(!library.source().collection_exists(name).await.unwrap());

    let err = library.list_distinct_metro_areas(name).await.unwrap_err();
    assert!(matches!(err, QueryError::NotFound(ref c) if c == name));

    let err = library
        .find_near_with_limit(name, -122.5, 45.5, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound(_)));
}

#[tokio::test]
#[ignore = "needs a running MongoDB"]
async fn configured_collections_answer_every_listing() {
    let settings = Settings::new().unwrap();
    let library = library().await;

    for collection in &settings.report.collections {
        match library.top_records_overall(collection).await {
            Ok(records) => {
                let counts: Vec<i64> = records.iter().filter_map(|r| r.count()).collect();
                assert!(counts.windows(2).all(|w| w[0] >= w[1]));
            }
            Err(QueryError::NotFound(_)) => {}
            Err(e) => panic!("{collection}: {e}"),
        }
    }
}
