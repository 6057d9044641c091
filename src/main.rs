//! Entrypoint: set up tracing, connect to MongoDB, and run the metro report once.
//!
//! The report mirrors the hand-run shell queries over the geotweet collections, driven by
//! `Settings` from `config.rs`:
//!  - `mongodb_uri` / `database` – where the collections live
//!  - `timeout`                  – connect, server-selection and per-query timeout
//!  - `report.*`                 – metro area, collections, and proximity parameters

use anyhow::{bail, Context};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use metro_query::config::{ReportSettings, Settings};
use metro_query::metrics;
use metro_query::source::{DocumentSource, MongoSource};
use metro_query::{QueryError, QueryLibrary, Record};

/// Application entrypoint for the metro report.
///
/// **Workflow**:
/// 1. Initialise tracing/logging from `RUST_LOG`.
/// 2. Load `Config.toml` (and apply any `APP__…` env-var overrides).
/// 3. Build the MongoDB client.
/// 4. Run the count listings for every configured collection concurrently.
/// 5. Run the proximity and containment lookups on the geo collection.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ───────────────────────────────────────────────────────────────
    // 1. Initialise tracing / logging
    // ───────────────────────────────────────────────────────────────
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    info!("Starting metro report…");

    // ───────────────────────────────────────────────────────────────
    // 2. Load configuration
    // ───────────────────────────────────────────────────────────────
    let settings = Settings::new().context("loading configuration")?;
    info!(?settings, "Loaded configuration");

    // ───────────────────────────────────────────────────────────────
    // 3. MongoDB client
    // ───────────────────────────────────────────────────────────────
    let source = MongoSource::connect(&settings)
        .await
        .with_context(|| format!("connecting to {}", settings.mongodb_uri))?;
    let library = QueryLibrary::new(source);
    let report = &settings.report;
    let run_start = Instant::now();

    // ───────────────────────────────────────────────────────────────
    // 4. Count listings, one task per collection
    // ───────────────────────────────────────────────────────────────
    let mut tasks = FuturesUnordered::new();
    for collection in &report.collections {
        let library = &library;
        tasks.push(async move {
            let errors = count_listings(library, collection, report).await;
            (collection, errors)
        });
    }

    let mut total_errors = 0;
    while let Some((collection, errors)) = tasks.next().await {
        info!(%collection, errors, "Collection listings complete");
        total_errors += errors;
    }

    // ───────────────────────────────────────────────────────────────
    // 5. Geo lookups
    // ───────────────────────────────────────────────────────────────
    total_errors += geo_lookups(&library, report).await;

    info!(
        total_collections = report.collections.len(),
        total_errors,
        run_s = run_start.elapsed().as_secs_f64(),
        "Metro report complete"
    );
    debug!(metrics = %metrics::gather_metrics(), "Query metrics");

    if total_errors > 0 {
        bail!("{total_errors} report queries failed");
    }
    Ok(())
}

/// Distinct areas, per-metro top records and overall top records for one
/// collection. Returns the number of failed queries.
async fn count_listings<S: DocumentSource>(
    library: &QueryLibrary<S>,
    collection: &str,
    report: &ReportSettings,
) -> usize {
    let mut errors = 0;

    match library.list_distinct_metro_areas(collection).await {
        Ok(areas) => info!(%collection, count = areas.len(), ?areas, "Distinct metro areas"),
        Err(e) => errors += log_failure("distinct", collection, &e),
    }

    match library
        .top_records_for_metro(collection, &report.metro_area, Some(report.top_n))
        .await
    {
        Ok(records) => log_records(collection, &report.metro_area, &records),
        Err(e) => errors += log_failure("top_for_metro", collection, &e),
    }

    match library.top_records_overall(collection).await {
        Ok(records) => {
            let shown = records.len().min(report.top_n as usize);
            info!(%collection, total = records.len(), shown, "Overall top records");
            log_records(collection, "all", &records[..shown]);
        }
        Err(e) => errors += log_failure("top_overall", collection, &e),
    }

    errors
}

/// Capped and count-limited proximity queries plus the containing
/// boundary for the report center. Returns the number of failed queries.
async fn geo_lookups<S: DocumentSource>(library: &QueryLibrary<S>, report: &ReportSettings) -> usize {
    let collection = report.geo_collection.as_str();
    let [longitude, latitude] = report.center;
    let mut errors = 0;

    match library
        .find_near(collection, longitude, latitude, report.max_distance_meters)
        .await
    {
        Ok(records) => {
            info!(
                %collection,
                longitude,
                latitude,
                max_distance_m = report.max_distance_meters,
                count = records.len(),
                "Records within distance"
            );
            log_records(collection, "near", &records);
        }
        Err(e) => errors += log_failure("near", collection, &e),
    }

    match library
        .find_near_with_limit(collection, longitude, latitude, report.near_limit)
        .await
    {
        Ok(records) => log_records(collection, "nearest", &records),
        Err(e) => errors += log_failure("near_limit", collection, &e),
    }

    match library.find_intersecting(collection, longitude, latitude).await {
        Ok(records) => log_records(collection, "containing", &records),
        Err(e) => errors += log_failure("intersects", collection, &e),
    }

    errors
}

fn log_records(collection: &str, label: &str, records: &[Record]) {
    for (rank, record) in records.iter().enumerate() {
        let json = serde_json::to_string(record).unwrap_or_else(|e| format!("<{e}>"));
        info!(%collection, label, rank = rank + 1, record = %json, "Record");
    }
}

fn log_failure(operation: &str, collection: &str, e: &QueryError) -> usize {
    error!(operation, %collection, error = %e, "Query failed");
    1
}
