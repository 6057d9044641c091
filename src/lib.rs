//! Library entrypoint: re‑export modules

pub mod config;
pub mod errors;
pub mod geo;
pub mod library;
pub mod metrics;
pub mod query;
pub mod record;
pub mod source;

pub use errors::QueryError;
pub use library::QueryLibrary;
pub use record::Record;
