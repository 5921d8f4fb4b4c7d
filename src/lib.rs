pub mod aggregate;
pub mod backfill;
pub mod blob_store;
pub mod config;
pub mod error;
pub mod gold_export;
pub mod history;
pub mod http_client;
pub mod parquet_codec;
pub mod report;
pub mod season;
pub mod snapshot_store;
pub mod stages;
pub mod stats_api;
pub mod table;
