pub mod aggregate;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod fetch;
pub mod period;
pub mod sqlite_persistence;
pub mod store;
