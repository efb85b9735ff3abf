//! Genre and record-label enrichment with durable caching.
//!
//! Artist tags come from Last.fm, record labels from Discogs. Both are
//! cached in SQLite keyed by casefolded names, so repeat runs over the
//! same library stay cheap.

mod cache;
mod label_client;
mod models;
mod schema;
mod store;
mod tag_client;
mod trait_def;

pub use cache::{EnrichmentCache, LookupFailures};
pub use label_client::{DiscogsLabelClient, LabelSource};
pub use models::{AlbumLabel, ArtistTags, EnrichmentStats};
pub use store::SqliteEnrichmentStore;
pub use tag_client::{LastFmTagClient, TagSource};
pub use trait_def::EnrichmentStore;
