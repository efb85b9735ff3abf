//! EnrichmentStore trait definition.

use super::models::{AlbumLabel, ArtistTags, EnrichmentStats};
use anyhow::Result;

/// Trait for enrichment storage backends.
pub trait EnrichmentStore: Send + Sync {
    // =========================================================================
    // Artist genre tags
    // =========================================================================

    /// Get cached genre tags for an artist by casefolded key.
    fn get_artist_tags(&self, artist: &str) -> Result<Option<ArtistTags>>;

    /// Insert or update genre tags for an artist.
    fn upsert_artist_tags(&self, tags: &ArtistTags) -> Result<()>;

    // =========================================================================
    // Album record labels
    // =========================================================================

    /// Get the cached record label for an (artist, album) pair by casefolded
    /// keys. A hit with `label: None` means the lookup already happened and
    /// found nothing.
    fn get_album_label(&self, artist: &str, album: &str) -> Result<Option<AlbumLabel>>;

    /// Insert or update the record label for an (artist, album) pair.
    fn upsert_album_label(&self, label: &AlbumLabel) -> Result<()>;

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get summary statistics for the enrichment database.
    fn get_stats(&self) -> Result<EnrichmentStats>;
}
