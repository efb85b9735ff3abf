//! Data models for enrichment lookups.

/// Genre tags for one artist. An empty tag list is a valid, cached result:
/// it records that the lookup happened and found nothing, so it is never
/// repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistTags {
    /// Casefolded artist key.
    pub artist: String,
    pub tags: Vec<String>,
    /// Unix seconds at lookup time.
    pub fetched_at: i64,
}

/// Record label for one (artist, album) release. `label: None` is an
/// explicit not-found marker, cached to avoid repeat negative lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumLabel {
    /// Casefolded artist key.
    pub artist: String,
    /// Casefolded album key.
    pub album: String,
    pub label: Option<String>,
    /// Unix seconds at lookup time.
    pub fetched_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentStats {
    pub artists_tagged: usize,
    pub albums_labelled: usize,
}
