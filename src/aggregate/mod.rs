//! Pure cross-user match aggregation.
//!
//! Takes the combined scrobbles of all users for one period plus the
//! enrichment lookups already resolved, and produces per-dimension overlap
//! tables. No I/O happens here, so the whole pipeline stage is testable
//! with plain data.

use crate::fetch::Scrobble;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One axis of overlap comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Artist,
    Track,
    Album,
    Genre,
    Label,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Artist,
        Dimension::Track,
        Dimension::Album,
        Dimension::Genre,
        Dimension::Label,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Artist => "artist",
            Dimension::Track => "track",
            Dimension::Album => "album",
            Dimension::Genre => "genre",
            Dimension::Label => "label",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "artist" => Some(Dimension::Artist),
            "track" => Some(Dimension::Track),
            "album" => Some(Dimension::Album),
            "genre" => Some(Dimension::Genre),
            "label" => Some(Dimension::Label),
            _ => None,
        }
    }
}

/// One overlapping item within a dimension. Only materialized when at
/// least 2 distinct users played it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    /// Casefolded matching key, also the tie-break sort key.
    pub key: String,
    /// First-seen display form of the item.
    pub display: String,
    /// Play count per user. Every map here has at least 2 entries.
    pub plays: BTreeMap<String, u64>,
    pub total_plays: u64,
}

impl MatchEntry {
    pub fn user_count(&self) -> usize {
        self.plays.len()
    }
}

/// Enrichment lookups resolved ahead of aggregation, keyed by casefolded
/// names. Missing artists aggregate as tagless; missing or `None` labels
/// exclude the scrobble from the label dimension.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub artist_tags: HashMap<String, Vec<String>>,
    pub album_labels: HashMap<(String, String), Option<String>>,
}

/// Join the parts of a composite key with a separator that cannot occur
/// in artist or title text, so "A - B"/"C" never collides with "A"/"B - C".
fn tuple_key(left: &str, right: &str) -> String {
    format!("{}\u{1F}{}", left, right)
}

/// Aggregate one dimension. Output is sorted by total plays descending,
/// ties broken by key ascending.
pub fn aggregate_dimension(
    scrobbles: &[Scrobble],
    enrichment: &Enrichment,
    dimension: Dimension,
) -> Vec<MatchEntry> {
    // key -> (display, user -> count)
    let mut buckets: HashMap<String, (String, BTreeMap<String, u64>)> = HashMap::new();

    let mut bump = |key: String, display: &str, user: &str| {
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| (display.to_string(), BTreeMap::new()));
        *bucket.1.entry(user.to_string()).or_insert(0) += 1;
    };

    for scrobble in scrobbles {
        let artist_key = scrobble.artist.to_lowercase();
        match dimension {
            Dimension::Artist => {
                bump(artist_key, &scrobble.artist, &scrobble.user);
            }
            Dimension::Track => {
                let key = tuple_key(&artist_key, &scrobble.track.to_lowercase());
                let display = format!("{} - {}", scrobble.artist, scrobble.track);
                bump(key, &display, &scrobble.user);
            }
            Dimension::Album => {
                let Some(album) = scrobble.album.as_deref() else {
                    continue;
                };
                let key = tuple_key(&artist_key, &album.to_lowercase());
                let display = format!("{} - {}", scrobble.artist, album);
                bump(key, &display, &scrobble.user);
            }
            Dimension::Genre => {
                let Some(tags) = enrichment.artist_tags.get(&artist_key) else {
                    continue;
                };
                // One scrobble counts once per tag of its artist
                for tag in tags {
                    bump(tag.to_lowercase(), tag, &scrobble.user);
                }
            }
            Dimension::Label => {
                let Some(album) = scrobble.album.as_deref() else {
                    continue;
                };
                let lookup = (artist_key, album.to_lowercase());
                let Some(Some(label)) = enrichment.album_labels.get(&lookup) else {
                    continue;
                };
                bump(label.to_lowercase(), label, &scrobble.user);
            }
        }
    }

    let mut entries: Vec<MatchEntry> = buckets
        .into_iter()
        .filter(|(_, (_, plays))| plays.len() >= 2)
        .map(|(key, (display, plays))| MatchEntry {
            total_plays: plays.values().sum(),
            key,
            display,
            plays,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_plays
            .cmp(&a.total_plays)
            .then_with(|| a.key.cmp(&b.key))
    });
    entries
}

/// Aggregate every dimension for one period's combined scrobbles.
pub fn aggregate_all(
    scrobbles: &[Scrobble],
    enrichment: &Enrichment,
) -> BTreeMap<Dimension, Vec<MatchEntry>> {
    Dimension::ALL
        .iter()
        .map(|&dim| (dim, aggregate_dimension(scrobbles, enrichment, dim)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrobble(user: &str, artist: &str, track: &str, album: Option<&str>) -> Scrobble {
        Scrobble {
            user: user.to_string(),
            artist: artist.to_string(),
            track: track.to_string(),
            album: album.map(|a| a.to_string()),
            timestamp: 1700000000,
        }
    }

    fn repeat(scrobble: Scrobble, times: usize) -> Vec<Scrobble> {
        std::iter::repeat(scrobble).take(times).collect()
    }

    #[test]
    fn test_casefolded_artist_merge_and_singleton_exclusion() {
        let mut scrobbles = repeat(scrobble("alice", "Artist X", "t1", None), 3);
        scrobbles.extend(repeat(scrobble("bob", "artist x", "t2", None), 2));
        scrobbles.extend(repeat(scrobble("carol", "Artist Y", "t3", None), 5));

        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Artist);

        assert_eq!(result.len(), 1);
        let entry = &result[0];
        assert_eq!(entry.key, "artist x");
        assert_eq!(entry.total_plays, 5);
        assert_eq!(entry.plays["alice"], 3);
        assert_eq!(entry.plays["bob"], 2);
        assert_eq!(entry.user_count(), 2);
    }

    #[test]
    fn test_sort_total_descending_ties_by_key() {
        let mut scrobbles = Vec::new();
        // "beta": 4 plays, "alpha": 2, "zeta": 2
        scrobbles.extend(repeat(scrobble("u1", "beta", "t", None), 2));
        scrobbles.extend(repeat(scrobble("u2", "beta", "t", None), 2));
        scrobbles.push(scrobble("u1", "zeta", "t", None));
        scrobbles.push(scrobble("u2", "zeta", "t", None));
        scrobbles.push(scrobble("u1", "alpha", "t", None));
        scrobbles.push(scrobble("u2", "alpha", "t", None));

        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Artist);

        let keys: Vec<&str> = result.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["beta", "alpha", "zeta"]);
    }

    #[test]
    fn test_track_key_includes_artist() {
        // Same title by two artists must not merge
        let scrobbles = vec![
            scrobble("u1", "Artist A", "Intro", None),
            scrobble("u2", "Artist B", "Intro", None),
        ];

        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Track);
        assert!(result.is_empty());

        let scrobbles = vec![
            scrobble("u1", "Artist A", "Intro", None),
            scrobble("u2", "artist a", "intro", None),
        ];
        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Track);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].key, "artist a\u{1F}intro");
        assert_eq!(result[0].display, "Artist A - Intro");
    }

    #[test]
    fn test_composite_key_parts_cannot_straddle() {
        // ("A - B", "C") and ("A", "B - C") are different items and must
        // never merge into one entry
        let scrobbles = vec![
            scrobble("u1", "A - B", "C", None),
            scrobble("u2", "A", "B - C", None),
        ];

        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Track);
        assert!(result.is_empty());

        let scrobbles = vec![
            scrobble("u1", "A - B", "t", Some("C")),
            scrobble("u2", "A", "t", Some("B - C")),
        ];
        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Album);
        assert!(result.is_empty());
    }

    #[test]
    fn test_albumless_scrobbles_excluded_from_album_dimension() {
        let scrobbles = vec![
            scrobble("u1", "a", "t", None),
            scrobble("u2", "a", "t", None),
            scrobble("u1", "a", "t", Some("Dummy")),
            scrobble("u2", "a", "t", Some("dummy")),
        ];

        let result = aggregate_dimension(&scrobbles, &Enrichment::default(), Dimension::Album);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].key, "a\u{1F}dummy");
        assert_eq!(result[0].total_plays, 2);
    }

    #[test]
    fn test_genre_scrobble_counts_once_per_tag() {
        let mut enrichment = Enrichment::default();
        enrichment.artist_tags.insert(
            "portishead".to_string(),
            vec!["trip-hop".to_string(), "electronic".to_string()],
        );
        enrichment
            .artist_tags
            .insert("untagged".to_string(), vec![]);

        let scrobbles = vec![
            scrobble("u1", "Portishead", "Glory Box", None),
            scrobble("u2", "portishead", "Roads", None),
            scrobble("u1", "Untagged", "t", None),
            scrobble("u2", "Untagged", "t", None),
        ];

        let result = aggregate_dimension(&scrobbles, &enrichment, Dimension::Genre);

        assert_eq!(result.len(), 2);
        for entry in &result {
            assert_eq!(entry.total_plays, 2);
            assert_eq!(entry.user_count(), 2);
        }
        let keys: Vec<&str> = result.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["electronic", "trip-hop"]);
    }

    #[test]
    fn test_unknown_label_excluded_from_label_dimension() {
        let mut enrichment = Enrichment::default();
        enrichment.album_labels.insert(
            ("a".to_string(), "signed".to_string()),
            Some("Warp".to_string()),
        );
        enrichment
            .album_labels
            .insert(("a".to_string(), "bootleg".to_string()), None);

        let scrobbles = vec![
            scrobble("u1", "a", "t", Some("Signed")),
            scrobble("u2", "a", "t", Some("signed")),
            scrobble("u1", "a", "t", Some("Bootleg")),
            scrobble("u2", "a", "t", Some("bootleg")),
            scrobble("u1", "a", "t", Some("never looked up")),
            scrobble("u2", "a", "t", Some("never looked up")),
        ];

        let result = aggregate_dimension(&scrobbles, &enrichment, Dimension::Label);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].key, "warp");
        assert_eq!(result[0].display, "Warp");
        assert_eq!(result[0].total_plays, 2);
    }

    #[test]
    fn test_aggregate_all_covers_every_dimension() {
        let scrobbles = vec![
            scrobble("u1", "a", "t", Some("al")),
            scrobble("u2", "a", "t", Some("al")),
        ];

        let result = aggregate_all(&scrobbles, &Enrichment::default());

        assert_eq!(result.len(), Dimension::ALL.len());
        assert_eq!(result[&Dimension::Artist].len(), 1);
        assert_eq!(result[&Dimension::Track].len(), 1);
        assert_eq!(result[&Dimension::Album].len(), 1);
        assert!(result[&Dimension::Genre].is_empty());
        assert!(result[&Dimension::Label].is_empty());
    }
}
