//! Type definitions for Last.fm recent-tracks API responses.
//!
//! The remote payload is loosely shaped (numbers as strings, optional
//! sub-objects, now-playing entries without timestamps), so every field is
//! optional at the wire level and converted into [`Scrobble`] records with
//! explicit validation; records that fail validation are skipped, not
//! propagated.

use serde::Deserialize;
use tracing::warn;

/// One listening event, normalized from the wire format. Immutable once
/// fetched; the timestamp is the ordering and filtering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrobble {
    pub user: String,
    pub artist: String,
    pub track: String,
    pub album: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecentTracksResponse {
    pub recenttracks: Option<RecentTracks>,
}

#[derive(Debug, Deserialize)]
pub struct RecentTracks {
    #[serde(default)]
    pub track: Vec<WireTrack>,
    #[serde(rename = "@attr")]
    pub attr: Option<PageAttr>,
}

#[derive(Debug, Deserialize)]
pub struct PageAttr {
    #[serde(rename = "totalPages")]
    pub total_pages: Option<String>,
    pub total: Option<String>,
    pub page: Option<String>,
}

impl PageAttr {
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn total(&self) -> Option<u64> {
        self.total.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
pub struct WireTrack {
    pub artist: Option<WireArtist>,
    pub name: Option<String>,
    pub album: Option<WireAlbum>,
    pub date: Option<WireDate>,
    #[serde(rename = "@attr")]
    pub attr: Option<TrackAttr>,
}

/// With `extended=1` the artist is an object carrying `name` and `mbid`;
/// without it Last.fm uses `#text`. Accept both.
#[derive(Debug, Deserialize)]
pub struct WireArtist {
    pub name: Option<String>,
    #[serde(rename = "#text")]
    pub text: Option<String>,
    pub mbid: Option<String>,
}

impl WireArtist {
    fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.text.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct WireAlbum {
    #[serde(rename = "#text")]
    pub text: Option<String>,
    pub mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireDate {
    pub uts: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackAttr {
    pub nowplaying: Option<String>,
}

impl WireTrack {
    fn is_now_playing(&self) -> bool {
        self.attr
            .as_ref()
            .and_then(|a| a.nowplaying.as_deref())
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Validate and convert into a [`Scrobble`]. Returns `None` for
    /// now-playing entries and for records missing artist, title or
    /// timestamp (data-shape errors).
    pub fn into_scrobble(self, user: &str) -> Option<Scrobble> {
        if self.is_now_playing() {
            return None;
        }

        let artist = self.artist.as_ref().and_then(|a| a.display_name());
        let track = self.name.as_deref().filter(|s| !s.trim().is_empty());
        let timestamp = self
            .date
            .as_ref()
            .and_then(|d| d.uts.as_deref())
            .and_then(|uts| uts.parse::<i64>().ok());

        match (artist, track, timestamp) {
            (Some(artist), Some(track), Some(timestamp)) => Some(Scrobble {
                user: user.to_string(),
                artist: artist.to_string(),
                track: track.to_string(),
                album: self
                    .album
                    .as_ref()
                    .and_then(|a| a.text.as_deref())
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.to_string()),
                timestamp,
            }),
            _ => {
                warn!(
                    "Skipping malformed scrobble record for {}: artist={:?} track={:?}",
                    user,
                    self.artist.as_ref().and_then(|a| a.display_name()),
                    self.name
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RecentTracksResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_extended_response() {
        let response = parse(
            r##"{
                "recenttracks": {
                    "track": [
                        {
                            "artist": {"name": "Portishead", "mbid": "8f6bd1e4"},
                            "name": "Roads",
                            "album": {"#text": "Dummy", "mbid": ""},
                            "date": {"uts": "1710000000"}
                        }
                    ],
                    "@attr": {"page": "1", "totalPages": "3", "total": "512"}
                }
            }"##,
        );

        let recent = response.recenttracks.unwrap();
        assert_eq!(recent.attr.as_ref().unwrap().total_pages(), Some(3));
        assert_eq!(recent.attr.as_ref().unwrap().total(), Some(512));

        let scrobble = recent
            .track
            .into_iter()
            .next()
            .unwrap()
            .into_scrobble("alice")
            .unwrap();
        assert_eq!(scrobble.user, "alice");
        assert_eq!(scrobble.artist, "Portishead");
        assert_eq!(scrobble.track, "Roads");
        assert_eq!(scrobble.album, Some("Dummy".to_string()));
        assert_eq!(scrobble.timestamp, 1710000000);
    }

    #[test]
    fn test_parse_unextended_artist_text() {
        let response = parse(
            r##"{
                "recenttracks": {
                    "track": [
                        {
                            "artist": {"#text": "Can"},
                            "name": "Vitamin C",
                            "date": {"uts": "1700000001"}
                        }
                    ]
                }
            }"##,
        );

        let scrobble = response
            .recenttracks
            .unwrap()
            .track
            .into_iter()
            .next()
            .unwrap()
            .into_scrobble("bob")
            .unwrap();
        assert_eq!(scrobble.artist, "Can");
        assert_eq!(scrobble.album, None);
    }

    #[test]
    fn test_now_playing_entry_skipped() {
        let response = parse(
            r#"{
                "recenttracks": {
                    "track": [
                        {
                            "artist": {"name": "Low"},
                            "name": "Days Like These",
                            "@attr": {"nowplaying": "true"}
                        }
                    ]
                }
            }"#,
        );

        let track = response.recenttracks.unwrap().track.into_iter().next().unwrap();
        assert!(track.into_scrobble("alice").is_none());
    }

    #[test]
    fn test_malformed_records_skipped() {
        // Missing timestamp
        let no_date: WireTrack = serde_json::from_str(
            r#"{"artist": {"name": "Suede"}, "name": "Trash"}"#,
        )
        .unwrap();
        assert!(no_date.into_scrobble("alice").is_none());

        // Missing artist
        let no_artist: WireTrack =
            serde_json::from_str(r#"{"name": "Trash", "date": {"uts": "1700000000"}}"#).unwrap();
        assert!(no_artist.into_scrobble("alice").is_none());

        // Empty track name
        let empty_name: WireTrack = serde_json::from_str(
            r#"{"artist": {"name": "Suede"}, "name": "  ", "date": {"uts": "1700000000"}}"#,
        )
        .unwrap();
        assert!(empty_name.into_scrobble("alice").is_none());

        // Unparseable timestamp
        let bad_uts: WireTrack = serde_json::from_str(
            r#"{"artist": {"name": "Suede"}, "name": "Trash", "date": {"uts": "not-a-number"}}"#,
        )
        .unwrap();
        assert!(bad_uts.into_scrobble("alice").is_none());
    }

    #[test]
    fn test_empty_album_text_becomes_none() {
        let track: WireTrack = serde_json::from_str(
            r##"{
                "artist": {"name": "Neu!"},
                "name": "Hallogallo",
                "album": {"#text": ""},
                "date": {"uts": "1700000000"}
            }"##,
        )
        .unwrap();
        let scrobble = track.into_scrobble("carol").unwrap();
        assert_eq!(scrobble.album, None);
    }
}
