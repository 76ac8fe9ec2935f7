//! The song query descriptor and the update kinds that can invalidate its cached results.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

bitflags! {
    /// What a mutation changed. Used to decide which cached results are stale.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UpdateTypes: u8 {
        const METADATA = 1 << 0;
        const RATING = 1 << 1;
        const TAGS = 1 << 2;
        const PLAYS = 1 << 3;
    }
}

impl fmt::Display for UpdateTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Presentation order for non-shuffled results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// By album, album ID, disc and track.
    #[default]
    Album,
    /// Least recently played first. Never-played songs come first.
    LastPlayed,
}

/// A search over the song library.
///
/// Every field except `shuffle` and `order` restricts which songs match; those
/// two only affect how matches are presented and are excluded from [`SongQuery::hash`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongQuery {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub album_id: Option<String>,

    /// Every keyword must appear in the artist, title, album or album artist.
    pub keywords: Vec<String>,

    /// Inclusive, 1 to 5. Takes precedence over `unrated`.
    pub min_rating: Option<u8>,
    pub unrated: bool,

    pub max_plays: Option<i64>,
    pub min_first_start_time: Option<DateTime<Utc>>,
    pub max_last_start_time: Option<DateTime<Utc>>,

    pub track: Option<i64>,
    pub disc: Option<i64>,
    pub max_disc: Option<i64>,

    /// Songs must have all of these tags.
    pub tags: Vec<String>,
    /// Songs must have none of these tags.
    pub not_tags: Vec<String>,

    pub shuffle: bool,
    pub order: SortOrder,
}

/// The matching fields of a [`SongQuery`], in a fixed order for hashing.
#[derive(Serialize)]
struct MatchFields<'a> {
    artist: &'a Option<String>,
    title: &'a Option<String>,
    album: &'a Option<String>,
    album_id: &'a Option<String>,
    keywords: Vec<&'a str>,
    min_rating: Option<u8>,
    unrated: bool,
    max_plays: Option<i64>,
    min_first_start_time: Option<DateTime<Utc>>,
    max_last_start_time: Option<DateTime<Utc>>,
    track: Option<i64>,
    disc: Option<i64>,
    max_disc: Option<i64>,
    tags: Vec<&'a str>,
    not_tags: Vec<&'a str>,
}

/// Set-valued fields hash the same regardless of order or repeats.
fn as_set(values: &[String]) -> Vec<&str> {
    let mut set: Vec<&str> = values.iter().map(String::as_str).collect();
    set.sort_unstable();
    set.dedup();
    set
}

impl SongQuery {
    fn match_fields(&self) -> MatchFields<'_> {
        MatchFields {
            artist: &self.artist,
            title: &self.title,
            album: &self.album,
            album_id: &self.album_id,
            keywords: as_set(&self.keywords),
            min_rating: self.min_rating,
            unrated: self.unrated,
            max_plays: self.max_plays,
            min_first_start_time: self.min_first_start_time,
            max_last_start_time: self.max_last_start_time,
            track: self.track,
            disc: self.disc,
            max_disc: self.max_disc,
            tags: as_set(&self.tags),
            not_tags: as_set(&self.not_tags),
        }
    }

    /// Hex SHA-256 of the matching fields. Queries that only differ in
    /// presentation hash identically.
    pub fn hash(&self) -> String {
        // Serializing plain strings, integers and timestamps can't fail.
        let json = serde_json::to_vec(&self.match_fields()).unwrap_or_default();
        format!("{:x}", Sha256::digest(&json))
    }

    /// Whether the query's results may be cached. Results that depend on play
    /// history change with every play and are never cached.
    pub fn can_cache(&self) -> bool {
        self.max_plays.is_none()
            && self.min_first_start_time.is_none()
            && self.max_last_start_time.is_none()
    }

    /// Whether an update of the given kinds could change this query's results.
    pub fn results_invalidated(&self, updates: UpdateTypes) -> bool {
        if updates.contains(UpdateTypes::METADATA) {
            return true;
        }
        if updates.contains(UpdateTypes::RATING) && (self.min_rating.is_some() || self.unrated) {
            return true;
        }
        if updates.contains(UpdateTypes::TAGS) && (!self.tags.is_empty() || !self.not_tags.is_empty())
        {
            return true;
        }
        if updates.contains(UpdateTypes::PLAYS) && !self.can_cache() {
            return true;
        }
        false
    }
}
