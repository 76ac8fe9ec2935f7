use super::normalize::{keywords, normalize, sort_and_dedupe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a song by the library store.
pub type SongId = i64;

/// Highest rating a song can be given. Ratings start at 1.
pub const MAX_RATING: u8 = 5;

/// A single playback of a song.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Play {
    pub start_time: DateTime<Utc>,
    pub ip_address: String,
}

impl Play {
    pub fn new(start_time: DateTime<Utc>, ip_address: impl Into<String>) -> Self {
        Self {
            start_time,
            ip_address: ip_address.into(),
        }
    }
}

/// A song in the library: file metadata, user data and play aggregates.
///
/// `artist_lower`, `title_lower`, `album_lower` and `keywords` are derived from
/// the display fields and must only be written through [`Song::update_from`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    /// Zero until the song has been stored.
    pub id: SongId,
    /// Hash of the audio data, used to recognize re-imported files.
    pub sha1: String,
    pub filename: String,

    pub artist: String,
    pub title: String,
    pub album: String,
    pub album_artist: String,
    pub album_id: String,

    pub artist_lower: String,
    pub title_lower: String,
    pub album_lower: String,
    pub keywords: Vec<String>,

    pub track: i64,
    pub disc: i64,
    /// Duration in seconds.
    pub length: f64,

    /// `None` when the song hasn't been rated.
    pub rating: Option<u8>,
    pub tags: Vec<String>,

    pub num_plays: i64,
    pub first_start_time: Option<DateTime<Utc>>,
    pub last_start_time: Option<DateTime<Utc>>,
    pub last_modified_time: Option<DateTime<Utc>>,

    /// Play history. Only populated when importing songs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plays: Vec<Play>,
}

impl Song {
    /// Copies file metadata from `src` and re-derives the normalized fields.
    /// Rating, tags and play aggregates are copied too when `copy_user_data` is set.
    pub fn update_from(&mut self, src: &Song, copy_user_data: bool) {
        self.sha1 = src.sha1.clone();
        self.filename = src.filename.clone();
        self.artist = src.artist.clone();
        self.title = src.title.clone();
        self.album = src.album.clone();
        self.album_artist = src.album_artist.clone();
        self.album_id = src.album_id.clone();
        self.track = src.track;
        self.disc = src.disc;
        self.length = src.length;

        self.artist_lower = normalize(&self.artist);
        self.title_lower = normalize(&self.title);
        self.album_lower = normalize(&self.album);
        self.keywords = [&self.artist, &self.title, &self.album, &self.album_artist]
            .into_iter()
            .flat_map(|s| keywords(s))
            .collect();

        if copy_user_data {
            self.set_rating(src.rating);
            self.first_start_time = src.first_start_time;
            self.last_start_time = src.last_start_time;
            self.num_plays = src.num_plays;
            self.tags = src.tags.clone();
        }

        self.clean();
    }

    /// Sets the rating, treating 0 as "unrated".
    pub fn set_rating(&mut self, rating: Option<u8>) {
        self.rating = rating.filter(|r| *r > 0);
    }

    /// Accounts for one more play starting at `start_time`.
    pub fn update_play_stats(&mut self, start_time: DateTime<Utc>) {
        self.num_plays += 1;
        if self.first_start_time.map_or(true, |t| start_time < t) {
            self.first_start_time = Some(start_time);
        }
        if self.last_start_time.map_or(true, |t| start_time > t) {
            self.last_start_time = Some(start_time);
        }
    }

    /// Recomputes the play aggregates from scratch.
    pub fn rebuild_play_stats(&mut self, plays: &[Play]) {
        self.num_plays = 0;
        self.first_start_time = None;
        self.last_start_time = None;
        for play in plays {
            self.update_play_stats(play.start_time);
        }
    }

    /// Sorts and dedupes keywords, tags and plays.
    pub fn clean(&mut self) {
        sort_and_dedupe(&mut self.keywords);
        sort_and_dedupe(&mut self.tags);
        self.plays.sort();
        self.plays.dedup();
    }
}

/// Result of recording a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Added,
    /// A play with the same start time and address was already recorded.
    Duplicate,
    SongNotFound,
}

/// Result of a read-modify-write of a stored song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongUpdateOutcome {
    Updated,
    Unchanged,
    SongNotFound,
}
