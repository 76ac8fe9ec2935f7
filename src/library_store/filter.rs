//! Filters understood by [`LibraryStore::query_song_ids`](super::LibraryStore::query_song_ids).
//!
//! A [`FilterQuery`] carries any number of equality filters but at most one
//! range filter, mirroring what the store can answer from a single index scan.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum EqualityFilter {
    ArtistLower(String),
    TitleLower(String),
    AlbumLower(String),
    AlbumId(String),
    Keyword(String),
    Tag(String),
    Track(i64),
    Disc(i64),
    Unrated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeFilter {
    MinRating(u8),
    MaxPlays(i64),
    MaxDisc(i64),
    MinFirstStartTime(DateTime<Utc>),
    /// Songs that were never played also match.
    MaxLastStartTime(DateTime<Utc>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterQuery {
    pub equality: Vec<EqualityFilter>,
    pub range: Option<RangeFilter>,
}

impl FilterQuery {
    /// Returns a copy of this query with `range` as its range filter.
    pub fn with_range(&self, range: RangeFilter) -> Self {
        Self {
            equality: self.equality.clone(),
            range: Some(range),
        }
    }

    /// Returns a copy of this query with one more equality filter.
    pub fn with_equality(&self, filter: EqualityFilter) -> Self {
        let mut query = self.clone();
        query.equality.push(filter);
        query
    }
}
