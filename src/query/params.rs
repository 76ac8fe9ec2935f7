//! Conversion of caller-facing search parameters into a [`SongQuery`].

use super::descriptor::{SongQuery, SortOrder};
use super::search::SearchFlags;
use crate::library_store::normalize::sort_and_dedupe;
use crate::library_store::MAX_RATING;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("Invalid minimum rating {0}, expected 1-{MAX_RATING}")]
    InvalidMinRating(u8),
    #[error("Invalid {0}: {1}")]
    InvalidNumber(&'static str, i64),
}

/// Search request as supplied by a client. Strings are taken verbatim from
/// the request; see [`SearchParams::to_query`] for how they are interpreted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub album_id: Option<String>,
    /// Whitespace-separated keywords.
    pub keywords: Option<String>,
    /// Whitespace-separated tags. A leading `-` excludes songs with that tag.
    pub tags: Option<String>,
    pub min_rating: Option<u8>,
    pub unrated: bool,
    pub max_plays: Option<i64>,
    pub min_first_played: Option<DateTime<Utc>>,
    pub max_last_played: Option<DateTime<Utc>>,
    /// Only match the first track of the first disc.
    pub first_track: bool,
    pub max_disc: Option<i64>,
    pub shuffle: bool,
    pub order_by_last_played: bool,
    /// Return cached results only, running no queries against the store.
    pub cache_only: bool,
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl SearchParams {
    pub fn to_query(&self) -> Result<SongQuery, ParamsError> {
        let mut query = SongQuery {
            artist: non_empty(&self.artist),
            title: non_empty(&self.title),
            album: non_empty(&self.album),
            album_id: non_empty(&self.album_id),
            shuffle: self.shuffle,
            order: if self.order_by_last_played {
                SortOrder::LastPlayed
            } else {
                SortOrder::Album
            },
            min_first_start_time: self.min_first_played,
            max_last_start_time: self.max_last_played,
            ..Default::default()
        };

        if let Some(keywords) = &self.keywords {
            query.keywords = keywords.split_whitespace().map(str::to_string).collect();
            sort_and_dedupe(&mut query.keywords);
        }

        if self.first_track {
            query.track = Some(1);
            query.disc = Some(1);
        }

        match self.min_rating {
            Some(r) if r == 0 || r > MAX_RATING => return Err(ParamsError::InvalidMinRating(r)),
            Some(r) => query.min_rating = Some(r),
            None => query.unrated = self.unrated,
        }

        if let Some(max_plays) = self.max_plays {
            if max_plays < 0 {
                return Err(ParamsError::InvalidNumber("max plays", max_plays));
            }
            query.max_plays = Some(max_plays);
        }
        if let Some(max_disc) = self.max_disc {
            if max_disc < 0 {
                return Err(ParamsError::InvalidNumber("max disc", max_disc));
            }
            query.max_disc = Some(max_disc);
        }

        if let Some(tags) = &self.tags {
            for tag in tags.split_whitespace() {
                match tag.strip_prefix('-') {
                    Some(negated) if !negated.is_empty() => query.not_tags.push(negated.to_string()),
                    Some(_) => {}
                    None => query.tags.push(tag.to_string()),
                }
            }
            sort_and_dedupe(&mut query.tags);
            sort_and_dedupe(&mut query.not_tags);
        }

        Ok(query)
    }

    pub fn flags(&self) -> SearchFlags {
        if self.cache_only {
            SearchFlags::CACHE_ONLY
        } else {
            SearchFlags::empty()
        }
    }
}
