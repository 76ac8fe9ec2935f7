//! Splits a [`SongQuery`] into store queries with at most one range filter each.
//!
//! Every sub-query carries the same equality filters, so the id lists they
//! return can be intersected and subtracted to answer the full query.

use super::descriptor::SongQuery;
use crate::library_store::normalize::{keywords, normalize};
use crate::library_store::{EqualityFilter, FilterQuery, RangeFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubQueryRole {
    /// Equality filters only. Not executed on its own unless it is also the
    /// sole positive sub-query.
    Base,
    /// Matching ids are intersected.
    Positive,
    /// Matching ids are removed from the result.
    Negative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub role: SubQueryRole,
    pub filter: FilterQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub base: FilterQuery,
    /// Positive sub-queries first, then negative ones.
    pub sub_queries: Vec<SubQuery>,
}

impl QueryPlan {
    pub fn positives(&self) -> impl Iterator<Item = &SubQuery> {
        self.sub_queries
            .iter()
            .filter(|q| q.role == SubQueryRole::Positive)
    }

    pub fn negatives(&self) -> impl Iterator<Item = &SubQuery> {
        self.sub_queries
            .iter()
            .filter(|q| q.role == SubQueryRole::Negative)
    }
}

fn base_filter(query: &SongQuery) -> FilterQuery {
    let mut equality = Vec::new();

    if let Some(artist) = &query.artist {
        equality.push(EqualityFilter::ArtistLower(normalize(artist)));
    }
    if let Some(title) = &query.title {
        equality.push(EqualityFilter::TitleLower(normalize(title)));
    }
    if let Some(album) = &query.album {
        equality.push(EqualityFilter::AlbumLower(normalize(album)));
    }
    if let Some(album_id) = &query.album_id {
        equality.push(EqualityFilter::AlbumId(album_id.clone()));
    }

    // Keywords are tokenized the same way songs' keywords are.
    let mut words: Vec<String> = query.keywords.iter().flat_map(|k| keywords(k)).collect();
    words.sort();
    words.dedup();
    equality.extend(words.into_iter().map(EqualityFilter::Keyword));

    equality.extend(query.tags.iter().cloned().map(EqualityFilter::Tag));

    if let Some(track) = query.track {
        equality.push(EqualityFilter::Track(track));
    }
    if let Some(disc) = query.disc {
        equality.push(EqualityFilter::Disc(disc));
    }
    if query.unrated && query.min_rating.is_none() {
        equality.push(EqualityFilter::Unrated);
    }

    FilterQuery {
        equality,
        range: None,
    }
}

fn range_filters(query: &SongQuery) -> Vec<RangeFilter> {
    let mut ranges = Vec::new();
    if let Some(r) = query.min_rating {
        ranges.push(RangeFilter::MinRating(r));
    }
    if let Some(n) = query.max_plays {
        ranges.push(RangeFilter::MaxPlays(n));
    }
    if let Some(t) = query.min_first_start_time {
        ranges.push(RangeFilter::MinFirstStartTime(t));
    }
    if let Some(t) = query.max_last_start_time {
        ranges.push(RangeFilter::MaxLastStartTime(t));
    }
    if let Some(d) = query.max_disc {
        ranges.push(RangeFilter::MaxDisc(d));
    }
    ranges
}

pub fn plan(query: &SongQuery) -> QueryPlan {
    let base = base_filter(query);
    let mut sub_queries: Vec<SubQuery> = range_filters(query)
        .into_iter()
        .map(|range| SubQuery {
            role: SubQueryRole::Positive,
            filter: base.with_range(range),
        })
        .collect();

    if sub_queries.is_empty() {
        sub_queries.push(SubQuery {
            role: SubQueryRole::Positive,
            filter: base.clone(),
        });
    }

    sub_queries.extend(query.not_tags.iter().map(|tag| SubQuery {
        role: SubQueryRole::Negative,
        filter: base.with_equality(EqualityFilter::Tag(tag.clone())),
    }));

    QueryPlan { base, sub_queries }
}
