//! The search entry point tying planning, execution, caching and selection together.

use super::descriptor::SongQuery;
use super::params::{ParamsError, SearchParams};
use super::{executor, merge, planner, select};
use crate::cache::{CacheError, CacheType, QueryCache, RecordCache, TagCache};
use crate::library_store::{LibraryStore, Song, SongId};
use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SearchFlags: u8 {
        /// Only return results already in the query cache.
        const CACHE_ONLY = 1 << 0;
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid search parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Query worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Query worker exited without a result")]
    WorkerLost,

    #[error("Tags not cached")]
    TagsNotCached,
}

pub struct SongSearcher {
    store: Arc<dyn LibraryStore>,
    query_cache: Arc<QueryCache>,
    record_cache: Arc<RecordCache>,
    tag_cache: Arc<TagCache>,
    max_results: usize,
}

impl SongSearcher {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        query_cache: Arc<QueryCache>,
        record_cache: Arc<RecordCache>,
        tag_cache: Arc<TagCache>,
        max_results: usize,
    ) -> Self {
        Self {
            store,
            query_cache,
            record_cache,
            tag_cache,
            max_results,
        }
    }

    pub async fn search_params(&self, params: &SearchParams) -> Result<Vec<Song>, QueryError> {
        let query = params.to_query()?;
        self.search(&query, params.flags()).await
    }

    /// Returns the songs matching `query`, at most `max_results` of them,
    /// in presentation order.
    pub async fn search(&self, query: &SongQuery, flags: SearchFlags) -> Result<Vec<Song>, QueryError> {
        let ids = match self.cached_ids(query).await? {
            Some(ids) => ids,
            None if flags.contains(SearchFlags::CACHE_ONLY) => {
                debug!("Query not cached and cache-only search requested");
                Vec::new()
            }
            None => {
                let ids = self.run_query(query).await?;
                self.cache_ids(query, &ids).await?;
                ids
            }
        };

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = select::select_ids(ids, self.max_results, query.shuffle, &mut rand::rng());
        let mut songs = self.fetch_songs(ids).await?;

        if query.shuffle {
            select::spread_songs(&mut songs, &mut rand::rng());
        } else {
            select::sort_songs(&mut songs, query.order);
        }
        Ok(songs)
    }

    /// Query cache tiers may be backed by SQLite, so they're read and written
    /// on the blocking pool like the store.
    async fn cached_ids(&self, query: &SongQuery) -> Result<Option<Vec<SongId>>, QueryError> {
        if !self.query_cache.is_enabled() || !query.can_cache() {
            return Ok(None);
        }
        let query_cache = Arc::clone(&self.query_cache);
        let query = query.clone();
        Ok(tokio::task::spawn_blocking(move || query_cache.lookup(&query)).await?)
    }

    async fn cache_ids(&self, query: &SongQuery, ids: &[SongId]) -> Result<(), QueryError> {
        if !self.query_cache.is_enabled() || !query.can_cache() {
            return Ok(());
        }
        let query_cache = Arc::clone(&self.query_cache);
        let query = query.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || query_cache.store(&query, &ids)).await?;
        Ok(())
    }

    async fn run_query(&self, query: &SongQuery) -> Result<Vec<SongId>, QueryError> {
        let plan = planner::plan(query);
        let start = Instant::now();
        let results = executor::execute(Arc::clone(&self.store), &plan.sub_queries).await?;
        let merged = merge::merge_results(&plan, results);
        debug!(
            "Ran {} sub-query(s) and merged to {} result(s) in {}ms",
            plan.sub_queries.len(),
            merged.len(),
            start.elapsed().as_millis()
        );
        Ok(merged)
    }

    /// Resolves ids to songs, preserving the order of `ids`. Songs missing
    /// from the record cache are loaded from the store and cached.
    async fn fetch_songs(&self, ids: Vec<SongId>) -> Result<Vec<Song>, QueryError> {
        let store = Arc::clone(&self.store);
        let record_cache = Arc::clone(&self.record_cache);

        let songs = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Song>> {
            let mut found = record_cache.get_many(&ids);
            let missing: Vec<SongId> = ids
                .iter()
                .copied()
                .filter(|id| !found.contains_key(id))
                .collect();
            debug!(
                "Got {} song(s) from cache, fetching {} from store",
                found.len(),
                missing.len()
            );

            if !missing.is_empty() {
                let fetched: HashMap<SongId, Song> = store.get_songs(&missing)?;
                let to_cache: Vec<Song> = fetched.values().cloned().collect();
                if let Err(e) = record_cache.put_many(&to_cache, true) {
                    warn!("Failed to cache fetched songs: {}", e);
                }
                found.extend(fetched);
            }

            Ok(ids
                .iter()
                .filter_map(|id| {
                    let song = found.remove(id);
                    if song.is_none() {
                        warn!("Song {} matched but no longer exists", id);
                    }
                    song
                })
                .map(clean_song)
                .collect())
        })
        .await??;
        Ok(songs)
    }

    /// Every distinct tag in use. With `require_cache`, fails instead of
    /// scanning the store when the list isn't cached.
    pub async fn tags(&self, require_cache: bool) -> Result<Vec<String>, QueryError> {
        let tag_cache = Arc::clone(&self.tag_cache);
        let (cached, missed) = tokio::task::spawn_blocking(move || tag_cache.get()).await?;
        let tags = match cached {
            Some(tags) => tags,
            None if require_cache => return Err(QueryError::TagsNotCached),
            None => {
                let store = Arc::clone(&self.store);
                let start = Instant::now();
                let tags = tokio::task::spawn_blocking(move || store.get_all_tags()).await??;
                debug!(
                    "Loaded {} tag(s) from store in {}ms",
                    tags.len(),
                    start.elapsed().as_millis()
                );
                tags
            }
        };

        let tag_cache = Arc::clone(&self.tag_cache);
        tokio::task::spawn_blocking(move || {
            tag_cache.set_in(&tags, &missed);
            tags
        })
        .await
        .map_err(QueryError::from)
    }

    /// Drops cached queries and tags from every tier, or only from `only`.
    pub fn flush_caches(&self, only: Option<CacheType>) -> Result<(), CacheError> {
        info!(
            "Flushing cached queries and tags from {}",
            only.map_or("all tiers".to_string(), |t| format!("{} tier", t))
        );
        let queries = self.query_cache.flush(only);
        let tags = self.tag_cache.flush(only);
        queries.and(tags)
    }
}

/// Strips fields that are only needed when updating songs.
fn clean_song(mut song: Song) -> Song {
    song.sha1.clear();
    song.plays.clear();
    song
}
