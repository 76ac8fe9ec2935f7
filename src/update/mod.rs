//! Mutations of the song library.
//!
//! Every mutation evicts the affected record from the record cache before
//! writing, and after committing reports what it changed to the
//! [`InvalidationTracker`] so stale cached queries are dropped.

use crate::cache::{CacheError, RecordCache};
use crate::library_store::{
    LibraryStore, Play, PlayOutcome, Song, SongId, SongUpdateOutcome, MAX_RATING,
};
use crate::query::{InvalidationTracker, UpdateTypes};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Song {0} not found")]
    NotFound(SongId),

    #[error("Invalid rating {0}, expected 0-{MAX_RATING}")]
    InvalidRating(u8),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub struct SongUpdater {
    store: Arc<dyn LibraryStore>,
    record_cache: Arc<RecordCache>,
    invalidation: Arc<InvalidationTracker>,
}

impl SongUpdater {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        record_cache: Arc<RecordCache>,
        invalidation: Arc<InvalidationTracker>,
    ) -> Self {
        Self {
            store,
            record_cache,
            invalidation,
        }
    }

    /// The mutation is already committed at this point, so failures are
    /// only logged.
    fn flush_for_update(&self, updates: UpdateTypes) {
        if updates.is_empty() {
            return;
        }
        if let Err(e) = self.invalidation.flush_for_update(updates) {
            error!("Failed to flush cache for {} update: {}", updates, e);
        }
    }

    /// Stores `updated`, matching it to an existing song by SHA1.
    ///
    /// An existing song keeps its rating, tags and plays unless
    /// `replace_user_data` is set, in which case they're replaced with
    /// `updated`'s, including its play history. New songs start out unrated
    /// unless user data is being replaced.
    pub fn update_or_insert_song(
        &self,
        updated: &Song,
        replace_user_data: bool,
    ) -> Result<SongId, UpdateError> {
        let existing_id = self.store.find_song_id_by_sha1(&updated.sha1)?;

        let mut song = match existing_id {
            Some(id) if !replace_user_data => {
                self.store.get_song(id)?.ok_or(UpdateError::NotFound(id))?
            }
            Some(id) => Song {
                id,
                ..Default::default()
            },
            None => Song::default(),
        };
        song.update_from(updated, replace_user_data);

        let mut plays = updated.plays.clone();
        if replace_user_data {
            plays.sort();
            plays.dedup();
            song.rebuild_play_stats(&plays);
        }
        song.last_modified_time = Some(Utc::now());

        if let Some(id) = existing_id {
            debug!("Updating {} with SHA1 {}", updated.filename, updated.sha1);
            self.record_cache.evict(id)?;
        } else {
            debug!("Inserting {} with SHA1 {}", updated.filename, updated.sha1);
        }

        let id = self
            .store
            .save_song(&song, replace_user_data.then_some(plays.as_slice()))?;
        self.flush_for_update(UpdateTypes::METADATA);
        Ok(id)
    }

    /// Records a play. Returns false if the same play was already recorded.
    pub fn add_play(
        &self,
        id: SongId,
        start_time: DateTime<Utc>,
        ip_address: &str,
    ) -> Result<bool, UpdateError> {
        self.record_cache.evict(id)?;
        match self.store.add_play(id, &Play::new(start_time, ip_address))? {
            PlayOutcome::Added => {
                self.flush_for_update(UpdateTypes::PLAYS);
                Ok(true)
            }
            PlayOutcome::Duplicate => {
                debug!(
                    "Already have play for song {} starting at {} from {}",
                    id, start_time, ip_address
                );
                Ok(false)
            }
            PlayOutcome::SongNotFound => Err(UpdateError::NotFound(id)),
        }
    }

    /// Sets a song's rating (0 clears it) and/or replaces its tags.
    /// `None` leaves the corresponding field alone. Returns what actually changed.
    pub fn set_rating_and_tags(
        &self,
        id: SongId,
        rating: Option<u8>,
        tags: Option<Vec<String>>,
    ) -> Result<UpdateTypes, UpdateError> {
        if let Some(r) = rating.filter(|r| *r > MAX_RATING) {
            return Err(UpdateError::InvalidRating(r));
        }

        let mut changed = UpdateTypes::empty();
        let record_cache = Arc::clone(&self.record_cache);
        let outcome = self.store.update_song(id, &mut |song: &mut Song| {
            changed = UpdateTypes::empty();
            if let Some(r) = rating {
                let old = song.rating;
                song.set_rating(Some(r));
                if song.rating != old {
                    changed |= UpdateTypes::RATING;
                }
            }
            if let Some(tags) = &tags {
                let old = std::mem::replace(&mut song.tags, tags.clone());
                song.clean();
                if song.tags != old {
                    changed |= UpdateTypes::TAGS;
                }
            }
            if changed.is_empty() {
                return Ok(false);
            }
            song.last_modified_time = Some(Utc::now());
            record_cache.evict(id)?;
            Ok(true)
        })?;

        match outcome {
            SongUpdateOutcome::SongNotFound => Err(UpdateError::NotFound(id)),
            SongUpdateOutcome::Unchanged => {
                debug!("Song {} wasn't changed", id);
                Ok(UpdateTypes::empty())
            }
            SongUpdateOutcome::Updated => {
                debug!("Updated song {} ({})", id, changed);
                self.flush_for_update(changed);
                Ok(changed)
            }
        }
    }

    pub fn delete_song(&self, id: SongId) -> Result<(), UpdateError> {
        self.record_cache.evict(id)?;
        if !self.store.delete_song(id)? {
            return Err(UpdateError::NotFound(id));
        }
        info!("Deleted song {}", id);
        self.flush_for_update(UpdateTypes::METADATA);
        Ok(())
    }

    /// Re-derives the normalized search fields of every song, rewriting the
    /// ones that changed. Returns (scanned, updated).
    pub fn reindex_songs(&self) -> Result<(usize, usize), UpdateError> {
        let ids = self.store.list_song_ids()?;
        let mut updated = 0;

        for &id in &ids {
            let record_cache = Arc::clone(&self.record_cache);
            let outcome = self.store.update_song(id, &mut |song: &mut Song| {
                let mut derived = Song::default();
                derived.update_from(song, true);
                if derived.artist_lower == song.artist_lower
                    && derived.title_lower == song.title_lower
                    && derived.album_lower == song.album_lower
                    && derived.keywords == song.keywords
                    && derived.tags == song.tags
                {
                    return Ok(false);
                }
                song.artist_lower = derived.artist_lower;
                song.title_lower = derived.title_lower;
                song.album_lower = derived.album_lower;
                song.keywords = derived.keywords;
                song.tags = derived.tags;
                record_cache.evict(id)?;
                Ok(true)
            })?;
            if outcome == SongUpdateOutcome::Updated {
                updated += 1;
            }
        }

        info!("Scanned {} songs for reindex, updated {}", ids.len(), updated);
        if updated > 0 {
            self.flush_for_update(UpdateTypes::METADATA);
        }
        Ok((ids.len(), updated))
    }
}
