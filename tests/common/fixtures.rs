//! Test songs and failing collaborators

use super::constants::*;
use song_library::cache::{CacheError, CacheTier, CacheType};
use song_library::library_store::{
    EqualityFilter, FilterQuery, LibraryStore, Play, PlayOutcome, Song, SongId, SongUpdateOutcome,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A song ready to import. `sha1` is derived from the artist and title.
pub fn song(artist: &str, title: &str, album: &str, track: i64, tags: &[&str], rating: Option<u8>) -> Song {
    Song {
        sha1: format!("{}/{}", artist, title),
        filename: format!("{}/{}.mp3", album, title),
        artist: artist.to_string(),
        title: title.to_string(),
        album: album.to_string(),
        track,
        disc: 1,
        length: 180.0,
        rating,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

/// Rated 4, tagged rock.
pub fn song_a() -> Song {
    song(ARTIST_A, "First Song", "Loud Album", 1, &[TAG_ROCK], Some(4))
}

/// Unrated, tagged jazz.
pub fn song_b() -> Song {
    song(ARTIST_B, "Second Song", "Quiet Album", 1, &[TAG_JAZZ], None)
}

/// A cache tier where every operation fails.
pub struct FailingTier {
    pub kind: CacheType,
}

impl FailingTier {
    fn err(&self) -> CacheError {
        CacheError::Unavailable(format!("{} tier is down", self.kind))
    }
}

impl CacheTier for FailingTier {
    fn kind(&self) -> CacheType {
        self.kind
    }

    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(self.err())
    }

    fn set(&self, _key: &str, _value: &[u8], _expiry: Option<Duration>) -> Result<(), CacheError> {
        Err(self.err())
    }

    fn add(&self, _key: &str, _value: &[u8], _expiry: Option<Duration>) -> Result<(), CacheError> {
        Err(self.err())
    }

    fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(self.err())
    }

    fn flush(&self) -> Result<(), CacheError> {
        Err(self.err())
    }
}

/// A library store where every operation fails.
pub struct FailingStore;

impl LibraryStore for FailingStore {
    fn query_song_ids(&self, _query: &FilterQuery) -> anyhow::Result<Vec<SongId>> {
        anyhow::bail!("database is locked")
    }

    fn get_song(&self, _id: SongId) -> anyhow::Result<Option<Song>> {
        anyhow::bail!("database is locked")
    }

    fn get_songs(&self, _ids: &[SongId]) -> anyhow::Result<HashMap<SongId, Song>> {
        anyhow::bail!("database is locked")
    }

    fn find_song_id_by_sha1(&self, _sha1: &str) -> anyhow::Result<Option<SongId>> {
        anyhow::bail!("database is locked")
    }

    fn save_song(&self, _song: &Song, _plays: Option<&[Play]>) -> anyhow::Result<SongId> {
        anyhow::bail!("database is locked")
    }

    fn update_song(
        &self,
        _id: SongId,
        _update: &mut dyn FnMut(&mut Song) -> anyhow::Result<bool>,
    ) -> anyhow::Result<SongUpdateOutcome> {
        anyhow::bail!("database is locked")
    }

    fn delete_song(&self, _id: SongId) -> anyhow::Result<bool> {
        anyhow::bail!("database is locked")
    }

    fn get_plays(&self, _id: SongId) -> anyhow::Result<Vec<Play>> {
        anyhow::bail!("database is locked")
    }

    fn add_play(&self, _id: SongId, _play: &Play) -> anyhow::Result<PlayOutcome> {
        anyhow::bail!("database is locked")
    }

    fn get_all_tags(&self) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("database is locked")
    }

    fn list_song_ids(&self) -> anyhow::Result<Vec<SongId>> {
        anyhow::bail!("database is locked")
    }

    fn count_songs(&self) -> anyhow::Result<usize> {
        anyhow::bail!("database is locked")
    }
}

/// Delegates to a real store, except that id queries filtering on
/// `failing_tag` fail. Counts every id query it receives.
pub struct FlakyStore {
    inner: Arc<dyn LibraryStore>,
    failing_tag: String,
    id_queries: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn LibraryStore>, failing_tag: &str) -> Self {
        Self {
            inner,
            failing_tag: failing_tag.to_string(),
            id_queries: AtomicUsize::new(0),
        }
    }

    pub fn id_queries(&self) -> usize {
        self.id_queries.load(Ordering::SeqCst)
    }
}

impl LibraryStore for FlakyStore {
    fn query_song_ids(&self, query: &FilterQuery) -> anyhow::Result<Vec<SongId>> {
        self.id_queries.fetch_add(1, Ordering::SeqCst);
        if query
            .equality
            .contains(&EqualityFilter::Tag(self.failing_tag.clone()))
        {
            anyhow::bail!("disk I/O error");
        }
        self.inner.query_song_ids(query)
    }

    fn get_song(&self, id: SongId) -> anyhow::Result<Option<Song>> {
        self.inner.get_song(id)
    }

    fn get_songs(&self, ids: &[SongId]) -> anyhow::Result<HashMap<SongId, Song>> {
        self.inner.get_songs(ids)
    }

    fn find_song_id_by_sha1(&self, sha1: &str) -> anyhow::Result<Option<SongId>> {
        self.inner.find_song_id_by_sha1(sha1)
    }

    fn save_song(&self, song: &Song, plays: Option<&[Play]>) -> anyhow::Result<SongId> {
        self.inner.save_song(song, plays)
    }

    fn update_song(
        &self,
        id: SongId,
        update: &mut dyn FnMut(&mut Song) -> anyhow::Result<bool>,
    ) -> anyhow::Result<SongUpdateOutcome> {
        self.inner.update_song(id, update)
    }

    fn delete_song(&self, id: SongId) -> anyhow::Result<bool> {
        self.inner.delete_song(id)
    }

    fn get_plays(&self, id: SongId) -> anyhow::Result<Vec<Play>> {
        self.inner.get_plays(id)
    }

    fn add_play(&self, id: SongId, play: &Play) -> anyhow::Result<PlayOutcome> {
        self.inner.add_play(id, play)
    }

    fn get_all_tags(&self) -> anyhow::Result<Vec<String>> {
        self.inner.get_all_tags()
    }

    fn list_song_ids(&self) -> anyhow::Result<Vec<SongId>> {
        self.inner.list_song_ids()
    }

    fn count_songs(&self) -> anyhow::Result<usize> {
        self.inner.count_songs()
    }
}
