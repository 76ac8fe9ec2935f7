//! Persistent storage for songs and their play history.

mod filter;
mod models;
pub mod normalize;
mod schema;
mod store;

pub use filter::{EqualityFilter, FilterQuery, RangeFilter};
pub use models::*;
pub use schema::LIBRARY_VERSIONED_SCHEMAS;
pub use store::SqliteLibraryStore;

use anyhow::Result;
use std::collections::HashMap;

/// Read/write access to the song library.
pub trait LibraryStore: Send + Sync {
    /// Returns the IDs of all songs matching `query`, sorted ascending.
    fn query_song_ids(&self, query: &FilterQuery) -> Result<Vec<SongId>>;

    fn get_song(&self, id: SongId) -> Result<Option<Song>>;

    /// Fetches many songs at once. IDs without a stored song are absent from the map.
    fn get_songs(&self, ids: &[SongId]) -> Result<HashMap<SongId, Song>>;

    fn find_song_id_by_sha1(&self, sha1: &str) -> Result<Option<SongId>>;

    /// Inserts `song` when its ID is 0 and replaces the stored row otherwise.
    /// When `plays` is given the song's play history is replaced with it.
    /// Returns the song's ID.
    fn save_song(&self, song: &Song, plays: Option<&[Play]>) -> Result<SongId>;

    /// Loads the song, passes it to `update` and writes it back if `update`
    /// returns true, all within one transaction.
    fn update_song(
        &self,
        id: SongId,
        update: &mut dyn FnMut(&mut Song) -> Result<bool>,
    ) -> Result<SongUpdateOutcome>;

    /// Deletes a song and its plays. Returns false if there was no such song.
    fn delete_song(&self, id: SongId) -> Result<bool>;

    /// Returns a song's plays, oldest first.
    fn get_plays(&self, id: SongId) -> Result<Vec<Play>>;

    /// Records a play and updates the song's play aggregates atomically.
    fn add_play(&self, id: SongId, play: &Play) -> Result<PlayOutcome>;

    /// Returns every distinct tag in use, sorted.
    fn get_all_tags(&self) -> Result<Vec<String>>;

    fn list_song_ids(&self) -> Result<Vec<SongId>>;

    fn count_songs(&self) -> Result<usize>;
}
