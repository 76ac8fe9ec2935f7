//! Song Library Server Library
//!
//! Song storage and search with two-tier caching of query results and songs.

pub mod cache;
pub mod config;
pub mod library;
pub mod library_store;
pub mod query;
pub mod sqlite_persistence;
pub mod update;

// Re-export commonly used types for convenience
pub use library::Library;
pub use library_store::{LibraryStore, Song, SongId, SqliteLibraryStore};
pub use query::{SearchFlags, SearchParams, SongQuery, SongSearcher, UpdateTypes};
pub use update::{SongUpdater, UpdateError};
