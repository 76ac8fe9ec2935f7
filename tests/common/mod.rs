//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{song_a, TestLibrary};
//! use song_library::{SearchFlags, SongQuery};
//!
//! #[tokio::test]
//! async fn test_search() {
//!     let lib = TestLibrary::new();
//!     let id = lib.insert(&song_a());
//!     let songs = lib.searcher().search(&SongQuery::default(), SearchFlags::empty()).await.unwrap();
//!     assert_eq!(songs[0].id, id);
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fixtures;
mod library;

pub use constants::*;
pub use fixtures::{song, song_a, song_b, FailingStore, FailingTier, FlakyStore};
pub use library::TestLibrary;
