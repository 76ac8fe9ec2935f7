//! SQLite schema for the song library database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema};

/// Rating column value for songs that haven't been rated.
pub const UNRATED: i64 = 0;

const SONG_ID_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "id",
    cascade: true,
};

// =============================================================================
// Version 1
// =============================================================================

/// One row per song. Times are milliseconds since the Unix epoch.
const SONGS_TABLE_V1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("sha1", &SqlType::Text, non_null = true),
        sqlite_column!("filename", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("album", &SqlType::Text, non_null = true),
        sqlite_column!("album_artist", &SqlType::Text, non_null = true),
        sqlite_column!("album_id", &SqlType::Text, non_null = true),
        sqlite_column!("artist_lower", &SqlType::Text, non_null = true),
        sqlite_column!("title_lower", &SqlType::Text, non_null = true),
        sqlite_column!("album_lower", &SqlType::Text, non_null = true),
        sqlite_column!("track", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("disc", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("length", &SqlType::Real, non_null = true, default_value = Some("0")),
        sqlite_column!("rating", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("num_plays", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("first_start_time", &SqlType::Integer),
        sqlite_column!("last_start_time", &SqlType::Integer),
        sqlite_column!("last_modified_time", &SqlType::Integer),
    ],
    indices: &[
        ("idx_songs_artist_lower", "artist_lower"),
        ("idx_songs_title_lower", "title_lower"),
        ("idx_songs_album_lower", "album_lower"),
        ("idx_songs_album_id", "album_id"),
        ("idx_songs_rating", "rating"),
        ("idx_songs_num_plays", "num_plays"),
        ("idx_songs_first_start_time", "first_start_time"),
        ("idx_songs_last_start_time", "last_start_time"),
    ],
    unique_constraints: &[&["sha1"]],
};

const SONG_KEYWORDS_TABLE_V1: Table = Table {
    name: "song_keywords",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_ID_FOREIGN_KEY)
        ),
        sqlite_column!("keyword", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_song_keywords_keyword", "keyword, song_id")],
    unique_constraints: &[&["song_id", "keyword"]],
};

const SONG_TAGS_TABLE_V1: Table = Table {
    name: "song_tags",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_ID_FOREIGN_KEY)
        ),
        sqlite_column!("tag", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_song_tags_tag", "tag, song_id")],
    unique_constraints: &[&["song_id", "tag"]],
};

/// Play history. A song's plays are deleted along with it.
const PLAYS_TABLE_V1: Table = Table {
    name: "plays",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_ID_FOREIGN_KEY)
        ),
        sqlite_column!("start_time", &SqlType::Integer, non_null = true),
        sqlite_column!("ip_address", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_plays_song_id", "song_id")],
    unique_constraints: &[&["song_id", "start_time", "ip_address"]],
};

pub const LIBRARY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        SONGS_TABLE_V1,
        SONG_KEYWORDS_TABLE_V1,
        SONG_TAGS_TABLE_V1,
        PLAYS_TABLE_V1,
    ],
    migration: None,
}];
