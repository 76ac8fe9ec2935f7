//! SQLite-backed library store.
//!
//! Writes go through a single connection; reads are spread over a small pool of
//! read-only connections so concurrent sub-queries don't serialize on one lock.

use super::filter::{EqualityFilter, FilterQuery, RangeFilter};
use super::models::{Play, PlayOutcome, Song, SongId, SongUpdateOutcome};
use super::schema::{LIBRARY_VERSIONED_SCHEMAS, UNRATED};
use super::LibraryStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Max number of bound parameters per `IN (...)` lookup.
const ID_CHUNK_SIZE: usize = 500;

const SONG_COLUMNS: &str = "id, sha1, filename, artist, title, album, album_artist, album_id, \
     artist_lower, title_lower, album_lower, track, disc, length, rating, num_plays, \
     first_start_time, last_start_time, last_modified_time";

#[derive(Clone)]
pub struct SqliteLibraryStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn to_millis(t: Option<DateTime<Utc>>) -> Option<i64> {
    t.map(|t| t.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn rating_to_column(rating: Option<u8>) -> i64 {
    rating.map(i64::from).unwrap_or(UNRATED)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl SqliteLibraryStore {
    /// Opens (creating or migrating if needed) the library database at `db_path`.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of connections used for concurrent reads
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open library database")?;

        migrate_if_needed(&mut write_conn, LIBRARY_VERSIONED_SCHEMAS, "library")?;
        write_conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;

        let song_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))
            .unwrap_or(0);
        info!("Opened library database at {:?}: {} songs", db_path, song_count);

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(Self {
            read_pool,
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    // =========================================================================
    // Row helpers
    // =========================================================================

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
        let rating: i64 = row.get("rating")?;
        Ok(Song {
            id: row.get("id")?,
            sha1: row.get("sha1")?,
            filename: row.get("filename")?,
            artist: row.get("artist")?,
            title: row.get("title")?,
            album: row.get("album")?,
            album_artist: row.get("album_artist")?,
            album_id: row.get("album_id")?,
            artist_lower: row.get("artist_lower")?,
            title_lower: row.get("title_lower")?,
            album_lower: row.get("album_lower")?,
            track: row.get("track")?,
            disc: row.get("disc")?,
            length: row.get("length")?,
            rating: u8::try_from(rating).ok().filter(|r| *r > 0),
            num_plays: row.get("num_plays")?,
            first_start_time: from_millis(row.get("first_start_time")?),
            last_start_time: from_millis(row.get("last_start_time")?),
            last_modified_time: from_millis(row.get("last_modified_time")?),
            ..Default::default()
        })
    }

    /// Loads songs and their keyword/tag lists for one chunk of IDs.
    fn load_songs(conn: &Connection, ids: &[SongId]) -> Result<HashMap<SongId, Song>> {
        let mut songs = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let marks = placeholders(chunk.len());

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM songs WHERE id IN ({})",
                SONG_COLUMNS, marks
            ))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), Self::row_to_song)?
                .collect::<Result<Vec<_>, _>>()?;
            for song in rows {
                songs.insert(song.id, song);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT song_id, keyword FROM song_keywords WHERE song_id IN ({}) ORDER BY keyword",
                marks
            ))?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let id: SongId = row.get(0)?;
                if let Some(song) = songs.get_mut(&id) {
                    song.keywords.push(row.get(1)?);
                }
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT song_id, tag FROM song_tags WHERE song_id IN ({}) ORDER BY tag",
                marks
            ))?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let id: SongId = row.get(0)?;
                if let Some(song) = songs.get_mut(&id) {
                    song.tags.push(row.get(1)?);
                }
            }
        }
        Ok(songs)
    }

    fn load_song(conn: &Connection, id: SongId) -> Result<Option<Song>> {
        Ok(Self::load_songs(conn, &[id])?.remove(&id))
    }

    /// Writes every column of `song` to the row `id`. Returns false if no such row.
    fn write_song_row(conn: &Connection, id: SongId, song: &Song) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE songs SET sha1 = ?1, filename = ?2, artist = ?3, title = ?4, album = ?5,
                album_artist = ?6, album_id = ?7, artist_lower = ?8, title_lower = ?9,
                album_lower = ?10, track = ?11, disc = ?12, length = ?13, rating = ?14,
                num_plays = ?15, first_start_time = ?16, last_start_time = ?17,
                last_modified_time = ?18
             WHERE id = ?19",
            params![
                song.sha1,
                song.filename,
                song.artist,
                song.title,
                song.album,
                song.album_artist,
                song.album_id,
                song.artist_lower,
                song.title_lower,
                song.album_lower,
                song.track,
                song.disc,
                song.length,
                rating_to_column(song.rating),
                song.num_plays,
                to_millis(song.first_start_time),
                to_millis(song.last_start_time),
                to_millis(song.last_modified_time),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn insert_song_row(conn: &Connection, song: &Song) -> Result<SongId> {
        conn.execute(
            "INSERT INTO songs (sha1, filename, artist, title, album, album_artist, album_id,
                artist_lower, title_lower, album_lower, track, disc, length, rating,
                num_plays, first_start_time, last_start_time, last_modified_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                song.sha1,
                song.filename,
                song.artist,
                song.title,
                song.album,
                song.album_artist,
                song.album_id,
                song.artist_lower,
                song.title_lower,
                song.album_lower,
                song.track,
                song.disc,
                song.length,
                rating_to_column(song.rating),
                song.num_plays,
                to_millis(song.first_start_time),
                to_millis(song.last_start_time),
                to_millis(song.last_modified_time),
            ],
        )
        .with_context(|| format!("Failed to insert song with SHA1 {}", song.sha1))?;
        Ok(conn.last_insert_rowid())
    }

    /// Replaces the keyword and tag rows of song `id`.
    fn write_song_lists(conn: &Connection, id: SongId, song: &Song) -> Result<()> {
        conn.execute("DELETE FROM song_keywords WHERE song_id = ?1", params![id])?;
        conn.execute("DELETE FROM song_tags WHERE song_id = ?1", params![id])?;

        let mut stmt = conn
            .prepare_cached("INSERT OR IGNORE INTO song_keywords (song_id, keyword) VALUES (?1, ?2)")?;
        for keyword in &song.keywords {
            stmt.execute(params![id, keyword])?;
        }
        let mut stmt =
            conn.prepare_cached("INSERT OR IGNORE INTO song_tags (song_id, tag) VALUES (?1, ?2)")?;
        for tag in &song.tags {
            stmt.execute(params![id, tag])?;
        }
        Ok(())
    }

    fn replace_plays(conn: &Connection, id: SongId, plays: &[Play]) -> Result<()> {
        conn.execute("DELETE FROM plays WHERE song_id = ?1", params![id])?;
        let mut stmt = conn.prepare_cached(
            "INSERT OR IGNORE INTO plays (song_id, start_time, ip_address) VALUES (?1, ?2, ?3)",
        )?;
        for play in plays {
            stmt.execute(params![id, play.start_time.timestamp_millis(), play.ip_address])?;
        }
        Ok(())
    }

    // =========================================================================
    // Filter queries
    // =========================================================================

    fn build_filter_sql(query: &FilterQuery) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        for filter in &query.equality {
            match filter {
                EqualityFilter::ArtistLower(v) => {
                    clauses.push("s.artist_lower = ?".to_string());
                    values.push(Value::Text(v.clone()));
                }
                EqualityFilter::TitleLower(v) => {
                    clauses.push("s.title_lower = ?".to_string());
                    values.push(Value::Text(v.clone()));
                }
                EqualityFilter::AlbumLower(v) => {
                    clauses.push("s.album_lower = ?".to_string());
                    values.push(Value::Text(v.clone()));
                }
                EqualityFilter::AlbumId(v) => {
                    clauses.push("s.album_id = ?".to_string());
                    values.push(Value::Text(v.clone()));
                }
                EqualityFilter::Keyword(v) => {
                    clauses.push(
                        "EXISTS (SELECT 1 FROM song_keywords k WHERE k.song_id = s.id AND k.keyword = ?)"
                            .to_string(),
                    );
                    values.push(Value::Text(v.clone()));
                }
                EqualityFilter::Tag(v) => {
                    clauses.push(
                        "EXISTS (SELECT 1 FROM song_tags t WHERE t.song_id = s.id AND t.tag = ?)"
                            .to_string(),
                    );
                    values.push(Value::Text(v.clone()));
                }
                EqualityFilter::Track(n) => {
                    clauses.push("s.track = ?".to_string());
                    values.push(Value::Integer(*n));
                }
                EqualityFilter::Disc(n) => {
                    clauses.push("s.disc = ?".to_string());
                    values.push(Value::Integer(*n));
                }
                EqualityFilter::Unrated => {
                    clauses.push("s.rating = ?".to_string());
                    values.push(Value::Integer(UNRATED));
                }
            }
        }

        match &query.range {
            Some(RangeFilter::MinRating(r)) => {
                clauses.push("s.rating >= ?".to_string());
                values.push(Value::Integer(i64::from(*r)));
            }
            Some(RangeFilter::MaxPlays(n)) => {
                clauses.push("s.num_plays <= ?".to_string());
                values.push(Value::Integer(*n));
            }
            Some(RangeFilter::MaxDisc(n)) => {
                clauses.push("s.disc <= ?".to_string());
                values.push(Value::Integer(*n));
            }
            Some(RangeFilter::MinFirstStartTime(t)) => {
                clauses.push("s.first_start_time >= ?".to_string());
                values.push(Value::Integer(t.timestamp_millis()));
            }
            Some(RangeFilter::MaxLastStartTime(t)) => {
                clauses.push("(s.last_start_time IS NULL OR s.last_start_time <= ?)".to_string());
                values.push(Value::Integer(t.timestamp_millis()));
            }
            None => {}
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (
            format!("SELECT s.id FROM songs s{} ORDER BY s.id", where_clause),
            values,
        )
    }
}

impl LibraryStore for SqliteLibraryStore {
    fn query_song_ids(&self, query: &FilterQuery) -> Result<Vec<SongId>> {
        let (sql, values) = Self::build_filter_sql(query);
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, SongId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn get_song(&self, id: SongId) -> Result<Option<Song>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        Self::load_song(&conn, id)
    }

    fn get_songs(&self, ids: &[SongId]) -> Result<HashMap<SongId, Song>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        Self::load_songs(&conn, ids)
    }

    fn find_song_id_by_sha1(&self, sha1: &str) -> Result<Option<SongId>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        match conn.query_row("SELECT id FROM songs WHERE sha1 = ?1", params![sha1], |r| {
            r.get(0)
        }) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_song(&self, song: &Song, plays: Option<&[Play]>) -> Result<SongId> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;

        let id = if song.id == 0 {
            Self::insert_song_row(&tx, song)?
        } else {
            if !Self::write_song_row(&tx, song.id, song)? {
                bail!("Song {} not found", song.id);
            }
            song.id
        };
        Self::write_song_lists(&tx, id, song)?;
        if let Some(plays) = plays {
            Self::replace_plays(&tx, id, plays)?;
        }

        tx.commit()?;
        debug!("Saved song {} ({})", id, song.filename);
        Ok(id)
    }

    fn update_song(
        &self,
        id: SongId,
        update: &mut dyn FnMut(&mut Song) -> Result<bool>,
    ) -> Result<SongUpdateOutcome> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;

        let Some(mut song) = Self::load_song(&tx, id)? else {
            return Ok(SongUpdateOutcome::SongNotFound);
        };
        if !update(&mut song)? {
            return Ok(SongUpdateOutcome::Unchanged);
        }
        Self::write_song_row(&tx, id, &song)?;
        Self::write_song_lists(&tx, id, &song)?;

        tx.commit()?;
        Ok(SongUpdateOutcome::Updated)
    }

    fn delete_song(&self, id: SongId) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM songs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn get_plays(&self, id: SongId) -> Result<Vec<Play>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT start_time, ip_address FROM plays WHERE song_id = ?1
             ORDER BY start_time, ip_address",
        )?;
        let plays = stmt
            .query_map(params![id], |row| {
                let start_time: i64 = row.get(0)?;
                Ok((start_time, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(start_time, ip_address)| {
                DateTime::<Utc>::from_timestamp_millis(start_time).map(|t| Play::new(t, ip_address))
            })
            .collect();
        Ok(plays)
    }

    fn add_play(&self, id: SongId, play: &Play) -> Result<PlayOutcome> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;

        let Some(mut song) = Self::load_song(&tx, id)? else {
            return Ok(PlayOutcome::SongNotFound);
        };
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO plays (song_id, start_time, ip_address) VALUES (?1, ?2, ?3)",
            params![id, play.start_time.timestamp_millis(), play.ip_address],
        )?;
        if inserted == 0 {
            return Ok(PlayOutcome::Duplicate);
        }

        song.update_play_stats(play.start_time);
        tx.execute(
            "UPDATE songs SET num_plays = ?1, first_start_time = ?2, last_start_time = ?3
             WHERE id = ?4",
            params![
                song.num_plays,
                to_millis(song.first_start_time),
                to_millis(song.last_start_time),
                id
            ],
        )?;

        tx.commit()?;
        Ok(PlayOutcome::Added)
    }

    fn get_all_tags(&self) -> Result<Vec<String>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT DISTINCT tag FROM song_tags ORDER BY tag")?;
        let tags = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    fn list_song_ids(&self) -> Result<Vec<SongId>> {
        self.query_song_ids(&FilterQuery::default())
    }

    fn count_songs(&self) -> Result<usize> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}
