//! Picking and ordering the songs returned to the caller.

use super::descriptor::SortOrder;
use crate::library_store::{Song, SongId};
use rand::Rng;
use std::collections::HashMap;

/// Largest random offset applied to a song's position by [`spread_songs`],
/// as a fraction of the spacing between songs of the same group.
const SHUFFLE_SKEW: f64 = 0.25;

/// Moves a uniform random sample of `n` elements of `ids` into `ids[..n]`.
/// A partial Fisher-Yates shuffle; the rest of the slice is left in an
/// arbitrary order.
pub fn shuffle_partial<R: Rng + ?Sized>(ids: &mut [SongId], n: usize, rng: &mut R) {
    let n = n.min(ids.len());
    for i in 0..n {
        let j = rng.random_range(i..ids.len());
        ids.swap(i, j);
    }
}

/// Truncates `ids` to at most `max_results` entries, sampling them at random
/// when `shuffle` is set.
pub fn select_ids<R: Rng + ?Sized>(
    mut ids: Vec<SongId>,
    max_results: usize,
    shuffle: bool,
    rng: &mut R,
) -> Vec<SongId> {
    let count = ids.len().min(max_results);
    if shuffle {
        shuffle_partial(&mut ids, count, rng);
    }
    ids.truncate(count);
    ids
}

pub fn sort_songs(songs: &mut [Song], order: SortOrder) {
    match order {
        SortOrder::Album => songs.sort_by(|a, b| {
            a.album_lower
                .cmp(&b.album_lower)
                .then_with(|| a.album_id.cmp(&b.album_id))
                .then_with(|| a.disc.cmp(&b.disc))
                .then_with(|| a.track.cmp(&b.track))
        }),
        // None sorts before Some, so unplayed songs come first.
        SortOrder::LastPlayed => songs.sort_by(|a, b| {
            a.last_start_time
                .cmp(&b.last_start_time)
                .then_with(|| a.id.cmp(&b.id))
        }),
    }
}

/// Key used to keep songs by one artist apart. Songs on a compilation by
/// an album artist are grouped with that artist.
fn artist_key(song: &Song) -> String {
    if song.album_artist.trim().is_empty() {
        song.artist_lower.clone()
    } else {
        song.album_artist.trim().to_lowercase()
    }
}

fn spread_by<R, F>(songs: &mut Vec<Song>, key: F, inner: Option<fn(&Song) -> String>, rng: &mut R)
where
    R: Rng + ?Sized,
    F: Fn(&Song) -> String,
{
    let mut groups: HashMap<String, Vec<Song>> = HashMap::new();
    for song in songs.drain(..) {
        groups.entry(key(&song)).or_default().push(song);
    }

    let mut placed: Vec<(f64, Song)> = Vec::new();
    for (_, mut group) in groups {
        if let Some(inner) = inner {
            spread_by(&mut group, inner, None, &mut *rng);
        }
        let len = group.len() as f64;
        let offset = (1.0 - SHUFFLE_SKEW) * rng.random::<f64>();
        for (i, song) in group.into_iter().enumerate() {
            let pos = (offset + i as f64 + SHUFFLE_SKEW * rng.random::<f64>()) / len;
            placed.push((pos, song));
        }
    }
    placed.sort_by(|a, b| a.0.total_cmp(&b.0));
    songs.extend(placed.into_iter().map(|(_, song)| song));
}

fn album_key(song: &Song) -> String {
    song.album_lower.clone()
}

/// Reorders already-shuffled songs so that songs by the same artist, and
/// songs from the same album by one artist, are spread across the list.
pub fn spread_songs<R: Rng + ?Sized>(songs: &mut Vec<Song>, rng: &mut R) {
    spread_by(songs, artist_key, Some(album_key as fn(&Song) -> String), rng);
}
