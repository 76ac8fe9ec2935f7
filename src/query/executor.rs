//! Concurrent execution of planned sub-queries against the library store.

use super::planner::SubQuery;
use super::search::QueryError;
use crate::library_store::{LibraryStore, SongId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type WorkerResult = (usize, anyhow::Result<Vec<SongId>>);

/// Runs every sub-query on its own blocking worker and returns their id
/// lists, sorted ascending, in the order of `sub_queries`.
///
/// All workers are waited for even after one fails. The first error to
/// arrive is returned and no results are.
pub async fn execute(
    store: Arc<dyn LibraryStore>,
    sub_queries: &[SubQuery],
) -> Result<Vec<Vec<SongId>>, QueryError> {
    let (tx, mut rx) = mpsc::channel::<WorkerResult>(sub_queries.len().max(1));

    let handles: Vec<_> = sub_queries
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, sub_query)| {
            let store = Arc::clone(&store);
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                let result = store.query_song_ids(&sub_query.filter).map(|mut ids| {
                    ids.sort_unstable();
                    ids
                });
                if let Ok(ids) = &result {
                    debug!(
                        "{:?} sub-query {} matched {} ids in {}ms",
                        sub_query.role,
                        index,
                        ids.len(),
                        start.elapsed().as_millis()
                    );
                }
                // The receiver outlives every worker.
                let _ = tx.blocking_send((index, result));
            })
        })
        .collect();
    drop(tx);

    let mut results: Vec<Option<Vec<SongId>>> = vec![None; sub_queries.len()];
    let mut first_err: Option<QueryError> = None;
    while let Some((index, result)) = rx.recv().await {
        match result {
            Ok(ids) => results[index] = Some(ids),
            Err(e) => {
                warn!("Sub-query {} failed: {:#}", index, e);
                first_err.get_or_insert(QueryError::Store(e));
            }
        }
    }

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Sub-query worker failed: {}", e);
            first_err.get_or_insert(QueryError::Worker(e));
        }
    }

    if let Some(e) = first_err {
        return Err(e);
    }
    results
        .into_iter()
        .map(|ids| ids.ok_or(QueryError::WorkerLost))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_store::{EqualityFilter, FilterQuery, Song, SqliteLibraryStore};
    use crate::query::planner::SubQueryRole;
    use tempfile::TempDir;

    fn store_with_songs() -> (TempDir, Arc<dyn LibraryStore>) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteLibraryStore::new(temp_dir.path().join("library.db"), 2).unwrap();
        for (i, tag) in ["rock", "jazz", "rock"].iter().enumerate() {
            let mut song = Song::default();
            song.update_from(
                &Song {
                    sha1: format!("sha-{}", i),
                    title: format!("Song {}", i),
                    ..Default::default()
                },
                false,
            );
            song.tags = vec![tag.to_string()];
            store.save_song(&song, None).unwrap();
        }
        (temp_dir, Arc::new(store))
    }

    fn tag_query(role: SubQueryRole, tag: &str) -> SubQuery {
        SubQuery {
            role,
            filter: FilterQuery::default().with_equality(EqualityFilter::Tag(tag.to_string())),
        }
    }

    #[tokio::test]
    async fn test_results_follow_sub_query_order() {
        let (_dir, store) = store_with_songs();
        let results = execute(
            store,
            &[
                tag_query(SubQueryRole::Positive, "rock"),
                tag_query(SubQueryRole::Negative, "jazz"),
                tag_query(SubQueryRole::Negative, "blues"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(results, vec![vec![1, 3], vec![2], vec![]]);
    }

    #[tokio::test]
    async fn test_no_sub_queries() {
        let (_dir, store) = store_with_songs();
        assert!(execute(store, &[]).await.unwrap().is_empty());
    }
}
