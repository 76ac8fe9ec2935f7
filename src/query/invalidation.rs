//! Removal of cached results made stale by library updates.

use super::descriptor::UpdateTypes;
use crate::cache::{CacheError, MapUpdate, QueryCache, TagCache};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct InvalidationTracker {
    query_cache: Arc<QueryCache>,
    tag_cache: Arc<TagCache>,
}

impl InvalidationTracker {
    pub fn new(query_cache: Arc<QueryCache>, tag_cache: Arc<TagCache>) -> Self {
        Self {
            query_cache,
            tag_cache,
        }
    }

    /// Drops every cached query whose results `updates` could have changed,
    /// and the cached tag list when tags or metadata changed.
    ///
    /// Each tier's query map is rewritten independently, and only if
    /// something was removed from it. Every tier is attempted; the first
    /// error is returned. Returns the number of entries removed.
    pub fn flush_for_update(&self, updates: UpdateTypes) -> Result<usize, CacheError> {
        let mut first_err = None;
        let mut flushed_total = 0;

        for tier in self.query_cache.tiers() {
            let mut flushed = 0;
            let result = QueryCache::update_map(tier.as_ref(), |map| {
                let before = map.len();
                map.retain(|_, cached| !cached.query.results_invalidated(updates));
                flushed = before - map.len();
                if flushed == 0 {
                    MapUpdate::Unmodified
                } else {
                    MapUpdate::Modified
                }
            });
            match result {
                Ok(MapUpdate::Modified) => {
                    debug!(
                        "Flushed {} cached query(s) from {} tier for {} update",
                        flushed,
                        tier.kind(),
                        updates
                    );
                    flushed_total += flushed;
                }
                Ok(MapUpdate::Unmodified) => {}
                Err(e) => {
                    warn!("Failed to flush cached queries from {} tier: {}", tier.kind(), e);
                    first_err.get_or_insert(e);
                }
            }
        }

        if updates.intersects(UpdateTypes::TAGS | UpdateTypes::METADATA) {
            debug!("Flushing cached tags for {} update", updates);
            if let Err(e) = self.tag_cache.flush(None) {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(flushed_total),
        }
    }
}
