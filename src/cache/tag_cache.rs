//! Cached list of every tag in use.

use super::tier::{get_json, set_json, CacheError, CacheTier, CacheType};
use std::sync::Arc;
use tracing::{debug, warn};

pub const TAG_LIST_KEY: &str = "tags";

pub struct TagCache {
    tiers: Vec<Arc<dyn CacheTier>>,
}

impl TagCache {
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    pub fn disabled() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn is_enabled(&self) -> bool {
        !self.tiers.is_empty()
    }

    /// First cached tag list found, fastest tier first, along with the tiers
    /// that were checked and didn't have it. Errors count as misses.
    pub fn get(&self) -> (Option<Vec<String>>, Vec<CacheType>) {
        let mut missed = Vec::new();
        for tier in &self.tiers {
            match get_json::<Vec<String>>(tier.as_ref(), TAG_LIST_KEY) {
                Ok(Some(tags)) => {
                    debug!("Got {} cached tag(s) from {} tier", tags.len(), tier.kind());
                    return (Some(tags), missed);
                }
                Ok(None) => missed.push(tier.kind()),
                Err(e) => {
                    warn!("Failed to read tag list from {} tier: {}", tier.kind(), e);
                    missed.push(tier.kind());
                }
            }
        }
        (None, missed)
    }

    /// Writes the list to the given tiers, logging failures.
    pub fn set_in(&self, tags: &[String], kinds: &[CacheType]) {
        for tier in self.tiers.iter().filter(|t| kinds.contains(&t.kind())) {
            if let Err(e) = set_json(tier.as_ref(), TAG_LIST_KEY, tags, None) {
                warn!("Failed to store tag list in {} tier: {}", tier.kind(), e);
            }
        }
    }

    /// Writes the list to every tier.
    pub fn set(&self, tags: &[String]) {
        let kinds: Vec<CacheType> = self.tiers.iter().map(|t| t.kind()).collect();
        self.set_in(tags, &kinds);
    }

    pub fn flush(&self, only: Option<CacheType>) -> Result<(), CacheError> {
        let mut first_err = None;
        for tier in self.tiers.iter().filter(|t| only.map_or(true, |k| t.kind() == k)) {
            if let Err(e) = tier.delete(TAG_LIST_KEY) {
                warn!("Failed to flush tag list from {} tier: {}", tier.kind(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheTier, SqliteCacheTier};

    #[test]
    fn test_set_get_flush() {
        let fast = Arc::new(MemoryCacheTier::new(4));
        let durable = Arc::new(SqliteCacheTier::in_memory().unwrap());
        let cache = TagCache::new(vec![fast.clone() as Arc<dyn CacheTier>, durable.clone()]);
        assert_eq!(cache.get(), (None, vec![CacheType::Fast, CacheType::Durable]));

        let tags = vec!["jazz".to_string(), "rock".to_string()];
        cache.set(&tags);
        assert_eq!(cache.get(), (Some(tags.clone()), vec![]));

        cache.flush(Some(CacheType::Fast)).unwrap();
        assert_eq!(cache.get(), (Some(tags.clone()), vec![CacheType::Fast]));

        cache.set_in(&tags, &[CacheType::Fast]);
        assert!(fast.get(TAG_LIST_KEY).unwrap().is_some());

        cache.flush(None).unwrap();
        assert_eq!(cache.get().0, None);
    }
}
