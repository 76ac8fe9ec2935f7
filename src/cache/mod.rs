//! Two-tier caching of query results, song records and the tag list.

mod durable;
mod memory;
mod query_cache;
mod record_cache;
mod tag_cache;
mod tier;

pub use durable::{SqliteCacheTier, CACHE_VERSIONED_SCHEMAS};
pub use memory::MemoryCacheTier;
pub use query_cache::{CachedQuery, MapUpdate, QueryCache, QueryMap, QUERY_MAP_KEY};
pub use record_cache::{song_cache_key, RecordCache};
pub use tag_cache::{TagCache, TAG_LIST_KEY};
pub use tier::{get_json, set_json, CacheError, CacheTier, CacheType};
