//! SSR Cache (spec §4.7, C7): a keyed LRU+TTL cache for rendered output,
//! with pattern invalidation and hit/miss statistics. Grounded on
//! `oxc_resolver`'s cache idiom (other_examples) and this workspace's own
//! `indexmap` usage in `xmas-js-modules`.

pub mod cache;
pub mod error;
pub mod hash;

pub use cache::{CacheEntry, CacheStats, InvalidationPattern, SsrCache, SsrCacheConfig};
pub use error::{SsrCacheError, SsrCacheResult};
pub use hash::{canonical_json, generate_key, simple_hash, to_base36};
