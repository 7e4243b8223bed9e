//! SSR cache error taxonomy (spec §7, §9 Open Questions).

#[derive(Debug, thiserror::Error)]
pub enum SsrCacheError {
    #[error("invalid invalidation pattern '{0}': {1}")]
    InvalidPattern(String, String),
}

pub type SsrCacheResult<T> = Result<T, SsrCacheError>;
