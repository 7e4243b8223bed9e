//! Resolver error taxonomy (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),
    #[error("Invalid package.json at '{0}': {1}")]
    InvalidPackage(String, String),
    #[error("Unsupported module format '{0}'")]
    UnsupportedFormat(String),
}

pub type ResolverResult<T> = Result<T, ResolverError>;
