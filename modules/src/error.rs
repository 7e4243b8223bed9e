//! Errors the built-in module table itself can raise before a JS exception
//! is thrown into the sandbox (spec §4.3's "actionable error" design note).

#[derive(Debug, thiserror::Error)]
pub enum BuiltinError {
    #[error("unknown built-in module '{0}'")]
    UnknownModule(String),

    #[error("filesystem not initialized: '{0}' was called before a VFS was attached")]
    FilesystemNotInitialized(&'static str),

    #[error("{0} is not supported in this sandbox; use the async/callback variant")]
    UnsupportedSync(&'static str),
}

pub type BuiltinResult<T> = Result<T, BuiltinError>;
