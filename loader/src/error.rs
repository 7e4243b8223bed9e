//! Loader error taxonomy (spec §7). `CyclicEvaluation` is informational
//! only: cycles are tolerated by construction (cache-before-eval) and never
//! actually raised as an error; it exists here so callers can log the
//! condition if they choose to detect it themselves.

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("cyclic evaluation detected for '{0}' (informational; not fatal)")]
    CyclicEvaluation(String),

    #[error("compilation failed for '{0}': {1}")]
    CompilationFailure(String, String),

    #[error("cannot require() an external module '{0}'; use async import instead")]
    RequireOfExternal(String),

    #[error("cannot find module '{0}'")]
    ModuleNotFound(String),

    #[error("native modules unsupported: '{0}'")]
    NativeModuleUnsupported(String),

    #[error("quickjs engine error: {0}")]
    Engine(#[from] rsquickjs::Error),

    #[error(transparent)]
    Resolver(#[from] xmas_resolver::ResolverError),
}

pub type LoaderResult<T> = Result<T, LoaderError>;
