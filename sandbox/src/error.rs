//! Sandbox error taxonomy (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox has not been initialized")]
    NotInitialized,

    #[error("sandbox memory limit exceeded")]
    MemoryLimit,

    #[error("sandbox stack limit exceeded")]
    StackLimit,

    #[error("evaluation timed out after {0}ms")]
    Timeout(u64),

    #[error("evaluation failed: {0}")]
    EvalFailure(String),

    #[error("quickjs engine error: {0}")]
    Engine(#[from] rsquickjs::Error),
}

pub type SandboxResult<T> = Result<T, SandboxError>;
