//! Orchestrator error taxonomy (spec §7). The façade itself never
//! propagates these from `render`/`render_page` — they only surface from
//! `init`, which may fail once and leave SSR disabled.

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("sandbox initialization failed: {0}")]
    SandboxInit(#[from] xmas_sandbox::SandboxError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
