//! Renderer error taxonomy (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("no renderable component found in '{0}'")]
    ComponentNotFound(String),
    #[error("could not confidently detect a framework for '{0}'")]
    FrameworkMisdetected(String),
    #[error("render failed: {0}")]
    RenderFailure(String),
}

pub type RendererResult<T> = Result<T, RendererError>;
