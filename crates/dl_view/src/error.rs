use thiserror::Error;

/// View error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// Empty or unresolvable surface identifier.
    #[error("invalid surface handle: {0}")]
    InvalidHandle(String),

    /// Width or height is not positive, or exceeds the surface limit.
    #[error("invalid dimension {width}x{height}")]
    InvalidDimension { width: i64, height: i64 },

    #[error("failed to load resource {id}: {reason}")]
    ResourceLoadFailure { id: String, reason: String },

    #[error("render failure: {0}")]
    RenderFailure(String),

    /// The render thread has exited.
    #[error("render thread is not running")]
    Disconnected,
}

pub type ViewResult<T> = Result<T, ViewError>;
