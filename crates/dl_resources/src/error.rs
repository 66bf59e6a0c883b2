use dl_platform::PlatformError;
use thiserror::Error;

/// Resource loading errors
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("empty resource path")]
    EmptyPath,
}
