use std::sync::Arc;

use thiserror::Error;
use tiny_skia::Pixmap;

pub use dl_rendering::Rectangle;

/// Platform error type.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// No surface is registered under the identifier.
    #[error("unknown surface: {0}")]
    UnknownSurface(String),

    /// Surface rejected a resize or presentation.
    #[error("surface error: {0}")]
    Surface(String),

    /// Asset not found.
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Native drawing target a view presents into.
///
/// Implementations are moved onto the render thread, so they must be `Send`.
pub trait Surface: Send {
    /// Current backing size in device pixels.
    fn size(&self) -> (u32, u32);

    /// Resize the backing store. Called before the first frame at the new size.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), PlatformError>;

    /// Present a complete frame. `damage` lists the device-space regions that changed
    /// since the previous presentation.
    fn present(&mut self, frame: &Pixmap, damage: &[Rectangle]) -> Result<(), PlatformError>;
}

/// Resolves a canvas identifier into a surface.
pub trait SurfaceResolver: Send + Sync {
    fn resolve(&self, canvas_id: &str) -> Result<Box<dyn Surface>, PlatformError>;
}

/// Loads raw asset bytes by path.
pub trait AssetLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Vec<u8>, PlatformError>;
}

/// Decodes encoded image bytes into a premultiplied pixmap.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Pixmap, PlatformError>;
}

/// A parsed font face.
#[derive(Debug, Clone)]
pub struct DecodedFont {
    /// Family name of the first face in the data.
    pub family: String,
    /// Raw font data, shared with the text system.
    pub data: Arc<Vec<u8>>,
}

/// Parses font bytes.
pub trait FontDecoder: Send + Sync {
    fn decode(&self, bytes: Vec<u8>) -> Result<DecodedFont, PlatformError>;
}
