use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tiny_skia::Pixmap;

use crate::traits::{PlatformError, Rectangle, Surface, SurfaceResolver};

#[derive(Debug, Default)]
struct ProbeState {
    size: (u32, u32),
    presented: u64,
    last_frame: Option<Pixmap>,
    last_damage: Vec<Rectangle>,
    frame_sizes: Vec<(u32, u32)>,
}

/// Read side of a [`MemorySurface`].
///
/// Clones observe the same surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl SurfaceProbe {
    /// Number of frames presented so far.
    pub fn presented_count(&self) -> u64 {
        self.state.lock().presented
    }

    /// Copy of the most recently presented frame.
    pub fn last_frame(&self) -> Option<Pixmap> {
        self.state.lock().last_frame.clone()
    }

    /// Damage reported with the most recent presentation.
    pub fn last_damage(&self) -> Vec<Rectangle> {
        self.state.lock().last_damage.clone()
    }

    /// Size of every presented frame, in presentation order.
    pub fn frame_sizes(&self) -> Vec<(u32, u32)> {
        self.state.lock().frame_sizes.clone()
    }

    /// Current backing size.
    pub fn size(&self) -> (u32, u32) {
        self.state.lock().size
    }

    /// Resize the backing store from the host side, as a page does by setting
    /// `canvas.width` / `canvas.height`.
    pub fn set_size(&self, width: u32, height: u32) {
        self.state.lock().size = (width, height);
    }
}

/// Surface that keeps presented frames in memory.
#[derive(Debug)]
pub struct MemorySurface {
    probe: SurfaceProbe,
}

impl MemorySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_probe(SurfaceProbe::default(), width, height)
    }

    fn with_probe(probe: SurfaceProbe, width: u32, height: u32) -> Self {
        probe.state.lock().size = (width, height);
        Self { probe }
    }

    pub fn probe(&self) -> SurfaceProbe {
        self.probe.clone()
    }
}

impl Surface for MemorySurface {
    fn size(&self) -> (u32, u32) {
        self.probe.size()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), PlatformError> {
        self.probe.state.lock().size = (width, height);
        Ok(())
    }

    fn present(&mut self, frame: &Pixmap, damage: &[Rectangle]) -> Result<(), PlatformError> {
        let mut state = self.probe.state.lock();
        if (frame.width(), frame.height()) != state.size {
            return Err(PlatformError::Surface(format!(
                "frame is {}x{} but surface is {}x{}",
                frame.width(),
                frame.height(),
                state.size.0,
                state.size.1
            )));
        }
        state.presented += 1;
        state.frame_sizes.push((frame.width(), frame.height()));
        state.last_damage = damage.to_vec();
        match state.last_frame.as_mut() {
            Some(last) if last.width() == frame.width() && last.height() == frame.height() => {
                last.data_mut().copy_from_slice(frame.data());
            }
            _ => state.last_frame = Some(frame.clone()),
        }
        Ok(())
    }
}

/// In-memory canvas lookup.
///
/// Canvas ids may be written with a leading `#` as in a CSS selector.
#[derive(Debug, Default)]
pub struct CanvasRegistry {
    canvases: RwLock<HashMap<String, SurfaceProbe>>,
}

impl CanvasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canvas and return the probe shared by every surface resolved from it.
    pub fn add_canvas(&self, canvas_id: &str, width: u32, height: u32) -> SurfaceProbe {
        let probe = SurfaceProbe::default();
        probe.state.lock().size = (width, height);
        self.canvases
            .write()
            .insert(normalize_canvas_id(canvas_id).to_string(), probe.clone());
        probe
    }

    pub fn probe(&self, canvas_id: &str) -> Option<SurfaceProbe> {
        self.canvases
            .read()
            .get(normalize_canvas_id(canvas_id))
            .cloned()
    }

    pub fn remove_canvas(&self, canvas_id: &str) -> bool {
        self.canvases
            .write()
            .remove(normalize_canvas_id(canvas_id))
            .is_some()
    }
}

impl SurfaceResolver for CanvasRegistry {
    fn resolve(&self, canvas_id: &str) -> Result<Box<dyn Surface>, PlatformError> {
        let id = normalize_canvas_id(canvas_id);
        let probe = self
            .canvases
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PlatformError::UnknownSurface(canvas_id.to_string()))?;
        let (width, height) = probe.size();
        Ok(Box::new(MemorySurface::with_probe(probe, width, height)))
    }
}

/// Strip surrounding whitespace and one leading `#`.
pub fn normalize_canvas_id(canvas_id: &str) -> &str {
    let trimmed = canvas_id.trim();
    trimmed.strip_prefix('#').unwrap_or(trimmed)
}
