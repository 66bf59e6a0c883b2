use std::sync::Arc;

use dl_platform::{EventHub, Rectangle, Surface, ViewEvent};
use dl_rendering::{Color, DisplayList, Point, diff_bounds};
use dl_resources::{ImageResource, ResourceRegistry};
use dl_settings::{RenderMode, Settings};
use parking_lot::RwLock;
use tiny_skia::{Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::compositor::{CompositeOutcome, Compositor, FrameInput, Invalidation};
use crate::error::{ViewError, ViewResult};
use crate::raster::skia_color;
use crate::scene::{DemoScenes, SceneBuilder, SceneContext};
use crate::state::{ImageSlot, ImageTable, ViewState, Viewport};
use crate::text::TextRenderer;

/// State changes posted from the calling thread to the render thread.
///
/// Commands are applied between frames, in posting order.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    /// Width, height and density travel together so no frame sees half a resize.
    SetSize {
        width: u32,
        height: u32,
        density: f32,
    },
    SetImage {
        slot: ImageSlot,
        image: Arc<ImageResource>,
    },
    SetAllowBlur(bool),
    SetShowDirtyRect(bool),
    SetViewport(Viewport),
    SetRenderMode(RenderMode),
    /// New fonts are available in the registry.
    FontsChanged,
    Frame,
    Shutdown,
}

/// The last composited content frame, without the dirty-rect overlay.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame: Arc<Pixmap>,
    pub list: Arc<DisplayList>,
    pub scale: f32,
    pub offset: (i32, i32),
    pub frame_number: u64,
}

impl FrameSnapshot {
    /// Index of the topmost display item under a device-space point.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        if self.scale <= 0.0 {
            return None;
        }
        let point = Point::new(
            (x - self.offset.0 as f32) / self.scale,
            (y - self.offset.1 as f32) / self.scale,
        );
        self.list.hit_test(point)
    }
}

/// Snapshot slot written by the render side and read by the view handle.
pub type SharedSnapshot = Arc<RwLock<Option<FrameSnapshot>>>;

/// Everything needed to turn view state into presented frames.
///
/// Used directly by the synchronous view and owned by the render thread in the
/// threaded one.
pub struct RenderCore {
    state: ViewState,
    settings: Settings,
    surface: Box<dyn Surface>,
    frame: Pixmap,
    overlay: Option<Pixmap>,
    /// Overlay outlines of the last presentation, cleared on the next one.
    overlay_rects: Vec<Rectangle>,
    list: Arc<DisplayList>,
    scene: Box<dyn SceneBuilder>,
    compositor: Compositor,
    text: TextRenderer,
    registry: Arc<ResourceRegistry>,
    fonts_seen: usize,
    images: ImageTable,
    pending: Invalidation,
    last_scale: f32,
    last_offset: (i32, i32),
    tick: u64,
    frame_number: u64,
    events: EventHub,
    published: SharedSnapshot,
}

impl RenderCore {
    pub fn new(
        surface: Box<dyn Surface>,
        state: ViewState,
        settings: Settings,
        registry: Arc<ResourceRegistry>,
        events: EventHub,
    ) -> ViewResult<Self> {
        let (width, height) = (state.width, state.height);
        let frame = Pixmap::new(width, height).ok_or(ViewError::InvalidDimension {
            width: width as i64,
            height: height as i64,
        })?;
        let compositor = Compositor::new(&settings, width, height);

        let mut core = Self {
            images: state.image_table(),
            last_scale: state.scale(),
            last_offset: state.device_offset(),
            state,
            settings,
            surface,
            frame,
            overlay: None,
            overlay_rects: Vec::new(),
            list: Arc::new(DisplayList::new()),
            scene: Box::new(DemoScenes),
            compositor,
            text: TextRenderer::new(),
            registry,
            fonts_seen: 0,
            pending: Invalidation::everything(),
            tick: 0,
            frame_number: 0,
            events,
            published: Arc::new(RwLock::new(None)),
        };
        core.sync_fonts();
        Ok(core)
    }

    /// Replace the demo scenes.
    pub fn with_scene(mut self, scene: Box<dyn SceneBuilder>) -> Self {
        self.scene = scene;
        self.pending.full = true;
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn render_mode(&self) -> RenderMode {
        self.compositor.mode()
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn published(&self) -> SharedSnapshot {
        Arc::clone(&self.published)
    }

    pub fn snapshot(&self) -> Option<FrameSnapshot> {
        self.published.read().clone()
    }

    /// Apply one state command. `Frame` and `Shutdown` are handled by the caller.
    pub fn apply(&mut self, command: RenderCommand) -> ViewResult<()> {
        match command {
            RenderCommand::SetSize {
                width,
                height,
                density,
            } => {
                let frame = Pixmap::new(width, height).ok_or(ViewError::InvalidDimension {
                    width: width as i64,
                    height: height as i64,
                })?;
                self.surface
                    .resize(width, height)
                    .map_err(|err| ViewError::RenderFailure(err.to_string()))?;
                log::debug!("resized to {width}x{height} @{density}");
                self.frame = frame;
                self.overlay = None;
                self.overlay_rects.clear();
                self.state.width = width;
                self.state.height = height;
                self.state.density = density;
                self.compositor.resize(width, height);
                self.pending.full = true;
            }
            RenderCommand::SetImage { slot, image } => {
                self.state.set_image(slot, image);
                self.images = self.state.image_table();
                self.pending.full = true;
            }
            RenderCommand::SetAllowBlur(allow) => {
                if self.state.allow_blur != allow {
                    self.state.allow_blur = allow;
                    self.pending.full = true;
                }
            }
            RenderCommand::SetShowDirtyRect(show) => self.state.show_dirty_rect = show,
            RenderCommand::SetViewport(viewport) => self.state.viewport = viewport,
            RenderCommand::SetRenderMode(mode) => self.compositor.set_mode(mode),
            RenderCommand::FontsChanged => self.sync_fonts(),
            RenderCommand::Frame | RenderCommand::Shutdown => {}
        }
        Ok(())
    }

    fn sync_fonts(&mut self) {
        let fresh = self.registry.fonts_since(self.fonts_seen);
        if fresh.is_empty() {
            return;
        }
        self.text.load_fonts(&fresh);
        self.fonts_seen += fresh.len();
        self.pending.full = true;
    }

    /// Build, composite and present one frame.
    ///
    /// `advance` moves animated scenes forward; continuation frames pass false so
    /// deferred tiles converge on a fixed scene. Returns true when the compositor
    /// deferred work to another frame. Failures are reported through the event hub.
    pub fn render_frame(&mut self, advance: bool) -> bool {
        if advance {
            self.tick += 1;
        }
        self.frame_number += 1;
        // Registries can be shared between views, so pick up fonts added elsewhere too.
        self.sync_fonts();

        match self.try_render() {
            Ok(outcome) => {
                log::trace!(
                    "frame {} presented, {} damage rects",
                    self.frame_number,
                    outcome.damage.len()
                );
                self.events.emit(ViewEvent::FramePresented {
                    frame: self.frame_number,
                    damage: outcome.damage,
                    complete: outcome.complete,
                });
                !outcome.complete
            }
            Err(err) => {
                log::error!("frame {} failed: {err}", self.frame_number);
                self.events.emit(ViewEvent::RenderFailed {
                    frame: self.frame_number,
                    message: err.to_string(),
                });
                self.pending.full = true;
                false
            }
        }
    }

    fn try_render(&mut self) -> ViewResult<CompositeOutcome> {
        let list = self.scene.build(&SceneContext {
            state: &self.state,
            tick: self.tick,
            background: self.compositor.background(),
            blur_radius: self.settings.blur_radius,
        });

        let mut invalidation = std::mem::take(&mut self.pending);
        invalidation.content.extend(diff_bounds(&self.list, &list));
        let scale = self.state.scale();
        let offset = self.state.device_offset();
        invalidation.scale |= scale != self.last_scale;
        invalidation.viewport |= offset != self.last_offset;
        self.last_scale = scale;
        self.last_offset = offset;
        self.compositor.invalidate(&invalidation, &list, scale, offset);

        let list = Arc::new(list);
        let outcome = self
            .compositor
            .composite(
                &mut self.frame,
                FrameInput {
                    list: &list,
                    images: &self.images,
                    text: &mut self.text,
                    allow_blur: self.state.allow_blur,
                    scale,
                    offset,
                },
            )
            .map_err(|err| ViewError::RenderFailure(err.to_string()))?;
        self.list = list;
        self.publish(scale, offset);

        let mut present_damage = outcome.damage.clone();
        present_damage.append(&mut self.overlay_rects);
        if self.state.show_dirty_rect {
            self.overlay_rects = self.draw_overlay(&outcome.damage)?;
            present_damage.extend(self.overlay_rects.iter().copied());
        }

        let presented = match (&self.overlay, self.state.show_dirty_rect) {
            (Some(overlay), true) => overlay,
            _ => &self.frame,
        };
        self.surface
            .present(presented, &present_damage)
            .map_err(|err| ViewError::RenderFailure(err.to_string()))?;
        Ok(outcome)
    }

    fn publish(&self, scale: f32, offset: (i32, i32)) {
        *self.published.write() = Some(FrameSnapshot {
            frame: Arc::new(self.frame.clone()),
            list: Arc::clone(&self.list),
            scale,
            offset,
            frame_number: self.frame_number,
        });
    }

    /// Copy the content frame and outline `damage` on the copy.
    fn draw_overlay(&mut self, damage: &[Rectangle]) -> ViewResult<Vec<Rectangle>> {
        let (width, height) = (self.frame.width(), self.frame.height());
        let reusable = self
            .overlay
            .as_ref()
            .is_some_and(|overlay| overlay.width() == width && overlay.height() == height);
        if !reusable {
            self.overlay = Some(Pixmap::new(width, height).ok_or_else(|| {
                ViewError::RenderFailure(format!("cannot allocate {width}x{height} overlay"))
            })?);
        }
        let Some(overlay) = self.overlay.as_mut() else {
            return Ok(Vec::new());
        };
        overlay.data_mut().copy_from_slice(self.frame.data());

        let (r, g, b) = self.settings.dirty_rect_color;
        let mut paint = Paint::default();
        paint.set_color(skia_color(Color::from_rgb8(r, g, b)));
        let line = self.settings.dirty_rect_width.max(1.0);
        let stroke = Stroke {
            width: line,
            ..Stroke::default()
        };

        let bounds = Rectangle::new(0.0, 0.0, width as f32, height as f32);
        let mut outlined = Vec::with_capacity(damage.len());
        for rect in damage {
            let inset = line / 2.0;
            let Some(path) = Rect::from_xywh(
                rect.x + inset,
                rect.y + inset,
                (rect.width - line).max(0.0),
                (rect.height - line).max(0.0),
            )
            .map(PathBuilder::from_rect) else {
                continue;
            };
            overlay.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            if let Some(touched) = rect.expand(1.0).round_out().intersection(&bounds) {
                outlined.push(touched);
            }
        }
        Ok(outlined)
    }
}

impl std::fmt::Debug for RenderCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCore")
            .field("state", &self.state)
            .field("mode", &self.compositor.mode())
            .field("frame_number", &self.frame_number)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_platform::{MemorySurface, SurfaceProbe};
    use dl_rendering::{DisplayListBuilder, DrawStyle};

    /// A small square that steps right on every tick.
    struct SteppingSquare;

    impl SceneBuilder for SteppingSquare {
        fn build(&mut self, ctx: &SceneContext<'_>) -> DisplayList {
            let (w, h) = ctx.size();
            DisplayListBuilder::new()
                .rectangle(Rectangle::new(0.0, 0.0, w, h), DrawStyle::fill(ctx.background))
                .rectangle(
                    Rectangle::new(4.0 + ctx.tick as f32 * 4.0, 4.0, 8.0, 8.0),
                    DrawStyle::fill(Color::BLACK),
                )
                .build()
        }
    }

    fn core(mode: RenderMode) -> (RenderCore, SurfaceProbe) {
        let surface = MemorySurface::new(100, 100);
        let probe = surface.probe();
        let settings = Settings {
            render_mode: mode,
            ..Settings::default()
        };
        let state = ViewState::new(100, 100, &settings);
        let core = RenderCore::new(
            Box::new(surface),
            state,
            settings,
            Arc::new(ResourceRegistry::new()),
            EventHub::new(),
        )
        .unwrap()
        .with_scene(Box::new(SteppingSquare));
        (core, probe)
    }

    const SENTINEL: [u8; 4] = [1, 2, 3, 255];

    fn poke(core: &mut RenderCore, x: u32, y: u32) {
        let index = ((y * core.frame.width() + x) * 4) as usize;
        core.frame.data_mut()[index..index + 4].copy_from_slice(&SENTINEL);
    }

    fn peek(core: &RenderCore, x: u32, y: u32) -> [u8; 4] {
        let index = ((y * core.frame.width() + x) * 4) as usize;
        let mut px = [0; 4];
        px.copy_from_slice(&core.frame.data()[index..index + 4]);
        px
    }

    #[test]
    fn partial_render_leaves_clean_pixels() {
        let (mut core, probe) = core(RenderMode::Partial);
        core.render_frame(false);
        poke(&mut core, 90, 90);

        core.render_frame(true);

        assert_eq!(peek(&core, 90, 90), SENTINEL);
        assert_eq!(probe.presented_count(), 2);
        assert!(
            probe
                .last_damage()
                .iter()
                .all(|rect| rect.right() <= 20.0 && rect.bottom() <= 20.0)
        );
    }

    #[test]
    fn direct_render_repaints_everything() {
        let (mut core, _) = core(RenderMode::Direct);
        core.render_frame(false);
        poke(&mut core, 90, 90);

        core.render_frame(true);

        assert_ne!(peek(&core, 90, 90), SENTINEL);
    }

    #[test]
    fn overlay_only_touches_presented_frame() {
        let (mut core, probe) = core(RenderMode::Partial);
        core.render_frame(false);
        let clean = core.snapshot().unwrap();

        core.apply(RenderCommand::SetShowDirtyRect(true)).unwrap();
        core.apply(RenderCommand::SetAllowBlur(false)).unwrap();
        core.render_frame(false);
        let snapshot = core.snapshot().unwrap();

        assert_eq!(snapshot.frame.data(), clean.frame.data());
        assert_ne!(probe.last_frame().unwrap().data(), snapshot.frame.data());
        assert_eq!(snapshot.hit_test(8.0, 8.0), clean.hit_test(8.0, 8.0));
        assert_eq!(snapshot.hit_test(8.0, 8.0), Some(1));
    }

    #[test]
    fn resize_rebuilds_frame() {
        let (mut core, probe) = core(RenderMode::Tile);
        core.apply(RenderCommand::SetSize {
            width: 40,
            height: 30,
            density: 2.0,
        })
        .unwrap();

        while core.render_frame(false) {}

        assert_eq!(probe.size(), (40, 30));
        assert_eq!(probe.frame_sizes().last(), Some(&(40, 30)));
        assert_eq!(core.state().logical_size(), (20.0, 15.0));
    }
}
