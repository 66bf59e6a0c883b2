use std::sync::Arc;

use dl_platform::Surface;
use dl_settings::RenderMode;
use tiny_skia::Pixmap;

use crate::environment::ViewEnvironment;
use crate::error::{ViewError, ViewResult};
use crate::render_core::{RenderCommand, RenderCore};
use crate::scene::{DemoScenes, SceneBuilder};
use crate::scheduler::DrawRequest;
use crate::state::{ImageSlot, ViewState, Viewport};

/// Frame requests.
pub trait Drawable {
    /// Request a frame. Never reports render failures; see the view's event hub.
    fn draw(&mut self) -> DrawRequest;

    fn set_viewport(&mut self, viewport: Viewport);

    /// The four-argument `draw(drawIndex, zoom, offsetX, offsetY)`.
    fn draw_viewport(
        &mut self,
        draw_index: u32,
        zoom: f32,
        offset_x: f32,
        offset_y: f32,
    ) -> DrawRequest {
        self.set_viewport(Viewport::new(draw_index, zoom, offset_x, offset_y));
        self.draw()
    }
}

/// Surface size changes.
pub trait Resizable {
    /// Resize keeping the current density.
    fn update_size(&mut self, width: i64, height: i64) -> ViewResult<()> {
        let density = self.density();
        self.update_size_with_density(width, height, density)
    }

    /// Rejected sizes leave the view unchanged.
    fn update_size_with_density(&mut self, width: i64, height: i64, density: f32)
    -> ViewResult<()>;

    /// Size in device pixels.
    fn size(&self) -> (u32, u32);

    fn density(&self) -> f32;
}

/// Content sources, flags and read-back.
pub trait Configurable {
    /// Replace the background image.
    fn set_image_path(&mut self, path: &str) -> ViewResult<()>;

    /// Fill a named image slot used by the scenes.
    fn set_named_image(&mut self, name: &str, path: &str) -> ViewResult<()>;

    fn set_allow_blur(&mut self, allow: bool);

    fn set_show_dirty_rect(&mut self, show: bool);

    /// Last composited content frame, without the dirty-rect overlay.
    fn snapshot(&self) -> Option<Arc<Pixmap>>;

    /// Topmost display item under a device-space point of the last frame.
    fn hit_test(&self, x: f32, y: f32) -> Option<usize>;
}

/// Everything `TGFXBaseView` exposes.
pub trait BaseView: Drawable + Resizable + Configurable {}

impl<T: Drawable + Resizable + Configurable> BaseView for T {}

/// View that renders on the calling thread inside `draw()`.
///
/// Deferred tile work is finished before `draw()` returns.
pub struct SynchronousView {
    core: RenderCore,
    env: ViewEnvironment,
}

impl SynchronousView {
    pub fn new(surface: Box<dyn Surface>, env: ViewEnvironment) -> ViewResult<Self> {
        Self::with_scene(surface, env, Box::new(DemoScenes))
    }

    pub fn with_scene(
        surface: Box<dyn Surface>,
        env: ViewEnvironment,
        scene: Box<dyn SceneBuilder>,
    ) -> ViewResult<Self> {
        let (width, height) = surface.size();
        let (width, height) = ViewState::validate_size(width as i64, height as i64)?;
        let settings = env.settings();
        let state = ViewState::new(width, height, &settings);
        let core = RenderCore::new(
            surface,
            state,
            settings,
            Arc::clone(&env.registry),
            env.events.clone(),
        )?
        .with_scene(scene);
        Ok(Self { core, env })
    }

    pub fn state(&self) -> &ViewState {
        self.core.state()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.core.render_mode()
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.apply(RenderCommand::SetRenderMode(mode));
    }

    pub fn environment(&self) -> &ViewEnvironment {
        &self.env
    }

    pub fn frame_number(&self) -> u64 {
        self.core.frame_number()
    }

    fn apply(&mut self, command: RenderCommand) {
        if let Err(err) = self.core.apply(command) {
            log::error!("view command failed: {err}");
        }
    }

    fn set_image(&mut self, slot: ImageSlot, path: &str) -> ViewResult<()> {
        let image = self.env.load_image(path)?;
        self.core.apply(RenderCommand::SetImage { slot, image })
    }
}

impl Drawable for SynchronousView {
    fn draw(&mut self) -> DrawRequest {
        let mut advance = true;
        while self.core.render_frame(advance) {
            advance = false;
        }
        DrawRequest::Scheduled
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.apply(RenderCommand::SetViewport(viewport));
    }
}

impl Resizable for SynchronousView {
    fn update_size_with_density(
        &mut self,
        width: i64,
        height: i64,
        density: f32,
    ) -> ViewResult<()> {
        let (width, height) = ViewState::validate_size(width, height)?;
        let density = ViewState::sanitize_density(density);
        self.core.apply(RenderCommand::SetSize {
            width,
            height,
            density,
        })
    }

    fn size(&self) -> (u32, u32) {
        (self.core.state().width, self.core.state().height)
    }

    fn density(&self) -> f32 {
        self.core.state().density
    }
}

impl Configurable for SynchronousView {
    fn set_image_path(&mut self, path: &str) -> ViewResult<()> {
        self.set_image(ImageSlot::Background, path)
    }

    fn set_named_image(&mut self, name: &str, path: &str) -> ViewResult<()> {
        if name.is_empty() {
            return Err(ViewError::ResourceLoadFailure {
                id: path.to_string(),
                reason: "empty image name".to_string(),
            });
        }
        self.set_image(ImageSlot::Named(name.to_string()), path)
    }

    fn set_allow_blur(&mut self, allow: bool) {
        self.apply(RenderCommand::SetAllowBlur(allow));
    }

    fn set_show_dirty_rect(&mut self, show: bool) {
        self.apply(RenderCommand::SetShowDirtyRect(show));
    }

    fn snapshot(&self) -> Option<Arc<Pixmap>> {
        self.core.snapshot().map(|snapshot| snapshot.frame)
    }

    fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        self.core.snapshot()?.hit_test(x, y)
    }
}

impl std::fmt::Debug for SynchronousView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronousView")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_platform::{CanvasRegistry, MemoryAssets, MemorySurface};

    fn view() -> (SynchronousView, dl_platform::SurfaceProbe) {
        let env = ViewEnvironment::new(
            Arc::new(CanvasRegistry::new()),
            Arc::new(MemoryAssets::new()),
        );
        let surface = MemorySurface::new(120, 80);
        let probe = surface.probe();
        (SynchronousView::new(Box::new(surface), env).unwrap(), probe)
    }

    #[test]
    fn draw_presents_immediately() {
        let (mut view, probe) = view();

        assert_eq!(view.draw(), DrawRequest::Scheduled);

        assert_eq!(probe.presented_count(), 1);
        assert!(view.snapshot().is_some());
    }

    #[test]
    fn rejected_size_keeps_state() {
        let (mut view, probe) = view();

        assert!(matches!(
            view.update_size(0, 0),
            Err(ViewError::InvalidDimension { .. })
        ));
        assert!(view.update_size(-3, 20).is_err());
        view.draw();

        assert_eq!(view.size(), (120, 80));
        assert_eq!(probe.frame_sizes(), vec![(120, 80)]);
    }

    #[test]
    fn missing_image_is_reported() {
        let (mut view, _) = view();

        let err = view.set_image_path("missing.png").unwrap_err();

        assert!(matches!(err, ViewError::ResourceLoadFailure { .. }));
        assert!(view.state().background.is_none());
    }

    #[test]
    fn tile_mode_finishes_inside_draw() {
        let (mut view, probe) = view();
        view.set_render_mode(RenderMode::Tile);

        view.draw_viewport(1, 2.0, -10.0, 0.0);

        assert_eq!(view.render_mode(), RenderMode::Tile);
        assert!(probe.presented_count() >= 1);
        assert_eq!(view.state().viewport.zoom, 2.0);
    }
}
