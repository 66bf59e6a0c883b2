use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use dl_platform::{EventHub, Surface};
use dl_resources::{FontReport, FontSource};
use dl_settings::RenderMode;
use tiny_skia::Pixmap;

use crate::environment::ViewEnvironment;
use crate::error::{ViewError, ViewResult};
use crate::render_core::{RenderCommand, RenderCore, SharedSnapshot};
use crate::render_thread;
use crate::scene::{DemoScenes, SceneBuilder};
use crate::scheduler::{DrawRequest, FrameScheduler, SchedulerState};
use crate::state::{ImageSlot, ViewState, Viewport};
use crate::view::{Configurable, Drawable, Resizable};

/// View that rasterizes on its own render thread.
///
/// The handle keeps a shadow copy of the view state for validation and getters; every
/// accepted change is posted to the render thread as a [`RenderCommand`]. `draw()` never
/// blocks. Dropping the handle finishes requested frames and joins the thread.
pub struct ThreadedView {
    state: ViewState,
    render_mode: RenderMode,
    commands: Sender<RenderCommand>,
    scheduler: Arc<FrameScheduler>,
    published: SharedSnapshot,
    env: ViewEnvironment,
    idle_timeout: Duration,
    thread: Option<JoinHandle<()>>,
}

impl ThreadedView {
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
        let render_mode = settings.render_mode;
        let idle_timeout = Duration::from_millis(settings.idle_timeout_ms);
        let thread_name = settings.render_thread_name.clone();

        let core = RenderCore::new(
            surface,
            state.clone(),
            settings,
            Arc::clone(&env.registry),
            env.events.clone(),
        )?
        .with_scene(scene);
        let published = core.published();

        let (commands, receiver) = unbounded();
        let scheduler = Arc::new(FrameScheduler::new());
        let thread = render_thread::spawn(thread_name, core, receiver, Arc::clone(&scheduler))
            .map_err(|err| ViewError::RenderFailure(format!("cannot spawn render thread: {err}")))?;
        log::debug!("threaded view created at {width}x{height}");

        Ok(Self {
            state,
            render_mode,
            commands,
            scheduler,
            published,
            env,
            idle_timeout,
            thread: Some(thread),
        })
    }

    /// Shadow state as last accepted on the calling thread.
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn events(&self) -> &EventHub {
        &self.env.events
    }

    pub fn environment(&self) -> &ViewEnvironment {
        &self.env
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Frames the render thread has started, follow-ups included.
    pub fn frames_started(&self) -> u64 {
        self.scheduler.frames_started()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) -> ViewResult<()> {
        self.post(RenderCommand::SetRenderMode(mode))?;
        self.render_mode = mode;
        Ok(())
    }

    /// `registerFonts(...)`: decode each entry, keep the good ones and report the rest.
    pub fn register_fonts(&mut self, sources: Vec<FontSource>) -> FontReport {
        let report = self.env.register_fonts(sources);
        if report.has_new_fonts()
            && let Err(err) = self.post(RenderCommand::FontsChanged)
        {
            log::warn!("fonts registered but not delivered: {err}");
        }
        report
    }

    /// Wait until no frame is requested or rendering, up to the configured idle timeout.
    pub fn wait_idle(&self) -> bool {
        self.wait_idle_for(self.idle_timeout)
    }

    pub fn wait_idle_for(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    fn post(&self, command: RenderCommand) -> ViewResult<()> {
        self.commands.send(command).map_err(|_| {
            self.scheduler.shut_down();
            ViewError::Disconnected
        })
    }

    fn post_or_log(&self, command: RenderCommand) {
        if let Err(err) = self.post(command) {
            log::warn!("view command dropped: {err}");
        }
    }

    fn set_image(&mut self, slot: ImageSlot, path: &str) -> ViewResult<()> {
        let image = self.env.load_image(path)?;
        self.post(RenderCommand::SetImage {
            slot: slot.clone(),
            image: Arc::clone(&image),
        })?;
        self.state.set_image(slot, image);
        Ok(())
    }
}

impl Drawable for ThreadedView {
    fn draw(&mut self) -> DrawRequest {
        match self.scheduler.request_frame() {
            DrawRequest::Scheduled => match self.commands.send(RenderCommand::Frame) {
                Ok(()) => DrawRequest::Scheduled,
                Err(_) => {
                    log::warn!("render thread is gone, draw rejected");
                    self.scheduler.shut_down();
                    DrawRequest::Rejected
                }
            },
            other => other,
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        if self.post(RenderCommand::SetViewport(viewport)).is_ok() {
            self.state.viewport = viewport;
        }
    }
}

impl Resizable for ThreadedView {
    fn update_size_with_density(
        &mut self,
        width: i64,
        height: i64,
        density: f32,
    ) -> ViewResult<()> {
        let (width, height) = ViewState::validate_size(width, height)?;
        let density = ViewState::sanitize_density(density);
        self.post(RenderCommand::SetSize {
            width,
            height,
            density,
        })?;
        self.state.width = width;
        self.state.height = height;
        self.state.density = density;
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.state.width, self.state.height)
    }

    fn density(&self) -> f32 {
        self.state.density
    }
}

impl Configurable for ThreadedView {
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
        self.post_or_log(RenderCommand::SetAllowBlur(allow));
        self.state.allow_blur = allow;
    }

    fn set_show_dirty_rect(&mut self, show: bool) {
        self.post_or_log(RenderCommand::SetShowDirtyRect(show));
        self.state.show_dirty_rect = show;
    }

    fn snapshot(&self) -> Option<Arc<Pixmap>> {
        self.published
            .read()
            .as_ref()
            .map(|snapshot| Arc::clone(&snapshot.frame))
    }

    fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        self.published.read().as_ref()?.hit_test(x, y)
    }
}

impl Drop for ThreadedView {
    fn drop(&mut self) {
        // Requested frames complete before the thread sees Shutdown.
        let _ = self.commands.send(RenderCommand::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("render thread panicked");
        }
    }
}

impl std::fmt::Debug for ThreadedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedView")
            .field("state", &self.state)
            .field("render_mode", &self.render_mode)
            .field("scheduler", &self.scheduler.state())
            .finish_non_exhaustive()
    }
}
