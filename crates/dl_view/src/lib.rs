//! Display-list views: state, scheduling, compositing and the render thread.

pub mod blur;
pub mod compositor;
pub mod environment;
pub mod error;
pub mod factory;
pub mod raster;
pub mod render_core;
pub mod render_thread;
pub mod scene;
pub mod scheduler;
pub mod state;
pub mod text;
pub mod threaded;
pub mod view;

pub use compositor::{CompositeOutcome, Compositor, Invalidation};
pub use environment::ViewEnvironment;
pub use error::{ViewError, ViewResult};
pub use factory::{make_from, make_sync_from, try_make_from, try_make_sync_from};
pub use render_core::{FrameSnapshot, RenderCommand, RenderCore};
pub use scene::{DemoScenes, SceneBuilder, SceneContext, scene_name};
pub use scheduler::{DrawRequest, FrameScheduler, NextFrame, SchedulerState};
pub use state::{ImageSlot, MAX_DIMENSION, ViewState, Viewport};
pub use threaded::ThreadedView;
pub use view::{BaseView, Configurable, Drawable, Resizable, SynchronousView};
