//! Threaded incremental display-list renderer.
//!
//! The crate root re-exports the view crates and adds [`bind`], the script-facing
//! `TGFXBaseView` / `TGFXThreadsView` dispatch.

pub mod bind;

pub use dl_platform as platform;
pub use dl_rendering as rendering;
pub use dl_resources as resources;
pub use dl_settings as settings;
pub use dl_view as view;

pub use bind::{BASE_VIEW_CLASS, BindError, Bindings, ScriptValue, THREADS_VIEW_CLASS};
pub use dl_settings::{ConfigManager, RenderMode, Settings};
pub use dl_view::{
    BaseView, Configurable, DrawRequest, Drawable, Resizable, SynchronousView, ThreadedView,
    ViewEnvironment, ViewError, ViewResult, make_from, make_sync_from,
};
