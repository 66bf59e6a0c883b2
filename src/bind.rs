//! Script-facing dispatch for `TGFXBaseView` and `TGFXThreadsView`.
//!
//! Class, function and method names are matched exactly. Binding misuse (unknown name,
//! wrong arity, wrong argument type) is a [`BindError`]; view errors such as a rejected
//! size are logged and returned as `false`.

use std::collections::HashMap;
use std::time::Duration;

use dl_resources::FontSource;
use dl_view::{
    BaseView, DrawRequest, SynchronousView, ThreadedView, ViewEnvironment, ViewResult, make_from,
    make_sync_from,
};
use thiserror::Error;

pub const BASE_VIEW_CLASS: &str = "TGFXBaseView";
pub const THREADS_VIEW_CLASS: &str = "TGFXThreadsView";

/// Values crossing the script boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A typed array such as `Uint8Array`.
    Bytes(Vec<u8>),
    Array(Vec<ScriptValue>),
    /// A view handle returned by `MakeFrom`.
    Handle(u64),
}

impl ScriptValue {
    fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Bytes(_) => "Uint8Array",
            ScriptValue::Array(_) => "array",
            ScriptValue::Handle(_) => "object",
        }
    }
}

/// Binding misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("unknown class {0}")]
    UnknownClass(String),

    #[error("{class} has no method {method}")]
    UnknownMethod { class: String, method: String },

    #[error("{method} expects {expected} arguments, got {got}")]
    Arity {
        method: String,
        expected: &'static str,
        got: usize,
    },

    #[error("{method}: argument {index} must be {expected}, got {got}")]
    ArgumentType {
        method: String,
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("invalid view handle {0}")]
    InvalidHandle(u64),
}

type BindResult = Result<ScriptValue, BindError>;

enum BoundView {
    Base(SynchronousView),
    Threads(ThreadedView),
}

impl BoundView {
    fn class(&self) -> &'static str {
        match self {
            BoundView::Base(_) => BASE_VIEW_CLASS,
            BoundView::Threads(_) => THREADS_VIEW_CLASS,
        }
    }

    fn view(&mut self) -> &mut dyn BaseView {
        match self {
            BoundView::Base(view) => view,
            BoundView::Threads(view) => view,
        }
    }
}

struct Bound {
    view: BoundView,
    /// Canvas the view was made from; `updateSize(devicePixelRatio)` re-reads its size.
    canvas_id: String,
}

/// Handle table plus the services new views are created with.
pub struct Bindings {
    env: ViewEnvironment,
    views: HashMap<u64, Bound>,
    next_handle: u64,
}

impl Bindings {
    pub fn new(env: ViewEnvironment) -> Self {
        Self {
            env,
            views: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn environment(&self) -> &ViewEnvironment {
        &self.env
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Call a class function. Only `MakeFrom` exists.
    pub fn call_static(&mut self, class: &str, function: &str, args: &[ScriptValue]) -> BindResult {
        if class != BASE_VIEW_CLASS && class != THREADS_VIEW_CLASS {
            return Err(BindError::UnknownClass(class.to_string()));
        }
        if function != "MakeFrom" {
            return Err(BindError::UnknownMethod {
                class: class.to_string(),
                method: function.to_string(),
            });
        }
        expect_arity(function, args, "1", &[1])?;
        let canvas_id = string_arg(function, args, 0)?;

        let view = if class == THREADS_VIEW_CLASS {
            make_from(canvas_id, &self.env).map(BoundView::Threads)
        } else {
            make_sync_from(canvas_id, &self.env).map(BoundView::Base)
        };
        let Some(view) = view else {
            return Ok(ScriptValue::Null);
        };

        let handle = self.next_handle;
        self.next_handle += 1;
        self.views.insert(
            handle,
            Bound {
                view,
                canvas_id: canvas_id.to_string(),
            },
        );
        log::debug!("{class}.MakeFrom({canvas_id:?}) -> handle {handle}");
        Ok(ScriptValue::Handle(handle))
    }

    /// Call a method on a view handle.
    pub fn call(&mut self, handle: u64, method: &str, args: &[ScriptValue]) -> BindResult {
        let Bound {
            view: bound,
            canvas_id,
        } = self
            .views
            .get_mut(&handle)
            .ok_or(BindError::InvalidHandle(handle))?;

        match method {
            "setImagePath" => {
                expect_arity(method, args, "1 or 2", &[1, 2])?;
                let result = match args {
                    [_] => bound.view().set_image_path(string_arg(method, args, 0)?),
                    _ => {
                        let name = string_arg(method, args, 0)?;
                        let path = string_arg(method, args, 1)?;
                        bound.view().set_named_image(name, path)
                    }
                };
                Ok(report(method, result))
            }
            "updateSize" => {
                expect_arity(method, args, "1 to 3", &[1, 2, 3])?;
                let view = bound.view();
                let result = match args.len() {
                    // updateSize(devicePixelRatio): the page has already sized the canvas.
                    1 => {
                        let density = number_arg(method, args, 0)? as f32;
                        let (width, height) =
                            canvas_size(&self.env, canvas_id).unwrap_or_else(|| view.size());
                        view.update_size_with_density(width as i64, height as i64, density)
                    }
                    2 => view.update_size(
                        dimension(number_arg(method, args, 0)?),
                        dimension(number_arg(method, args, 1)?),
                    ),
                    _ => view.update_size_with_density(
                        dimension(number_arg(method, args, 0)?),
                        dimension(number_arg(method, args, 1)?),
                        number_arg(method, args, 2)? as f32,
                    ),
                };
                Ok(report(method, result))
            }
            "draw" => {
                expect_arity(method, args, "0 or 4", &[0, 4])?;
                let view = bound.view();
                let request = if args.is_empty() {
                    view.draw()
                } else {
                    let draw_index = number_arg(method, args, 0)?;
                    view.draw_viewport(
                        if draw_index.is_finite() && draw_index > 0.0 {
                            draw_index as u32
                        } else {
                            0
                        },
                        number_arg(method, args, 1)? as f32,
                        number_arg(method, args, 2)? as f32,
                        number_arg(method, args, 3)? as f32,
                    )
                };
                Ok(ScriptValue::Bool(request != DrawRequest::Rejected))
            }
            "setAllowBlur" => {
                expect_arity(method, args, "1", &[1])?;
                bound.view().set_allow_blur(bool_arg(method, args, 0)?);
                Ok(ScriptValue::Undefined)
            }
            "setShowDirtyRect" => {
                expect_arity(method, args, "1", &[1])?;
                bound.view().set_show_dirty_rect(bool_arg(method, args, 0)?);
                Ok(ScriptValue::Undefined)
            }
            "registerFonts" => {
                let BoundView::Threads(view) = bound else {
                    return Err(BindError::UnknownMethod {
                        class: bound.class().to_string(),
                        method: method.to_string(),
                    });
                };
                if args.is_empty() {
                    return Err(BindError::Arity {
                        method: method.to_string(),
                        expected: "at least 1",
                        got: 0,
                    });
                }
                let mut sources = Vec::new();
                for (index, arg) in args.iter().enumerate() {
                    collect_fonts(method, index, arg, &mut sources)?;
                }
                let report = view.register_fonts(sources);
                Ok(ScriptValue::Bool(!report.has_failures()))
            }
            _ => Err(BindError::UnknownMethod {
                class: bound.class().to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// Drop a view handle. Threaded views finish requested frames first.
    pub fn release(&mut self, handle: u64) -> bool {
        self.views.remove(&handle).is_some()
    }

    /// Wait for a threaded view to go idle. Synchronous views are always idle.
    pub fn wait_idle(&self, handle: u64, timeout: Duration) -> Result<bool, BindError> {
        match self.views.get(&handle) {
            Some(Bound {
                view: BoundView::Threads(view),
                ..
            }) => Ok(view.wait_idle_for(timeout)),
            Some(_) => Ok(true),
            None => Err(BindError::InvalidHandle(handle)),
        }
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("views", &self.views.len())
            .field("next_handle", &self.next_handle)
            .finish_non_exhaustive()
    }
}

/// Current backing size of a canvas, as last set by the page.
fn canvas_size(env: &ViewEnvironment, canvas_id: &str) -> Option<(u32, u32)> {
    env.resolver
        .resolve(canvas_id)
        .inspect_err(|err| log::warn!("cannot re-read canvas {canvas_id:?}: {err}"))
        .ok()
        .map(|surface| surface.size())
}

fn report(method: &str, result: ViewResult<()>) -> ScriptValue {
    match result {
        Ok(()) => ScriptValue::Bool(true),
        Err(err) => {
            log::warn!("{method} failed: {err}");
            ScriptValue::Bool(false)
        }
    }
}

/// Script numbers become sizes by truncation; NaN becomes 0 and is rejected later.
fn dimension(value: f64) -> i64 {
    value as i64
}

fn expect_arity(
    method: &str,
    args: &[ScriptValue],
    expected: &'static str,
    allowed: &[usize],
) -> Result<(), BindError> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(BindError::Arity {
            method: method.to_string(),
            expected,
            got: args.len(),
        })
    }
}

fn type_error(method: &str, index: usize, expected: &'static str, got: &ScriptValue) -> BindError {
    BindError::ArgumentType {
        method: method.to_string(),
        index,
        expected,
        got: got.type_name(),
    }
}

fn string_arg<'a>(method: &str, args: &'a [ScriptValue], index: usize) -> Result<&'a str, BindError> {
    match &args[index] {
        ScriptValue::String(value) => Ok(value),
        other => Err(type_error(method, index, "a string", other)),
    }
}

fn number_arg(method: &str, args: &[ScriptValue], index: usize) -> Result<f64, BindError> {
    match &args[index] {
        ScriptValue::Number(value) => Ok(*value),
        other => Err(type_error(method, index, "a number", other)),
    }
}

fn bool_arg(method: &str, args: &[ScriptValue], index: usize) -> Result<bool, BindError> {
    match &args[index] {
        ScriptValue::Bool(value) => Ok(*value),
        other => Err(type_error(method, index, "a boolean", other)),
    }
}

fn collect_fonts(
    method: &str,
    index: usize,
    arg: &ScriptValue,
    sources: &mut Vec<FontSource>,
) -> Result<(), BindError> {
    match arg {
        ScriptValue::Bytes(bytes) => sources.push(FontSource::Bytes(bytes.clone())),
        ScriptValue::String(path) => sources.push(FontSource::Path(path.clone())),
        ScriptValue::Array(items) => {
            for item in items {
                match item {
                    ScriptValue::Array(_) => {
                        return Err(type_error(method, index, "font bytes or a path", item));
                    }
                    _ => collect_fonts(method, index, item, sources)?,
                }
            }
        }
        other => return Err(type_error(method, index, "font bytes or a path", other)),
    }
    Ok(())
}
