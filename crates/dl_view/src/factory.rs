//! `MakeFrom`: views from canvas identifiers.

use dl_platform::{Surface, normalize_canvas_id};

use crate::environment::ViewEnvironment;
use crate::error::{ViewError, ViewResult};
use crate::state::ViewState;
use crate::threaded::ThreadedView;
use crate::view::SynchronousView;

fn acquire_surface(canvas_id: &str, env: &ViewEnvironment) -> ViewResult<Box<dyn Surface>> {
    let id = normalize_canvas_id(canvas_id);
    if id.is_empty() {
        return Err(ViewError::InvalidHandle("empty canvas id".to_string()));
    }
    let surface = env
        .resolver
        .resolve(id)
        .map_err(|err| ViewError::InvalidHandle(format!("{id}: {err}")))?;
    let (width, height) = surface.size();
    ViewState::validate_size(width as i64, height as i64)?;
    Ok(surface)
}

/// Threaded view for `canvas_id`.
pub fn try_make_from(canvas_id: &str, env: &ViewEnvironment) -> ViewResult<ThreadedView> {
    ThreadedView::new(acquire_surface(canvas_id, env)?, env.clone())
}

/// Like [`try_make_from`], with errors logged and mapped to `None` (a null handle).
pub fn make_from(canvas_id: &str, env: &ViewEnvironment) -> Option<ThreadedView> {
    try_make_from(canvas_id, env)
        .inspect_err(|err| log::warn!("MakeFrom({canvas_id:?}) failed: {err}"))
        .ok()
}

/// Synchronous view for `canvas_id`.
pub fn try_make_sync_from(canvas_id: &str, env: &ViewEnvironment) -> ViewResult<SynchronousView> {
    SynchronousView::new(acquire_surface(canvas_id, env)?, env.clone())
}

pub fn make_sync_from(canvas_id: &str, env: &ViewEnvironment) -> Option<SynchronousView> {
    try_make_sync_from(canvas_id, env)
        .inspect_err(|err| log::warn!("MakeFrom({canvas_id:?}) failed: {err}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use dl_platform::{CanvasRegistry, MemoryAssets};

    fn env(canvases: CanvasRegistry) -> ViewEnvironment {
        ViewEnvironment::new(Arc::new(canvases), Arc::new(MemoryAssets::new()))
    }

    #[test]
    fn empty_ids_give_null() {
        let env = env(CanvasRegistry::new());
        for id in ["", "   ", "#", " # "] {
            assert!(matches!(
                try_make_from(id, &env),
                Err(ViewError::InvalidHandle(_))
            ));
            assert!(make_sync_from(id, &env).is_none());
        }
    }

    #[test]
    fn unknown_id_gives_null() {
        let env = env(CanvasRegistry::new());
        assert!(make_from("#nowhere", &env).is_none());
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        let canvases = CanvasRegistry::new();
        canvases.add_canvas("flat", 0, 10);
        let env = env(canvases);

        assert!(matches!(
            try_make_sync_from("flat", &env),
            Err(ViewError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn resolves_hash_prefixed_ids() {
        let canvases = CanvasRegistry::new();
        canvases.add_canvas("displaylist", 64, 48);
        let env = env(canvases);

        let view = make_from("#displaylist", &env).unwrap();
        assert_eq!(view.state().width, 64);
    }
}
