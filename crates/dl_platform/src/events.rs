use std::sync::Arc;

use parking_lot::RwLock;

use crate::traits::Rectangle;

/// Out-of-band notifications from a view.
///
/// Render failures never surface as the return value of `draw`; listeners see them here.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A frame reached the surface.
    FramePresented {
        frame: u64,
        /// Device-space regions that were re-rasterized.
        damage: Vec<Rectangle>,
        /// False when tile work was deferred to a later frame.
        complete: bool,
    },
    /// Rasterization or presentation failed.
    RenderFailed { frame: u64, message: String },
    /// A font or image could not be loaded.
    ResourceLoadFailed { id: String, reason: String },
}

type Listener = Arc<dyn Fn(&ViewEvent) + Send + Sync>;

/// Fan-out of [`ViewEvent`]s to registered listeners.
///
/// Clones share listeners. Listeners run on the thread that emits the event.
#[derive(Clone, Default)]
pub struct EventHub {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&ViewEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn emit(&self, event: ViewEvent) {
        // Snapshot so listeners may subscribe without deadlocking.
        let listeners: Vec<Listener> = self.listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn emit_reaches_every_listener() {
        let hub = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            hub.subscribe(move |event| {
                if let ViewEvent::RenderFailed { frame, .. } = event {
                    seen.lock().push(format!("{tag}{frame}"));
                }
            });
        }

        hub.clone().emit(ViewEvent::RenderFailed {
            frame: 3,
            message: "boom".into(),
        });

        assert_eq!(*seen.lock(), vec!["a3".to_string(), "b3".to_string()]);
    }
}
