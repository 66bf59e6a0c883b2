use std::sync::Arc;

use dl_platform::{
    AssetLoader, EventHub, FontDecoder, ImageDecoder, SurfaceResolver, ViewEvent,
};
use dl_resources::{
    FontReport, FontSource, FontdbDecoder, ImageCrateDecoder, ImageResource, ResourceRegistry,
};
use dl_settings::{ConfigManager, Settings};

use crate::error::{ViewError, ViewResult};

/// Services shared by every view a host creates.
///
/// Clones share the registry, event listeners and settings.
#[derive(Clone)]
pub struct ViewEnvironment {
    pub resolver: Arc<dyn SurfaceResolver>,
    pub assets: Arc<dyn AssetLoader>,
    pub image_decoder: Arc<dyn ImageDecoder>,
    pub font_decoder: Arc<dyn FontDecoder>,
    pub registry: Arc<ResourceRegistry>,
    pub events: EventHub,
    pub config: ConfigManager,
}

impl ViewEnvironment {
    /// Environment with the default decoders, a fresh registry and default settings.
    pub fn new(resolver: Arc<dyn SurfaceResolver>, assets: Arc<dyn AssetLoader>) -> Self {
        Self {
            resolver,
            assets,
            image_decoder: Arc::new(ImageCrateDecoder),
            font_decoder: Arc::new(FontdbDecoder),
            registry: Arc::new(ResourceRegistry::new()),
            events: EventHub::new(),
            config: ConfigManager::new(),
        }
    }

    pub fn with_image_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.image_decoder = decoder;
        self
    }

    pub fn with_font_decoder(mut self, decoder: Arc<dyn FontDecoder>) -> Self {
        self.font_decoder = decoder;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ResourceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: ConfigManager) -> Self {
        self.config = config;
        self
    }

    pub fn settings(&self) -> Settings {
        self.config.get()
    }

    /// Load and decode an image on the calling thread.
    pub fn load_image(&self, path: &str) -> ViewResult<Arc<ImageResource>> {
        self.registry
            .load_image(path, self.assets.as_ref(), self.image_decoder.as_ref())
            .map_err(|err| {
                let reason = err.to_string();
                log::warn!("failed to load image {path}: {reason}");
                self.events.emit(ViewEvent::ResourceLoadFailed {
                    id: path.to_string(),
                    reason: reason.clone(),
                });
                ViewError::ResourceLoadFailure {
                    id: path.to_string(),
                    reason,
                }
            })
    }

    /// Register fonts; every failed entry is also emitted as an event.
    pub fn register_fonts(&self, sources: Vec<FontSource>) -> FontReport {
        let report = self.registry.register_fonts(
            sources,
            self.assets.as_ref(),
            self.font_decoder.as_ref(),
        );
        for (id, reason) in report.failures() {
            self.events.emit(ViewEvent::ResourceLoadFailed {
                id: id.to_string(),
                reason: reason.to_string(),
            });
        }
        report
    }
}

impl std::fmt::Debug for ViewEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEnvironment")
            .field("fonts", &self.registry.font_count())
            .field("images", &self.registry.image_count())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
