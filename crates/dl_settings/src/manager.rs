use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{RenderMode, Settings};

/// Unified config manager.
///
/// Clones share the same settings.
#[derive(Clone)]
pub struct ConfigManager {
    settings: Arc<RwLock<Settings>>,
}

impl ConfigManager {
    /// Create a new config manager (loads settings once and caches them).
    pub fn new() -> Self {
        Self::with_settings(Settings::load())
    }

    /// Wrap already-loaded settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings.sanitized())),
        }
    }

    /// Load settings from an explicit file, falling back to defaults.
    pub fn from_path(path: &Path) -> Self {
        let settings = Settings::load_from(path).unwrap_or_else(|err| {
            log::warn!("failed to load settings from {}: {err:#}", path.display());
            Settings::default()
        });
        Self::with_settings(settings)
    }

    /// Get a snapshot copy of current settings.
    pub fn get(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Replace the current settings.
    pub fn update(&self, settings: Settings) {
        *self.settings.write() = settings.sanitized();
    }

    /// Reload settings from disk.
    pub fn reload(&self) {
        let new_settings = Settings::load();
        *self.settings.write() = new_settings;
    }

    // Convenience accessors.

    #[inline]
    pub fn render_mode(&self) -> RenderMode {
        self.settings.read().render_mode
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.settings.read().tile_size
    }

    #[inline]
    pub fn max_updates_per_frame(&self) -> u32 {
        self.settings.read().max_updates_per_frame
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_updates() {
        let manager = ConfigManager::with_settings(Settings::default());
        let other = manager.clone();

        manager.update(Settings {
            render_mode: RenderMode::Tile,
            tile_size: 4,
            ..Settings::default()
        });

        assert_eq!(other.render_mode(), RenderMode::Tile);
        // update() clamps like load does
        assert_eq!(other.tile_size(), crate::defaults::MIN_TILE_SIZE);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::from_path(&dir.path().join("absent.json"));

        assert_eq!(manager.get(), Settings::default());
    }
}
