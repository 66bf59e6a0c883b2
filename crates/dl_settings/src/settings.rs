use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults::*;

/// How the compositor turns damage into rasterization work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Re-rasterize the whole surface every frame.
    Direct,
    /// Re-rasterize only the dirty regions.
    Partial,
    /// Rasterize through a tile cache with a per-frame update budget.
    Tile,
}

impl RenderMode {
    /// Parse the names used by the demo page (`direct`, `partial`, `tile`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "partial" => Some(Self::Partial),
            "tile" | "tiled" => Some(Self::Tile),
            _ => None,
        }
    }
}

/// View settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Render mode
    #[serde(default = "default_render_mode")]
    pub render_mode: RenderMode,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "default_max_tile_count")]
    pub max_tile_count: u32,
    #[serde(default = "default_max_updates_per_frame")]
    pub max_updates_per_frame: u32,

    // Initial view flags
    #[serde(default = "default_allow_blur")]
    pub allow_blur: bool,
    #[serde(default = "default_show_dirty_rect")]
    pub show_dirty_rect: bool,
    #[serde(default = "default_blur_radius")]
    pub blur_radius: f32,

    // Colors
    #[serde(default = "default_background_color")]
    pub background_color: (u8, u8, u8),
    #[serde(default = "default_dirty_rect_color")]
    pub dirty_rect_color: (u8, u8, u8),
    #[serde(default = "default_dirty_rect_width")]
    pub dirty_rect_width: f32,

    // Render thread
    #[serde(default = "default_render_thread_name")]
    pub render_thread_name: String,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_mode: default_render_mode(),
            tile_size: default_tile_size(),
            max_tile_count: default_max_tile_count(),
            max_updates_per_frame: default_max_updates_per_frame(),

            allow_blur: default_allow_blur(),
            show_dirty_rect: default_show_dirty_rect(),
            blur_radius: default_blur_radius(),

            background_color: default_background_color(),
            dirty_rect_color: default_dirty_rect_color(),
            dirty_rect_width: default_dirty_rect_width(),

            render_thread_name: default_render_thread_name(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl Settings {
    fn primary_settings_path() -> PathBuf {
        default_settings_dir().join("settings.json")
    }

    /// Path used by [`Settings::load`] and [`Settings::save`].
    ///
    /// `DISPLAYLIST_SETTINGS` overrides the default location.
    pub fn settings_path() -> PathBuf {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::primary_settings_path(),
        }
    }

    /// Load settings from disk.
    ///
    /// Falls back to defaults if loading fails.
    pub fn load() -> Self {
        let path = Self::settings_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(err) => {
                log::debug!("using default settings ({}): {err:#}", path.display());
                Self::default()
            }
        }
    }

    /// Load settings from a specific file; out-of-range values are clamped.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings.sanitized())
    }

    /// Save settings to the default location.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::settings_path())
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Clamp every numeric field into its supported range.
    pub fn sanitized(mut self) -> Self {
        self.tile_size = self.tile_size.clamp(MIN_TILE_SIZE, MAX_TILE_SIZE);
        self.max_tile_count = self.max_tile_count.clamp(MIN_TILE_COUNT, MAX_TILE_COUNT);
        self.max_updates_per_frame = self
            .max_updates_per_frame
            .clamp(MIN_UPDATES_PER_FRAME, MAX_UPDATES_PER_FRAME);
        if !self.blur_radius.is_finite() || self.blur_radius < 0.0 {
            self.blur_radius = default_blur_radius();
        }
        if !self.dirty_rect_width.is_finite() || self.dirty_rect_width <= 0.0 {
            self.dirty_rect_width = default_dirty_rect_width();
        }
        if self.render_thread_name.trim().is_empty() {
            self.render_thread_name = default_render_thread_name();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "render_mode": "tile" }"#).unwrap();

        assert_eq!(settings.render_mode, RenderMode::Tile);
        assert_eq!(settings.tile_size, default_tile_size());
        assert_eq!(settings.render_thread_name, default_render_thread_name());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = Settings {
            tile_size: 1,
            max_tile_count: 0,
            max_updates_per_frame: 1_000,
            blur_radius: f32::NAN,
            render_thread_name: "  ".to_string(),
            ..Settings::default()
        }
        .sanitized();

        assert_eq!(settings.tile_size, MIN_TILE_SIZE);
        assert_eq!(settings.max_tile_count, MIN_TILE_COUNT);
        assert_eq!(settings.max_updates_per_frame, MAX_UPDATES_PER_FRAME);
        assert_eq!(settings.blur_radius, default_blur_radius());
        assert_eq!(settings.render_thread_name, default_render_thread_name());
    }

    #[test]
    fn save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            render_mode: RenderMode::Direct,
            max_updates_per_frame: 3,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_from_invalid_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn parse_render_mode_names() {
        assert_eq!(RenderMode::parse("Direct"), Some(RenderMode::Direct));
        assert_eq!(RenderMode::parse(" partial "), Some(RenderMode::Partial));
        assert_eq!(RenderMode::parse("tile"), Some(RenderMode::Tile));
        assert_eq!(RenderMode::parse("gpu"), None);
    }
}
