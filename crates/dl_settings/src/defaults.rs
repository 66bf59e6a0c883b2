use std::path::PathBuf;

use crate::settings::RenderMode;

/// Environment variable that points at a settings file.
pub const SETTINGS_ENV: &str = "DISPLAYLIST_SETTINGS";

// Tile limits mirror the demo page inputs (1..=100).
pub const MIN_TILE_SIZE: u32 = 32;
pub const MAX_TILE_SIZE: u32 = 2048;
pub const MIN_TILE_COUNT: u32 = 1;
pub const MAX_TILE_COUNT: u32 = 100;
pub const MIN_UPDATES_PER_FRAME: u32 = 1;
pub const MAX_UPDATES_PER_FRAME: u32 = 100;

// Render mode defaults
pub fn default_render_mode() -> RenderMode {
    RenderMode::Partial
}

pub fn default_tile_size() -> u32 {
    256
}

pub fn default_max_tile_count() -> u32 {
    50
}

pub fn default_max_updates_per_frame() -> u32 {
    8
}

// Initial view flags
pub fn default_allow_blur() -> bool {
    true
}

pub fn default_show_dirty_rect() -> bool {
    false
}

pub fn default_blur_radius() -> f32 {
    12.0
}

// Colors
pub fn default_background_color() -> (u8, u8, u8) {
    (242, 243, 245)
}

pub fn default_dirty_rect_color() -> (u8, u8, u8) {
    (255, 0, 0)
}

pub fn default_dirty_rect_width() -> f32 {
    2.0
}

// Render thread
pub fn default_render_thread_name() -> String {
    "displaylist-render".to_string()
}

pub fn default_idle_timeout_ms() -> u64 {
    5_000
}

// Settings file location
pub fn default_settings_dir() -> PathBuf {
    // Prefer a user home directory.
    if let Ok(home_dir) = std::env::var("HOME") {
        return PathBuf::from(home_dir).join(".displaylist");
    }
    if let Ok(home_dir) = std::env::var("USERPROFILE") {
        return PathBuf::from(home_dir).join(".displaylist");
    }

    // Last resort: cwd.
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".displaylist")
}
